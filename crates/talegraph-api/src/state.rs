//! Shared application state.

use std::sync::Arc;

use talegraph_narrative::application::service::NarrativeService;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Story-graph operations.
    pub service: Arc<NarrativeService>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(service: NarrativeService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

//! Tunables for the narrative handlers.

use crate::domain::visibility::DEFAULT_VISIBLE_LIMIT;

/// Behaviour switches shared by every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NarrativeSettings {
    /// Abort an edit on its first rejected command line instead of
    /// reporting it and carrying on.
    pub strict_commands: bool,
    /// Listing size used when the caller does not ask for one.
    pub visible_limit: i64,
}

impl Default for NarrativeSettings {
    fn default() -> Self {
        Self {
            strict_commands: false,
            visible_limit: DEFAULT_VISIBLE_LIMIT,
        }
    }
}

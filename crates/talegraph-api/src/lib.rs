//! Talegraph HTTP API: a thin JSON adapter over `NarrativeService`.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

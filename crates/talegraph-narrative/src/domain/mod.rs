//! Pure story-graph logic, free of persistence.

pub mod commands;
pub mod edit_script;
pub mod graph;
pub mod visibility;

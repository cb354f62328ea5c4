//! Talegraph — story graph lifecycle.
//!
//! Responsible for creating stories with pre-wired choices, editing a node's
//! choices through a line-oriented command grammar, reference-counted
//! cascade deletion, and the read-side visibility rules.

pub mod application;
pub mod domain;

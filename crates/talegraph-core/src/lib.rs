//! Talegraph Core — shared story-graph abstractions.
//!
//! This crate defines the node records, the edge-list codec and the store
//! traits that every other Talegraph crate builds on. It contains no
//! infrastructure code.

pub mod clock;
pub mod codec;
pub mod error;
pub mod node;
pub mod repository;

//! Shared test doubles and utilities for Talegraph.

mod clock;
mod store;

pub use clock::{FixedClock, fixed_now};
pub use store::{FailingGraphStore, InMemoryGraphStore};

//! Handlers that run domain logic against a `GraphStore`.

pub mod command_handlers;
pub mod locks;
pub mod query_handlers;
pub mod service;
pub mod settings;

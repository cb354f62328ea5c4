//! PostgreSQL persistence for Talegraph story graphs.

pub mod pg_graph_store;
pub mod schema;

//! Story-graph database schema.

use sqlx::migrate::Migrator;

/// Embedded migrations creating the `stories` and `blocks` tables and the
/// shared `node_id_seq` sequence.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

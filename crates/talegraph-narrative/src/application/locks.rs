//! Per-story write serialization within one process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use talegraph_core::node::NodeId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per story id. Entries nobody holds or waits on are
/// pruned on the next acquisition, so the table only grows with the number
/// of stories being written concurrently.
#[derive(Debug, Clone, Default)]
pub struct StoryLocks {
    table: Arc<Mutex<HashMap<NodeId, Arc<AsyncMutex<()>>>>>,
}

impl StoryLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `story_id`; released when the guard
    /// drops.
    pub async fn acquire(&self, story_id: NodeId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(table.entry(story_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of stories currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

//! Test stores — in-memory and failing `GraphStore` implementations.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use talegraph_core::error::DomainError;
use talegraph_core::node::{Block, NodeId, Privacy, Story, UserId};
use talegraph_core::repository::{
    BlockUpdate, GraphSession, GraphStore, StoryFilter, StoryOrder, StoryUpdate,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct GraphState {
    stories: BTreeMap<NodeId, Story>,
    blocks: BTreeMap<NodeId, Block>,
}

/// A transactional in-memory store.
///
/// A session holds the store lock from `begin` until it is committed or
/// dropped and works on a private copy of the state, so an abandoned session
/// leaves no trace. Ids come from one counter that never rewinds, matching a
/// database sequence.
#[derive(Debug, Clone)]
pub struct InMemoryGraphStore {
    state: Arc<Mutex<GraphState>>,
    next_id: Arc<AtomicI64>,
    commits: Arc<AtomicUsize>,
    write_limit: Option<usize>,
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGraphStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(GraphState::default())),
            next_id: Arc::new(AtomicI64::new(1)),
            commits: Arc::new(AtomicUsize::new(0)),
            write_limit: None,
        }
    }

    /// Returns a handle to the same data whose sessions fail with a
    /// persistence error once they have performed `writes` writes.
    #[must_use]
    pub fn with_write_limit(&self, writes: usize) -> Self {
        Self {
            write_limit: Some(writes),
            ..self.clone()
        }
    }

    /// Allocates a fresh node id.
    pub fn allocate_id(&self) -> NodeId {
        NodeId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Inserts a story with the given fields, bypassing sessions.
    pub async fn seed_story(&self, owner_id: UserId, title: &str, privacy: Privacy) -> Story {
        let now = crate::fixed_now();
        let story = Story {
            id: self.allocate_id(),
            owner_id,
            title: title.to_owned(),
            body: String::new(),
            privacy,
            edges: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.put_story(story.clone()).await;
        story
    }

    /// Inserts a blank block in `story_id`, bypassing sessions.
    pub async fn seed_block(&self, story_id: NodeId, owner_id: UserId) -> Block {
        let now = crate::fixed_now();
        let block = Block {
            id: self.allocate_id(),
            story_id,
            owner_id,
            body: String::new(),
            edges: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.put_block(block.clone()).await;
        block
    }

    /// Inserts or replaces a story record.
    pub async fn put_story(&self, story: Story) {
        self.state.lock().await.stories.insert(story.id, story);
    }

    /// Inserts or replaces a block record.
    pub async fn put_block(&self, block: Block) {
        self.state.lock().await.blocks.insert(block.id, block);
    }

    /// Returns every stored story, ordered by id.
    pub async fn stories(&self) -> Vec<Story> {
        self.state.lock().await.stories.values().cloned().collect()
    }

    /// Returns every stored block, ordered by id.
    pub async fn blocks(&self) -> Vec<Block> {
        self.state.lock().await.blocks.values().cloned().collect()
    }

    /// Number of sessions committed so far.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn begin(&self) -> Result<Box<dyn GraphSession>, DomainError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryGraphSession {
            guard,
            working,
            next_id: Arc::clone(&self.next_id),
            commits: Arc::clone(&self.commits),
            writes_left: self.write_limit,
        }))
    }

    async fn get_story(&self, id: NodeId) -> Result<Option<Story>, DomainError> {
        Ok(self.state.lock().await.stories.get(&id).cloned())
    }

    async fn get_block(&self, id: NodeId) -> Result<Option<Block>, DomainError> {
        Ok(self.state.lock().await.blocks.get(&id).cloned())
    }

    async fn list_blocks_by_story(&self, story_id: NodeId) -> Result<Vec<Block>, DomainError> {
        Ok(blocks_of(&*self.state.lock().await, story_id))
    }

    async fn list_stories(
        &self,
        filter: StoryFilter,
        limit: i64,
        order: StoryOrder,
    ) -> Result<Vec<Story>, DomainError> {
        let state = self.state.lock().await;
        let matching = state.stories.values().filter(|s| filter.matches(s)).cloned();
        let take = usize::try_from(limit).unwrap_or(0);
        Ok(match order {
            StoryOrder::NewestFirst => matching.rev().take(take).collect(),
            StoryOrder::OldestFirst => matching.take(take).collect(),
        })
    }
}

fn blocks_of(state: &GraphState, story_id: NodeId) -> Vec<Block> {
    state
        .blocks
        .values()
        .filter(|b| b.story_id == story_id)
        .cloned()
        .collect()
}

struct InMemoryGraphSession {
    guard: OwnedMutexGuard<GraphState>,
    working: GraphState,
    next_id: Arc<AtomicI64>,
    commits: Arc<AtomicUsize>,
    writes_left: Option<usize>,
}

impl InMemoryGraphSession {
    fn charge_write(&mut self) -> Result<(), DomainError> {
        match self.writes_left.as_mut() {
            Some(0) => Err(DomainError::Persistence("injected write failure".into())),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GraphSession for InMemoryGraphSession {
    async fn lock_story(&mut self, story_id: NodeId) -> Result<(), DomainError> {
        if self.working.stories.contains_key(&story_id) {
            Ok(())
        } else {
            Err(DomainError::story_not_found(story_id))
        }
    }

    async fn create_story(
        &mut self,
        owner_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Story, DomainError> {
        self.charge_write()?;
        let story = Story {
            id: NodeId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            owner_id,
            title: String::new(),
            body: String::new(),
            privacy: Privacy::Public,
            edges: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.working.stories.insert(story.id, story.clone());
        Ok(story)
    }

    async fn get_story(&mut self, id: NodeId) -> Result<Option<Story>, DomainError> {
        Ok(self.working.stories.get(&id).cloned())
    }

    async fn update_story(
        &mut self,
        id: NodeId,
        update: StoryUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.charge_write()?;
        let story = self
            .working
            .stories
            .get_mut(&id)
            .ok_or_else(|| DomainError::story_not_found(id))?;
        if let Some(title) = update.title {
            story.title = title;
        }
        if let Some(body) = update.body {
            story.body = body;
        }
        if let Some(privacy) = update.privacy {
            story.privacy = privacy;
        }
        if let Some(edges) = update.edges {
            story.edges = edges;
        }
        story.updated_at = now;
        Ok(())
    }

    async fn delete_story(&mut self, id: NodeId) -> Result<bool, DomainError> {
        self.charge_write()?;
        Ok(self.working.stories.remove(&id).is_some())
    }

    async fn create_block(
        &mut self,
        story_id: NodeId,
        owner_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Block, DomainError> {
        self.charge_write()?;
        if !self.working.stories.contains_key(&story_id) {
            return Err(DomainError::story_not_found(story_id));
        }
        let block = Block {
            id: NodeId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            story_id,
            owner_id,
            body: String::new(),
            edges: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.working.blocks.insert(block.id, block.clone());
        Ok(block)
    }

    async fn get_block(&mut self, id: NodeId) -> Result<Option<Block>, DomainError> {
        Ok(self.working.blocks.get(&id).cloned())
    }

    async fn update_block(
        &mut self,
        id: NodeId,
        update: BlockUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.charge_write()?;
        let block = self
            .working
            .blocks
            .get_mut(&id)
            .ok_or_else(|| DomainError::block_not_found(id))?;
        if let Some(body) = update.body {
            block.body = body;
        }
        if let Some(edges) = update.edges {
            block.edges = edges;
        }
        block.updated_at = now;
        Ok(())
    }

    async fn delete_block(&mut self, id: NodeId) -> Result<bool, DomainError> {
        self.charge_write()?;
        Ok(self.working.blocks.remove(&id).is_some())
    }

    async fn list_blocks_by_story(&mut self, story_id: NodeId) -> Result<Vec<Block>, DomainError> {
        Ok(blocks_of(&self.working, story_id))
    }

    async fn delete_blocks_by_story(&mut self, story_id: NodeId) -> Result<u64, DomainError> {
        self.charge_write()?;
        let before = self.working.blocks.len();
        self.working.blocks.retain(|_, b| b.story_id != story_id);
        Ok((before - self.working.blocks.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let Self {
            mut guard,
            working,
            commits,
            ..
        } = *self;
        *guard = working;
        commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A store whose every operation fails with a persistence error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingGraphStore;

fn connection_refused<T>() -> Result<T, DomainError> {
    Err(DomainError::Persistence("connection refused".into()))
}

#[async_trait]
impl GraphStore for FailingGraphStore {
    async fn begin(&self) -> Result<Box<dyn GraphSession>, DomainError> {
        connection_refused()
    }

    async fn get_story(&self, _id: NodeId) -> Result<Option<Story>, DomainError> {
        connection_refused()
    }

    async fn get_block(&self, _id: NodeId) -> Result<Option<Block>, DomainError> {
        connection_refused()
    }

    async fn list_blocks_by_story(&self, _story_id: NodeId) -> Result<Vec<Block>, DomainError> {
        connection_refused()
    }

    async fn list_stories(
        &self,
        _filter: StoryFilter,
        _limit: i64,
        _order: StoryOrder,
    ) -> Result<Vec<Story>, DomainError> {
        connection_refused()
    }
}

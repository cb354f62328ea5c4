//! Story-graph store abstraction.
//!
//! A [`GraphStore`] offers plain record access over stories and blocks; it
//! knows nothing about reachability or reference counts. Every mutation runs
//! inside a [`GraphSession`], which is one transaction: dropping a session
//! without calling [`GraphSession::commit`] discards all of its writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DomainError;
use crate::node::{Block, Edge, NodeId, Privacy, Story, UserId};

/// Field changes for a story. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryUpdate {
    /// New title.
    pub title: Option<String>,
    /// New opening text.
    pub body: Option<String>,
    /// New visibility.
    pub privacy: Option<Privacy>,
    /// Replacement edge list.
    pub edges: Option<Vec<Edge>>,
}

/// Field changes for a block. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockUpdate {
    /// New text.
    pub body: Option<String>,
    /// Replacement edge list.
    pub edges: Option<Vec<Edge>>,
}

/// Which stories a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryFilter {
    /// Every story.
    All,
    /// Public stories plus private stories owned by the viewer, if any.
    VisibleTo(Option<UserId>),
    /// Stories owned by one user.
    OwnedBy(UserId),
}

impl StoryFilter {
    /// Returns `true` if `story` passes the filter.
    #[must_use]
    pub fn matches(&self, story: &Story) -> bool {
        match self {
            Self::All => true,
            Self::VisibleTo(viewer) => {
                !story.privacy.is_private() || *viewer == Some(story.owner_id)
            }
            Self::OwnedBy(owner) => story.owner_id == *owner,
        }
    }
}

/// Sort order for story listings. Ids grow monotonically, so id order is
/// creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoryOrder {
    /// Highest id first.
    #[default]
    NewestFirst,
    /// Lowest id first.
    OldestFirst,
}

/// One transaction against the story-graph store.
#[async_trait]
pub trait GraphSession: Send {
    /// Takes the write lock for `story_id` until the session ends.
    async fn lock_story(&mut self, story_id: NodeId) -> Result<(), DomainError>;

    /// Inserts a blank story (empty title, body and edges) and returns it.
    async fn create_story(
        &mut self,
        owner_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Story, DomainError>;

    /// Loads a story by id.
    async fn get_story(&mut self, id: NodeId) -> Result<Option<Story>, DomainError>;

    /// Applies `update` to a story.
    ///
    /// Returns `DomainError::NotFound` if the story does not exist.
    async fn update_story(
        &mut self,
        id: NodeId,
        update: StoryUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    /// Hard-deletes a story record. Returns `false` if it did not exist.
    async fn delete_story(&mut self, id: NodeId) -> Result<bool, DomainError>;

    /// Inserts a blank block in `story_id` and returns it.
    async fn create_block(
        &mut self,
        story_id: NodeId,
        owner_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Block, DomainError>;

    /// Loads a block by id.
    async fn get_block(&mut self, id: NodeId) -> Result<Option<Block>, DomainError>;

    /// Applies `update` to a block.
    ///
    /// Returns `DomainError::NotFound` if the block does not exist.
    async fn update_block(
        &mut self,
        id: NodeId,
        update: BlockUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    /// Hard-deletes a block. Returns `false` if it did not exist.
    async fn delete_block(&mut self, id: NodeId) -> Result<bool, DomainError>;

    /// Loads every block of a story, ordered by id.
    async fn list_blocks_by_story(&mut self, story_id: NodeId) -> Result<Vec<Block>, DomainError>;

    /// Hard-deletes every block of a story and returns how many were removed.
    async fn delete_blocks_by_story(&mut self, story_id: NodeId) -> Result<u64, DomainError>;

    /// Makes every write of this session durable.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}

/// Story-graph store: lock-free reads plus transactional sessions.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Opens a new transaction.
    async fn begin(&self) -> Result<Box<dyn GraphSession>, DomainError>;

    /// Loads a story by id.
    async fn get_story(&self, id: NodeId) -> Result<Option<Story>, DomainError>;

    /// Loads a block by id.
    async fn get_block(&self, id: NodeId) -> Result<Option<Block>, DomainError>;

    /// Loads every block of a story, ordered by id.
    async fn list_blocks_by_story(&self, story_id: NodeId) -> Result<Vec<Block>, DomainError>;

    /// Lists at most `limit` stories passing `filter`.
    async fn list_stories(
        &self,
        filter: StoryFilter,
        limit: i64,
        order: StoryOrder,
    ) -> Result<Vec<Story>, DomainError>;
}

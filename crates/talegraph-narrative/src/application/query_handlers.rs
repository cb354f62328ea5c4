//! Query handlers for story graphs.
//!
//! Reads go straight to the store without a session or lock; they may
//! observe a story between two committed edits but never halfway through
//! one.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use talegraph_core::error::{DomainError, NodeKind};
use talegraph_core::node::{Block, NodeId, Privacy, Story, UserId};
use talegraph_core::repository::{GraphStore, StoryOrder};

use crate::domain::graph::{DanglingEdge, StoryGraph};
use crate::domain::visibility::ViewerPolicy;

/// One row of a story listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorySummary {
    /// Story id.
    pub id: NodeId,
    /// Owner.
    pub owner_id: UserId,
    /// Title.
    pub title: String,
    /// Visibility.
    pub privacy: Privacy,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

impl From<Story> for StorySummary {
    fn from(story: Story) -> Self {
        Self {
            id: story.id,
            owner_id: story.owner_id,
            title: story.title,
            privacy: story.privacy,
            updated_at: story.updated_at,
        }
    }
}

/// A story root with all of its blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryView {
    /// The root.
    pub story: Story,
    /// Every block of the story, ordered by id.
    pub blocks: Vec<Block>,
}

/// A block with the story it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockView {
    /// The block.
    pub block: Block,
    /// The story root.
    pub story: Story,
    /// The story's other blocks, ordered by id.
    pub siblings: Vec<Block>,
}

/// Structural health of one story graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphAudit {
    /// The audited story.
    pub story_id: NodeId,
    /// Incoming edge count per referenced node.
    pub reference_counts: BTreeMap<NodeId, usize>,
    /// Blocks that cannot be reached from the root.
    pub unreachable: Vec<NodeId>,
    /// Edges whose target no longer exists.
    pub dangling_edges: Vec<DanglingEdge>,
}

impl GraphAudit {
    /// Returns `true` if every block is reachable and no edge dangles.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unreachable.is_empty() && self.dangling_edges.is_empty()
    }
}

/// Lists the newest stories `viewer` may see.
///
/// # Errors
///
/// Returns `DomainError::Persistence` if the store read fails.
pub async fn list_visible(
    store: &dyn GraphStore,
    viewer: Option<UserId>,
    limit: i64,
) -> Result<Vec<StorySummary>, DomainError> {
    let policy = ViewerPolicy::new(viewer);
    let stories = store
        .list_stories(policy.filter(), limit, StoryOrder::NewestFirst)
        .await?;
    Ok(stories.into_iter().map(StorySummary::from).collect())
}

async fn visible_story(
    store: &dyn GraphStore,
    story_id: NodeId,
    viewer: Option<UserId>,
) -> Result<Story, DomainError> {
    let story = store
        .get_story(story_id)
        .await?
        .ok_or_else(|| DomainError::story_not_found(story_id))?;
    ViewerPolicy::new(viewer).ensure_can_view(&story)?;
    Ok(story)
}

/// Loads a story and its blocks.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the story does not exist and
/// `DomainError::Unauthorized` if it is private to someone else.
pub async fn get_story_view(
    store: &dyn GraphStore,
    story_id: NodeId,
    viewer: Option<UserId>,
) -> Result<StoryView, DomainError> {
    let story = visible_story(store, story_id, viewer).await?;
    let blocks = store.list_blocks_by_story(story_id).await?;
    Ok(StoryView { story, blocks })
}

/// Loads a block together with its story and sibling blocks.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the block or its story does not exist
/// and `DomainError::Unauthorized` if the story is private to someone else.
pub async fn get_block_view(
    store: &dyn GraphStore,
    block_id: NodeId,
    viewer: Option<UserId>,
) -> Result<BlockView, DomainError> {
    let block = store
        .get_block(block_id)
        .await?
        .ok_or_else(|| DomainError::block_not_found(block_id))?;
    let story = visible_story(store, block.story_id, viewer).await?;
    let siblings = store
        .list_blocks_by_story(story.id)
        .await?
        .into_iter()
        .filter(|b| b.id != block_id)
        .collect();
    Ok(BlockView {
        block,
        story,
        siblings,
    })
}

/// Reports reference counts, unreachable blocks and dangling edges.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the story does not exist and
/// `DomainError::Unauthorized` if it is private to someone else.
pub async fn audit_story(
    store: &dyn GraphStore,
    story_id: NodeId,
    viewer: Option<UserId>,
) -> Result<GraphAudit, DomainError> {
    let story = visible_story(store, story_id, viewer).await?;
    let blocks = store.list_blocks_by_story(story_id).await?;
    let graph = StoryGraph::new(story, blocks);
    Ok(GraphAudit {
        story_id,
        reference_counts: graph.reference_counts(),
        unreachable: graph.unreachable_from_root(),
        dangling_edges: graph.dangling_edges(),
    })
}

/// Resolves the story a root or block belongs to.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if `node_id` is neither.
pub async fn story_id_of(store: &dyn GraphStore, node_id: NodeId) -> Result<NodeId, DomainError> {
    if store.get_story(node_id).await?.is_some() {
        return Ok(node_id);
    }
    match store.get_block(node_id).await? {
        Some(block) => Ok(block.story_id),
        None => Err(DomainError::NotFound {
            kind: NodeKind::Node,
            id: node_id,
        }),
    }
}

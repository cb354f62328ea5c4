//! Commands accepted by the story-graph handlers.

use talegraph_core::node::{NodeId, Privacy, UserId};

/// Create a story whose root offers one choice per label, each leading to a
/// fresh blank block.
#[derive(Debug, Clone)]
pub struct CreateStory {
    /// Owner of the new story.
    pub owner_id: UserId,
    /// Story title.
    pub title: String,
    /// Opening text.
    pub body: String,
    /// Choice labels, in presentation order.
    pub option_labels: Vec<String>,
    /// Listing visibility.
    pub privacy: Privacy,
}

/// Replace a node's text and run edit commands over its choices.
#[derive(Debug, Clone)]
pub struct EditNode {
    /// The story root or block being edited.
    pub node_id: NodeId,
    /// The acting user.
    pub actor_id: UserId,
    /// New title; only applied when `node_id` is a story root.
    pub title: Option<String>,
    /// New body text.
    pub body: String,
    /// Edit command lines, applied in order.
    pub commands: Vec<String>,
}

/// Cascade-delete one block.
#[derive(Debug, Clone)]
pub struct DeleteNode {
    /// The block to delete.
    pub block_id: NodeId,
    /// The acting user.
    pub actor_id: UserId,
}

/// Delete a story and every block in it.
#[derive(Debug, Clone)]
pub struct DeleteStory {
    /// The story to delete.
    pub story_id: NodeId,
    /// The acting user.
    pub actor_id: UserId,
}

/// Remove blocks that cannot be reached from the story root.
#[derive(Debug, Clone)]
pub struct CollectUnreachable {
    /// The story to sweep.
    pub story_id: NodeId,
    /// The acting user.
    pub actor_id: UserId,
}

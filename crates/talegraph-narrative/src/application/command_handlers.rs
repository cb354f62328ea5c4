//! Command handlers for story graphs.
//!
//! Every handler runs inside one store session: it locks the story, loads
//! the whole graph into a [`StoryGraph`], applies the change in memory and
//! writes back only the records that changed. Any error drops the session,
//! so a failed command leaves the store exactly as it was.

use chrono::{DateTime, Utc};
use serde::Serialize;
use talegraph_core::clock::Clock;
use talegraph_core::error::{DomainError, NodeKind};
use talegraph_core::node::{Edge, NodeId};
use talegraph_core::repository::{BlockUpdate, GraphSession, GraphStore, StoryUpdate};
use tracing::{debug, info, warn};

use crate::application::settings::NarrativeSettings;
use crate::domain::commands::{
    CollectUnreachable, CreateStory, DeleteNode, DeleteStory, EditNode,
};
use crate::domain::edit_script::EditCommand;
use crate::domain::graph::{GraphChanges, StoryGraph};
use crate::domain::visibility::{ensure_can_modify, ensure_story_owner};

/// Result of creating a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedStory {
    /// The new story root.
    pub story_id: NodeId,
    /// Blocks created for the choices, in label order.
    pub block_ids: Vec<NodeId>,
}

/// What happened to one edit command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// The command changed the graph.
    Applied {
        /// Node the command acted on; for `add`, the new block.
        target: NodeId,
    },
    /// The command was valid but had nothing to do.
    NoOp {
        /// Why nothing changed.
        reason: String,
    },
    /// The command was malformed or not allowed.
    Rejected {
        /// Why the command was refused.
        reason: String,
    },
}

/// Report entry for one non-blank command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineReport {
    /// 1-based position in the submitted command list.
    pub line_number: usize,
    /// The line as submitted, without its line terminator.
    pub line: String,
    /// Outcome of the line.
    #[serde(flatten)]
    pub outcome: CommandOutcome,
}

/// Result of editing a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditReport {
    /// The edited node.
    pub node_id: NodeId,
    /// One entry per non-blank command line, in order.
    pub lines: Vec<LineReport>,
    /// Blocks created by `add`.
    pub created: Vec<NodeId>,
    /// Blocks removed by `delete` cascades.
    pub removed: Vec<NodeId>,
    /// `true` if a cascade removed the edited node itself, in which case its
    /// new text was discarded.
    pub node_removed: bool,
}

impl EditReport {
    fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            lines: Vec::new(),
            created: Vec::new(),
            removed: Vec::new(),
            node_removed: false,
        }
    }

    /// Number of rejected lines.
    #[must_use]
    pub fn rejected_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l.outcome, CommandOutcome::Rejected { .. }))
            .count()
    }
}

/// Result of deleting a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeletedStory {
    /// The removed story.
    pub story_id: NodeId,
    /// Number of blocks removed with it.
    pub blocks_removed: u64,
}

fn require_text(value: &str, field: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        Err(DomainError::Validation(format!("{field} must not be blank")))
    } else {
        Ok(())
    }
}

fn no_op(reason: impl Into<String>) -> CommandOutcome {
    CommandOutcome::NoOp {
        reason: reason.into(),
    }
}

fn rejected(reason: impl Into<String>) -> CommandOutcome {
    CommandOutcome::Rejected {
        reason: reason.into(),
    }
}

/// Story id of a root or block, read inside the session.
async fn story_of(session: &mut dyn GraphSession, node_id: NodeId) -> Result<NodeId, DomainError> {
    if session.get_story(node_id).await?.is_some() {
        return Ok(node_id);
    }
    match session.get_block(node_id).await? {
        Some(block) => Ok(block.story_id),
        None => Err(DomainError::NotFound {
            kind: NodeKind::Node,
            id: node_id,
        }),
    }
}

/// Locks `story_id` and loads its root and blocks.
async fn load_graph(
    session: &mut dyn GraphSession,
    story_id: NodeId,
) -> Result<StoryGraph, DomainError> {
    session.lock_story(story_id).await?;
    let story = session
        .get_story(story_id)
        .await?
        .ok_or_else(|| DomainError::story_not_found(story_id))?;
    let blocks = session.list_blocks_by_story(story_id).await?;
    Ok(StoryGraph::new(story, blocks))
}

/// Writes `changes`: removed blocks first, then surviving blocks, then the
/// root.
async fn persist(
    session: &mut dyn GraphSession,
    changes: GraphChanges,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    let GraphChanges {
        story,
        blocks,
        removed,
        rewired,
    } = changes;
    for id in &removed {
        session.delete_block(*id).await?;
    }
    for block in blocks {
        let update = BlockUpdate {
            body: Some(block.body),
            edges: rewired.contains(&block.id).then_some(block.edges),
        };
        session.update_block(block.id, update, now).await?;
    }
    if let Some(story) = story {
        let update = StoryUpdate {
            title: Some(story.title),
            body: Some(story.body),
            privacy: None,
            edges: rewired.contains(&story.id).then_some(story.edges),
        };
        session.update_story(story.id, update, now).await?;
    }
    Ok(())
}

/// Handles `CreateStory`: inserts the root, one blank block per non-blank
/// label, then wires the root's choices to the blocks in label order.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a blank title or body, and
/// `DomainError::Persistence` if any write fails.
pub async fn handle_create_story(
    command: &CreateStory,
    clock: &dyn Clock,
    store: &dyn GraphStore,
) -> Result<CreatedStory, DomainError> {
    require_text(&command.title, "title")?;
    require_text(&command.body, "body")?;
    let labels: Vec<&str> = command
        .option_labels
        .iter()
        .map(String::as_str)
        .filter(|label| !label.trim().is_empty())
        .collect();

    let now = clock.now();
    let mut session = store.begin().await?;
    let story = session.create_story(command.owner_id, now).await?;

    // Ids are taken from each insert, never re-queried, so the pairing with
    // labels cannot be disturbed by concurrent inserts.
    let mut block_ids = Vec::with_capacity(labels.len());
    for _ in &labels {
        let block = session.create_block(story.id, command.owner_id, now).await?;
        block_ids.push(block.id);
    }
    let edges = block_ids
        .iter()
        .zip(&labels)
        .map(|(id, label)| Edge::new(*id, *label))
        .collect();

    let update = StoryUpdate {
        title: Some(command.title.clone()),
        body: Some(command.body.clone()),
        privacy: Some(command.privacy),
        edges: Some(edges),
    };
    session.update_story(story.id, update, now).await?;
    session.commit().await?;

    info!(story_id = %story.id, choices = block_ids.len(), "story created");
    Ok(CreatedStory {
        story_id: story.id,
        block_ids,
    })
}

/// Handles `EditNode`: runs the command lines against the node's choices,
/// then stores the new body (and title, for a root).
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the node does not exist,
/// `DomainError::Unauthorized` if the actor owns neither the node nor the
/// story, `DomainError::MalformedCommand` for the first rejected line in
/// strict mode, and `DomainError::Persistence` if any write fails.
pub async fn handle_edit_node(
    command: &EditNode,
    clock: &dyn Clock,
    store: &dyn GraphStore,
    settings: &NarrativeSettings,
) -> Result<EditReport, DomainError> {
    if let Some(title) = &command.title {
        require_text(title, "title")?;
    }
    let node_id = command.node_id;
    let now = clock.now();

    let mut session = store.begin().await?;
    let story_id = story_of(session.as_mut(), node_id).await?;
    let mut graph = load_graph(session.as_mut(), story_id).await?;
    if !graph.contains(node_id) {
        return Err(DomainError::block_not_found(node_id));
    }
    ensure_can_modify(command.actor_id, graph.story(), graph.block(node_id))?;

    let mut report = EditReport::new(node_id);
    for (index, line) in command.commands.iter().enumerate() {
        let line_number = index + 1;
        let outcome = match EditCommand::parse(line) {
            Ok(None) => continue,
            Ok(Some(edit)) => {
                apply_command(&mut graph, session.as_mut(), command, edit, now, &mut report)
                    .await?
            }
            Err(err) => rejected(err.to_string()),
        };
        if let CommandOutcome::Rejected { reason } = &outcome {
            if settings.strict_commands {
                return Err(DomainError::MalformedCommand {
                    line: line_number,
                    reason: reason.clone(),
                });
            }
            warn!(node_id = %node_id, line_number, reason = %reason, "edit command rejected");
        }
        report.lines.push(LineReport {
            line_number,
            line: line.trim_end_matches(['\r', '\n']).to_owned(),
            outcome,
        });
    }

    if graph.set_body(node_id, &command.body) {
        // Blocks have no title.
        if let Some(title) = command.title.as_deref().filter(|_| node_id == story_id) {
            graph.set_title(title);
        }
    } else {
        report.node_removed = true;
    }
    // Blocks added and then cascaded away in the same edit are not reported.
    report.created.retain(|id| !report.removed.contains(id));

    persist(session.as_mut(), graph.into_changes(), now).await?;
    session.commit().await?;

    info!(
        node_id = %node_id,
        story_id = %story_id,
        lines = report.lines.len(),
        rejected = report.rejected_count(),
        removed = report.removed.len(),
        "node edited"
    );
    Ok(report)
}

async fn apply_command(
    graph: &mut StoryGraph,
    session: &mut dyn GraphSession,
    command: &EditNode,
    edit: EditCommand,
    now: DateTime<Utc>,
    report: &mut EditReport,
) -> Result<CommandOutcome, DomainError> {
    let node_id = command.node_id;
    if !graph.contains(node_id) {
        return Ok(rejected("the edited node was removed by an earlier delete"));
    }
    debug!(node_id = %node_id, keyword = edit.keyword(), "applying edit command");

    let outcome = match edit {
        EditCommand::Add { label } => {
            let block = session
                .create_block(graph.root_id(), command.actor_id, now)
                .await?;
            let target = block.id;
            graph.insert_block(block);
            push_edge(graph, node_id, Edge::new(target, label));
            report.created.push(target);
            CommandOutcome::Applied { target }
        }
        EditCommand::AddTo { target, label } => {
            if graph.contains(target) {
                push_edge(graph, node_id, Edge::new(target, label));
                CommandOutcome::Applied { target }
            } else {
                rejected(format!("node {target} is not part of this story"))
            }
        }
        EditCommand::Change { target, label } => {
            let position = graph
                .edges(node_id)
                .and_then(|edges| edges.iter().position(|e| e.target == target));
            match position {
                Some(index) => {
                    if let Some(edges) = graph.edges_mut(node_id) {
                        edges[index].label = label;
                    }
                    CommandOutcome::Applied { target }
                }
                None => no_op(format!("no choice leads to node {target}")),
            }
        }
        EditCommand::Delete { target } => {
            if target == graph.root_id() {
                rejected("the story root cannot be deleted")
            } else if target == node_id {
                rejected("a node cannot delete itself")
            } else if graph.block(target).is_none() {
                no_op(format!("node {target} is not a block of this story"))
            } else if let Err(err) =
                ensure_can_modify(command.actor_id, graph.story(), graph.block(target))
            {
                rejected(err.to_string())
            } else {
                let removed = graph.cascade_delete(target);
                debug!(target = %target, removed = removed.len(), "cascade delete");
                report.removed.extend(removed);
                CommandOutcome::Applied { target }
            }
        }
    };
    Ok(outcome)
}

fn push_edge(graph: &mut StoryGraph, node_id: NodeId, edge: Edge) {
    if let Some(edges) = graph.edges_mut(node_id) {
        edges.push(edge);
    }
}

/// Handles `DeleteNode`: cascade-deletes a block and sweeps edges to
/// everything removed. Returns the removed ids in deletion order.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the block does not exist,
/// `DomainError::Unauthorized` if the actor owns neither the block nor the
/// story, and `DomainError::Persistence` if any write fails.
pub async fn handle_delete_node(
    command: &DeleteNode,
    clock: &dyn Clock,
    store: &dyn GraphStore,
) -> Result<Vec<NodeId>, DomainError> {
    let block_id = command.block_id;
    let now = clock.now();

    let mut session = store.begin().await?;
    let story_id = session
        .get_block(block_id)
        .await?
        .ok_or_else(|| DomainError::block_not_found(block_id))?
        .story_id;
    let mut graph = load_graph(session.as_mut(), story_id).await?;
    let block = graph
        .block(block_id)
        .ok_or_else(|| DomainError::block_not_found(block_id))?;
    ensure_can_modify(command.actor_id, graph.story(), Some(block))?;

    let removed = graph.cascade_delete(block_id);
    persist(session.as_mut(), graph.into_changes(), now).await?;
    session.commit().await?;

    info!(block_id = %block_id, story_id = %story_id, removed = removed.len(), "block deleted");
    Ok(removed)
}

/// Handles `DeleteStory`: removes the story and every one of its blocks.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the story does not exist,
/// `DomainError::Unauthorized` if the actor does not own it, and
/// `DomainError::Persistence` if any write fails.
pub async fn handle_delete_story(
    command: &DeleteStory,
    store: &dyn GraphStore,
) -> Result<DeletedStory, DomainError> {
    let story_id = command.story_id;

    let mut session = store.begin().await?;
    session.lock_story(story_id).await?;
    let story = session
        .get_story(story_id)
        .await?
        .ok_or_else(|| DomainError::story_not_found(story_id))?;
    ensure_story_owner(command.actor_id, &story)?;

    let blocks_removed = session.delete_blocks_by_story(story_id).await?;
    session.delete_story(story_id).await?;
    session.commit().await?;

    info!(story_id = %story_id, blocks_removed, "story deleted");
    Ok(DeletedStory {
        story_id,
        blocks_removed,
    })
}

/// Handles `CollectUnreachable`: removes every block that cannot be reached
/// from the root, cycles included. Returns the removed ids.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the story does not exist,
/// `DomainError::Unauthorized` if the actor does not own it, and
/// `DomainError::Persistence` if any write fails.
pub async fn handle_collect_unreachable(
    command: &CollectUnreachable,
    clock: &dyn Clock,
    store: &dyn GraphStore,
) -> Result<Vec<NodeId>, DomainError> {
    let story_id = command.story_id;
    let now = clock.now();

    let mut session = store.begin().await?;
    let mut graph = load_graph(session.as_mut(), story_id).await?;
    ensure_story_owner(command.actor_id, graph.story())?;

    let removed = graph.collect_unreachable();
    if removed.is_empty() {
        return Ok(removed);
    }
    persist(session.as_mut(), graph.into_changes(), now).await?;
    session.commit().await?;

    info!(story_id = %story_id, removed = removed.len(), "unreachable blocks collected");
    Ok(removed)
}

//! Domain error types.

use std::fmt;

use thiserror::Error;

use crate::node::{NodeId, UserId};

/// The kind of record a lookup was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A story root.
    Story,
    /// A non-root block.
    Block,
    /// Either kind; used when the caller only had a bare node id.
    Node,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Story => "story",
            Self::Block => "block",
            Self::Node => "node",
        })
    }
}

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced story or block does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was being looked up.
        kind: NodeKind,
        /// The missing identifier.
        id: NodeId,
    },

    /// The actor may not modify or view the node.
    #[error("user {actor} is not allowed to access node {node}")]
    Unauthorized {
        /// The acting user.
        actor: UserId,
        /// The node the actor tried to touch.
        node: NodeId,
    },

    /// An edit command line could not be applied.
    #[error("malformed command on line {line}: {reason}")]
    MalformedCommand {
        /// One-based line number within the submitted command text.
        line: usize,
        /// Why the line was rejected.
        reason: String,
    },

    /// Input failed validation before reaching the graph.
    #[error("validation error: {0}")]
    Validation(String),

    /// The backing store failed or is unreachable.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl DomainError {
    /// Shorthand for a missing story.
    #[must_use]
    pub fn story_not_found(id: NodeId) -> Self {
        Self::NotFound {
            kind: NodeKind::Story,
            id,
        }
    }

    /// Shorthand for a missing block.
    #[must_use]
    pub fn block_not_found(id: NodeId) -> Self {
        Self::NotFound {
            kind: NodeKind::Block,
            id,
        }
    }
}

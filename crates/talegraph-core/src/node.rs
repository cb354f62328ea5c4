//! Story-graph records.
//!
//! A story is the root node of a directed graph of blocks. Both kinds of
//! node carry an ordered list of [`Edge`]s; the order is the order in which
//! choices are shown to the reader.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a story or block. Stories and blocks share one id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Identifier of a user, as supplied by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One reader choice: a label leading to a target node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// The node this choice leads to.
    pub target: NodeId,
    /// Text shown to the reader.
    pub label: String,
}

impl Edge {
    /// Creates a new edge.
    #[must_use]
    pub fn new(target: NodeId, label: impl Into<String>) -> Self {
        Self {
            target,
            label: label.into(),
        }
    }
}

/// Visibility of a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    /// Listed for every viewer.
    #[default]
    Public,
    /// Listed only for the owner.
    Private,
}

impl Privacy {
    /// Maps the persisted boolean flag (`true` = private).
    #[must_use]
    pub fn from_flag(private: bool) -> Self {
        if private { Self::Private } else { Self::Public }
    }

    /// Returns `true` for private stories.
    #[must_use]
    pub fn is_private(self) -> bool {
        matches!(self, Self::Private)
    }
}

/// Root node of a story graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Story {
    /// Story identifier, fixed at creation.
    pub id: NodeId,
    /// Owning user.
    pub owner_id: UserId,
    /// Story title.
    pub title: String,
    /// Opening text.
    pub body: String,
    /// Listing visibility.
    pub privacy: Privacy,
    /// Outgoing choices, in presentation order.
    pub edges: Vec<Edge>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Non-root node of a story graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    /// Block identifier.
    pub id: NodeId,
    /// The story this block belongs to. Never changes.
    pub story_id: NodeId,
    /// User who created the block.
    pub owner_id: UserId,
    /// Block text.
    pub body: String,
    /// Outgoing choices, in presentation order.
    pub edges: Vec<Edge>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

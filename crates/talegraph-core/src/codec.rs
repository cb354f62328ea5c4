//! Edge-list codec.
//!
//! Edge lists are persisted as JSON text. New data is written as an array of
//! explicit records, `[{"target":7,"label":"go left"}]`. The older layout of
//! single-entry maps, `[{"7":"go left"}]`, is still accepted on read.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::node::{Edge, NodeId};

/// Reasons an encoded edge list could not be read.
#[derive(Debug, Error)]
pub enum EdgeDecodeError {
    /// Not a JSON array of edge entries.
    #[error("invalid edge list: {0}")]
    Json(#[from] serde_json::Error),

    /// A legacy map entry did not hold exactly one numeric key.
    #[error("invalid legacy edge entry at index {index}: {reason}")]
    LegacyEntry {
        /// Position of the entry in the list.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EdgeRecord {
    target: NodeId,
    label: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireEdge {
    Record(EdgeRecord),
    Legacy(BTreeMap<String, String>),
}

/// Serializes and deserializes ordered edge lists.
#[derive(Debug, Clone, Copy)]
pub struct EdgeCodec;

impl EdgeCodec {
    /// Encodes `edges` in the record layout.
    #[must_use]
    pub fn encode(edges: &[Edge]) -> String {
        // Edges hold only an integer and a string, so serialization cannot fail.
        serde_json::to_string(edges).expect("edge list serialization is infallible")
    }

    /// Decodes an edge list, accepting both the record and legacy layouts.
    ///
    /// # Errors
    ///
    /// Returns `EdgeDecodeError` if `raw` is not a JSON array of edges.
    pub fn try_decode(raw: impl AsRef<[u8]>) -> Result<Vec<Edge>, EdgeDecodeError> {
        let entries: Vec<WireEdge> = serde_json::from_slice(raw.as_ref())?;
        entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| match entry {
                WireEdge::Record(record) => Ok(Edge::new(record.target, record.label)),
                WireEdge::Legacy(map) => legacy_edge(index, map),
            })
            .collect()
    }

    /// Lenient decode: malformed input yields an empty list.
    ///
    /// The stored text is never rewritten by a failed decode, so repair
    /// tooling can still read it with [`EdgeCodec::try_decode`].
    #[must_use]
    pub fn decode(raw: impl AsRef<[u8]>) -> Vec<Edge> {
        Self::try_decode(raw).unwrap_or_default()
    }
}

fn legacy_edge(index: usize, map: BTreeMap<String, String>) -> Result<Edge, EdgeDecodeError> {
    if map.len() != 1 {
        return Err(EdgeDecodeError::LegacyEntry {
            index,
            reason: format!("expected one entry, found {}", map.len()),
        });
    }
    let (key, label) = map
        .into_iter()
        .next()
        .ok_or_else(|| EdgeDecodeError::LegacyEntry {
            index,
            reason: "empty entry".to_owned(),
        })?;
    let target = key.parse::<NodeId>().map_err(|e| EdgeDecodeError::LegacyEntry {
        index,
        reason: format!("target `{key}` is not a node id: {e}"),
    })?;
    Ok(Edge::new(target, label))
}

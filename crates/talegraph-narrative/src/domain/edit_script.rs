//! The line-oriented grammar used to edit a node's choices.
//!
//! Each line is `<keyword> <rest>`:
//!
//! | line | effect |
//! |---|---|
//! | `add <label>` | new blank block, edge appended |
//! | `addTo <id> <label>` | edge to an existing node appended |
//! | `change <id> <label>` | first edge to `<id>` relabelled |
//! | `delete <id>` | `<id>` cascade-deleted, edges to it removed |

use talegraph_core::node::NodeId;
use thiserror::Error;

/// One parsed edit command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommand {
    /// Create a blank block and add a choice leading to it.
    Add {
        /// Choice label.
        label: String,
    },
    /// Add a choice leading to an existing node.
    AddTo {
        /// Existing node in the same story.
        target: NodeId,
        /// Choice label.
        label: String,
    },
    /// Relabel the first choice leading to `target`.
    Change {
        /// Node the choice leads to.
        target: NodeId,
        /// New label.
        label: String,
    },
    /// Cascade-delete `target`.
    Delete {
        /// Block to remove.
        target: NodeId,
    },
}

/// Why a command line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    /// The first word is not a known keyword.
    #[error("unknown command `{0}`")]
    UnknownKeyword(String),

    /// A required argument is absent.
    #[error("`{keyword}` needs a {argument}")]
    MissingArgument {
        /// The command keyword.
        keyword: &'static str,
        /// The absent argument.
        argument: &'static str,
    },

    /// The node id argument is not an integer.
    #[error("`{keyword}` target `{value}` is not a node id")]
    InvalidNodeId {
        /// The command keyword.
        keyword: &'static str,
        /// The offending text.
        value: String,
    },
}

impl EditCommand {
    /// Parses one line. Blank lines yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `CommandParseError` for unknown keywords, missing arguments
    /// and non-numeric ids.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Ok(None);
        }
        let (keyword, rest) = line.split_once(' ').unwrap_or((line, ""));
        let command = match keyword {
            "add" => Self::Add {
                label: required(rest, "add", "label")?,
            },
            "addTo" => {
                let (target, label) = target_and_label(rest, "addTo")?;
                Self::AddTo { target, label }
            }
            "change" => {
                let (target, label) = target_and_label(rest, "change")?;
                Self::Change { target, label }
            }
            "delete" => {
                let (id, _) = rest.split_once(' ').unwrap_or((rest, ""));
                Self::Delete {
                    target: node_id(id, "delete")?,
                }
            }
            other => return Err(CommandParseError::UnknownKeyword(other.to_owned())),
        };
        Ok(Some(command))
    }

    /// The keyword this command was written with.
    #[must_use]
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::AddTo { .. } => "addTo",
            Self::Change { .. } => "change",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Splits free text into command lines, accepting `\n` and `\r\n`.
#[must_use]
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_owned).collect()
}

fn required(
    value: &str,
    keyword: &'static str,
    argument: &'static str,
) -> Result<String, CommandParseError> {
    if value.trim().is_empty() {
        Err(CommandParseError::MissingArgument { keyword, argument })
    } else {
        Ok(value.to_owned())
    }
}

fn node_id(value: &str, keyword: &'static str) -> Result<NodeId, CommandParseError> {
    if value.is_empty() {
        return Err(CommandParseError::MissingArgument {
            keyword,
            argument: "node id",
        });
    }
    value
        .parse()
        .map_err(|_| CommandParseError::InvalidNodeId {
            keyword,
            value: value.to_owned(),
        })
}

fn target_and_label(
    rest: &str,
    keyword: &'static str,
) -> Result<(NodeId, String), CommandParseError> {
    let (id, label) = rest.split_once(' ').unwrap_or((rest, ""));
    let target = node_id(id, keyword)?;
    Ok((target, required(label, keyword, "label")?))
}

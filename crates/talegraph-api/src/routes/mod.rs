//! Route modules, one per resource.

use axum::Router;
use serde::Deserialize;
use talegraph_narrative::domain::edit_script::split_lines;

use crate::state::AppState;

pub mod blocks;
pub mod health;
pub mod stories;

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/stories", stories::router())
        .nest("/api/v1/blocks", blocks::router())
        .with_state(state)
}

/// Multi-line input accepted either as a JSON array of lines or as one
/// string with embedded newlines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LineInput {
    /// One element per line.
    Lines(Vec<String>),
    /// Free text split on `\n` / `\r\n`.
    Text(String),
}

impl Default for LineInput {
    fn default() -> Self {
        Self::Lines(Vec::new())
    }
}

impl LineInput {
    /// The input as individual lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        match self {
            Self::Lines(lines) => lines,
            Self::Text(text) => split_lines(&text),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_input_accepts_array_or_text() {
        let lines: LineInput = serde_json::from_str(r#"["add a", "add b"]"#).unwrap();
        let text: LineInput = serde_json::from_str(r#""add a\r\nadd b""#).unwrap();

        assert_eq!(lines.into_lines(), vec!["add a", "add b"]);
        assert_eq!(text.into_lines(), vec!["add a", "add b"]);
        assert!(LineInput::default().into_lines().is_empty());
    }
}

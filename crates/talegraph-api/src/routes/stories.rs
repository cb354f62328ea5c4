//! Routes for stories: listing, creation, the root node and maintenance.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use talegraph_core::node::{NodeId, Privacy};
use talegraph_narrative::application::command_handlers::{CreatedStory, DeletedStory, EditReport};
use talegraph_narrative::application::query_handlers::{GraphAudit, StorySummary, StoryView};
use talegraph_narrative::domain::commands;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::extract::{Actor, Viewer};
use crate::routes::LineInput;
use crate::state::AppState;

/// Query string for GET /.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Maximum number of stories; defaults to the configured limit.
    pub limit: Option<i64>,
}

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateStoryRequest {
    /// Story title.
    pub title: String,
    /// Opening text.
    pub body: String,
    /// Choice labels; blank lines are skipped.
    #[serde(default)]
    pub options: LineInput,
    /// Hide the story from everyone but its owner.
    #[serde(default)]
    pub private: bool,
}

/// Request body for PUT /{story_id}.
#[derive(Debug, Deserialize)]
pub struct EditStoryRequest {
    /// New title; unchanged if absent.
    pub title: Option<String>,
    /// New opening text.
    pub body: String,
    /// Edit commands for the root's choices.
    #[serde(default)]
    pub commands: LineInput,
}

/// Response body listing removed block ids.
#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    /// Removed blocks, in removal order.
    pub removed: Vec<NodeId>,
}

/// GET /
#[instrument(skip_all)]
async fn list_stories(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StorySummary>>, ApiError> {
    let stories = state.service.list_visible(viewer.0, query.limit).await?;
    Ok(Json(stories))
}

/// POST /
#[instrument(skip(state, request), fields(actor_id = %actor.0))]
async fn create_story(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateStoryRequest>,
) -> Result<(StatusCode, Json<CreatedStory>), ApiError> {
    let command = commands::CreateStory {
        owner_id: actor.0,
        title: request.title,
        body: request.body,
        option_labels: request.options.into_lines(),
        privacy: Privacy::from_flag(request.private),
    };

    info!(choices = command.option_labels.len(), "handling create_story command");

    let created = state.service.create_story(&command).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /{story_id}
#[instrument(skip(state))]
async fn get_story(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(story_id): Path<NodeId>,
) -> Result<Json<StoryView>, ApiError> {
    let view = state.service.story_view(story_id, viewer.0).await?;
    Ok(Json(view))
}

/// PUT /{story_id}
#[instrument(skip(state, request), fields(actor_id = %actor.0))]
async fn edit_story(
    State(state): State<AppState>,
    actor: Actor,
    Path(story_id): Path<NodeId>,
    Json(request): Json<EditStoryRequest>,
) -> Result<Json<EditReport>, ApiError> {
    let command = commands::EditNode {
        node_id: story_id,
        actor_id: actor.0,
        title: request.title,
        body: request.body,
        commands: request.commands.into_lines(),
    };

    info!(lines = command.commands.len(), "handling edit_node command");

    let report = state.service.edit_node(&command).await?;
    Ok(Json(report))
}

/// DELETE /{story_id}
#[instrument(skip(state), fields(actor_id = %actor.0))]
async fn delete_story(
    State(state): State<AppState>,
    actor: Actor,
    Path(story_id): Path<NodeId>,
) -> Result<Json<DeletedStory>, ApiError> {
    let command = commands::DeleteStory {
        story_id,
        actor_id: actor.0,
    };
    let deleted = state.service.delete_story(&command).await?;
    Ok(Json(deleted))
}

/// POST /{story_id}/collect
#[instrument(skip(state), fields(actor_id = %actor.0))]
async fn collect_unreachable(
    State(state): State<AppState>,
    actor: Actor,
    Path(story_id): Path<NodeId>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let command = commands::CollectUnreachable {
        story_id,
        actor_id: actor.0,
    };
    let removed = state.service.collect_unreachable(&command).await?;
    Ok(Json(RemovedResponse { removed }))
}

/// GET /{story_id}/audit
#[instrument(skip(state))]
async fn audit_story(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(story_id): Path<NodeId>,
) -> Result<Json<GraphAudit>, ApiError> {
    let audit = state.service.audit_story(story_id, viewer.0).await?;
    Ok(Json(audit))
}

/// Returns the router for stories.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_stories).post(create_story))
        .route(
            "/{story_id}",
            get(get_story).put(edit_story).delete(delete_story),
        )
        .route("/{story_id}/collect", post(collect_unreachable))
        .route("/{story_id}/audit", get(audit_story))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use talegraph_narrative::application::settings::NarrativeSettings;
    use talegraph_test_support::{FailingGraphStore, InMemoryGraphStore};

    use crate::routes::test_helpers::{app, app_with, send};

    const OWNER: i64 = 1;
    const STRANGER: i64 = 2;

    async fn create(store: &InMemoryGraphStore, body: Value) -> Value {
        let (status, json) = send(
            app(Arc::new(store.clone())),
            "POST",
            "/api/v1/stories",
            Some(OWNER),
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        json
    }

    #[tokio::test]
    async fn test_create_story_returns_201_and_wires_choices() {
        // Arrange
        let store = InMemoryGraphStore::new();

        // Act
        let created = create(
            &store,
            json!({ "title": "The Cave", "body": "It is dark.", "options": "go left\n\ngo right" }),
        )
        .await;

        // Assert
        let story_id = created["story_id"].as_i64().unwrap();
        let block_ids = created["block_ids"].as_array().unwrap();
        assert_eq!(block_ids.len(), 2);

        let (status, view) = send(
            app(Arc::new(store)),
            "GET",
            &format!("/api/v1/stories/{story_id}"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["story"]["title"], "The Cave");
        assert_eq!(view["story"]["edges"][0]["label"], "go left");
        assert_eq!(view["story"]["edges"][1]["target"], block_ids[1]);
        assert_eq!(view["blocks"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_story_without_actor_returns_401() {
        let app = app(Arc::new(InMemoryGraphStore::new()));

        let (status, json) = send(
            app,
            "POST",
            "/api/v1/stories",
            None,
            Some(json!({ "title": "The Cave", "body": "It is dark." })),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "missing_actor");
    }

    #[tokio::test]
    async fn test_create_story_with_blank_title_returns_400() {
        let app = app(Arc::new(InMemoryGraphStore::new()));

        let (status, json) = send(
            app,
            "POST",
            "/api/v1/stories",
            Some(OWNER),
            Some(json!({ "title": " ", "body": "It is dark." })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_private_story_is_hidden_from_other_readers() {
        // Arrange
        let store = InMemoryGraphStore::new();
        let created = create(
            &store,
            json!({ "title": "Diary", "body": "Dear diary.", "private": true }),
        )
        .await;
        let uri = format!("/api/v1/stories/{}", created["story_id"]);

        // Act
        let (as_stranger, json) =
            send(app(Arc::new(store.clone())), "GET", &uri, Some(STRANGER), None).await;
        let (as_owner, _) = send(app(Arc::new(store.clone())), "GET", &uri, Some(OWNER), None).await;
        let (_, listing) = send(app(Arc::new(store)), "GET", "/api/v1/stories", None, None).await;

        // Assert
        assert_eq!(as_stranger, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "unauthorized");
        assert_eq!(as_owner, StatusCode::OK);
        assert!(listing.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_stories_honours_limit() {
        // Arrange
        let store = InMemoryGraphStore::new();
        for title in ["One", "Two", "Three"] {
            create(&store, json!({ "title": title, "body": "text" })).await;
        }

        // Act
        let (status, json) = send(
            app(Arc::new(store)),
            "GET",
            "/api/v1/stories?limit=2",
            None,
            None,
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        let titles: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Three", "Two"]);
    }

    #[tokio::test]
    async fn test_edit_story_returns_line_report() {
        // Arrange
        let store = InMemoryGraphStore::new();
        let created = create(&store, json!({ "title": "The Cave", "body": "It is dark." })).await;
        let uri = format!("/api/v1/stories/{}", created["story_id"]);

        // Act
        let (status, report) = send(
            app(Arc::new(store.clone())),
            "PUT",
            &uri,
            Some(OWNER),
            Some(json!({
                "title": "The Deep Cave",
                "body": "It is very dark.",
                "commands": ["add light a torch", "change 999 nothing", "jump"]
            })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["lines"][0]["status"], "applied");
        assert_eq!(report["lines"][1]["status"], "no_op");
        assert_eq!(report["lines"][2]["status"], "rejected");
        assert_eq!(report["created"].as_array().unwrap().len(), 1);

        let (_, view) = send(app(Arc::new(store)), "GET", &uri, None, None).await;
        assert_eq!(view["story"]["title"], "The Deep Cave");
        assert_eq!(view["story"]["edges"][0]["label"], "light a torch");
    }

    #[tokio::test]
    async fn test_edit_story_in_strict_mode_returns_400() {
        // Arrange
        let store = InMemoryGraphStore::new();
        let created = create(&store, json!({ "title": "The Cave", "body": "It is dark." })).await;
        let settings = NarrativeSettings {
            strict_commands: true,
            ..NarrativeSettings::default()
        };
        let app = app_with(Arc::new(store), settings);

        // Act
        let (status, json) = send(
            app,
            "PUT",
            &format!("/api/v1/stories/{}", created["story_id"]),
            Some(OWNER),
            Some(json!({ "body": "x", "commands": "add ok\njump" })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "malformed_command");
    }

    #[tokio::test]
    async fn test_delete_story_by_owner_then_get_returns_404() {
        // Arrange
        let store = InMemoryGraphStore::new();
        let created = create(
            &store,
            json!({ "title": "The Cave", "body": "It is dark.", "options": ["in"] }),
        )
        .await;
        let uri = format!("/api/v1/stories/{}", created["story_id"]);

        // Act
        let (forbidden, _) =
            send(app(Arc::new(store.clone())), "DELETE", &uri, Some(STRANGER), None).await;
        let (status, deleted) =
            send(app(Arc::new(store.clone())), "DELETE", &uri, Some(OWNER), None).await;
        let (after, json) = send(app(Arc::new(store)), "GET", &uri, Some(OWNER), None).await;

        // Assert
        assert_eq!(forbidden, StatusCode::FORBIDDEN);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["blocks_removed"], 1);
        assert_eq!(after, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not_found");
    }

    #[tokio::test]
    async fn test_audit_and_collect_on_clean_story() {
        // Arrange
        let store = InMemoryGraphStore::new();
        let created = create(
            &store,
            json!({ "title": "The Cave", "body": "It is dark.", "options": ["in"] }),
        )
        .await;
        let story_id = &created["story_id"];

        // Act
        let (audit_status, audit) = send(
            app(Arc::new(store.clone())),
            "GET",
            &format!("/api/v1/stories/{story_id}/audit"),
            None,
            None,
        )
        .await;
        let (collect_status, collected) = send(
            app(Arc::new(store)),
            "POST",
            &format!("/api/v1/stories/{story_id}/collect"),
            Some(OWNER),
            None,
        )
        .await;

        // Assert
        assert_eq!(audit_status, StatusCode::OK);
        assert!(audit["unreachable"].as_array().unwrap().is_empty());
        assert!(audit["dangling_edges"].as_array().unwrap().is_empty());
        assert_eq!(collect_status, StatusCode::OK);
        assert!(collected["removed"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_returns_500() {
        let app = app(Arc::new(FailingGraphStore));

        let (status, json) = send(app, "GET", "/api/v1/stories", None, None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "persistence_error");
    }

    #[tokio::test]
    async fn test_non_numeric_story_id_is_rejected() {
        let app = app(Arc::new(InMemoryGraphStore::new()));

        let (status, _) = send(app, "GET", "/api/v1/stories/abc", None, None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

//! Routes for individual blocks.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use talegraph_core::node::NodeId;
use talegraph_narrative::application::command_handlers::EditReport;
use talegraph_narrative::application::query_handlers::BlockView;
use talegraph_narrative::domain::commands;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::extract::{Actor, Viewer};
use crate::routes::LineInput;
use crate::routes::stories::RemovedResponse;
use crate::state::AppState;

/// Request body for PUT /{block_id}.
#[derive(Debug, Deserialize)]
pub struct EditBlockRequest {
    /// New block text.
    pub body: String,
    /// Edit commands for the block's choices.
    #[serde(default)]
    pub commands: LineInput,
}

/// GET /{block_id}
#[instrument(skip(state))]
async fn get_block(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(block_id): Path<NodeId>,
) -> Result<Json<BlockView>, ApiError> {
    let view = state.service.block_view(block_id, viewer.0).await?;
    Ok(Json(view))
}

/// PUT /{block_id}
#[instrument(skip(state, request), fields(actor_id = %actor.0))]
async fn edit_block(
    State(state): State<AppState>,
    actor: Actor,
    Path(block_id): Path<NodeId>,
    Json(request): Json<EditBlockRequest>,
) -> Result<Json<EditReport>, ApiError> {
    let command = commands::EditNode {
        node_id: block_id,
        actor_id: actor.0,
        title: None,
        body: request.body,
        commands: request.commands.into_lines(),
    };

    info!(lines = command.commands.len(), "handling edit_node command");

    let report = state.service.edit_node(&command).await?;
    Ok(Json(report))
}

/// DELETE /{block_id}
#[instrument(skip(state), fields(actor_id = %actor.0))]
async fn delete_block(
    State(state): State<AppState>,
    actor: Actor,
    Path(block_id): Path<NodeId>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let command = commands::DeleteNode {
        block_id,
        actor_id: actor.0,
    };
    let removed = state.service.delete_node(&command).await?;
    Ok(Json(RemovedResponse { removed }))
}

/// Returns the router for blocks.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{block_id}",
        get(get_block).put(edit_block).delete(delete_block),
    )
}

//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sqlx::PgPool;
use talegraph_narrative::application::service::NarrativeService;
use talegraph_narrative::application::settings::NarrativeSettings;
use talegraph_store::pg_graph_store::PgGraphStore;
use talegraph_test_support::FixedClock;
use tower::ServiceExt;

use talegraph_api::extract::ACTOR_HEADER;
use talegraph_api::routes;
use talegraph_api::state::AppState;

/// Build the full app router over a real `PgGraphStore` and a fixed clock.
/// Uses the same route structure as `main.rs`.
pub fn build_test_app(pool: PgPool) -> Router {
    let service = NarrativeService::new(
        Arc::new(PgGraphStore::new(pool)),
        Arc::new(FixedClock::default()),
        NarrativeSettings::default(),
    );
    routes::build_router(AppState::new(service))
}

async fn send(
    app: Router,
    request: Request<Body>,
) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

    (status, json)
}

/// Send a request with a JSON body as `actor` and return the response.
pub async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    actor: i64,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(ACTOR_HEADER, actor.to_string())
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a bodiless request, optionally as `actor`, and return the response.
pub async fn send_empty(
    app: Router,
    method: &str,
    uri: &str,
    actor: Option<i64>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header(ACTOR_HEADER, actor.to_string());
    }

    send(app, builder.body(Body::empty()).unwrap()).await
}

/// Send a GET request anonymously and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send_empty(app, "GET", uri, None).await
}

//! Talegraph API server entry point.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use talegraph_api::config::ApiConfig;
use talegraph_api::error::AppError;
use talegraph_api::routes;
use talegraph_api::state::AppState;
use talegraph_core::clock::SystemClock;
use talegraph_narrative::application::service::NarrativeService;
use talegraph_store::pg_graph_store::PgGraphStore;
use talegraph_store::schema::MIGRATOR;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Talegraph API server");

    let config = ApiConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    MIGRATOR.run(&pool).await?;

    let service = NarrativeService::new(
        Arc::new(PgGraphStore::new(pool)),
        Arc::new(SystemClock),
        config.narrative,
    );

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = routes::build_router(AppState::new(service))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.socket_addr()?;
    tracing::info!(%addr, strict_commands = config.narrative.strict_commands, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

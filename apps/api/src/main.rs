mod agent;
mod capability;
mod checkpoint;
mod config;
mod errors;
mod models;
mod pipeline;
mod reference;
mod routes;
mod sessions;
mod state;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::capability::anthropic::{AnthropicProvider, FALLBACK_MODEL, PRIMARY_MODEL};
use crate::capability::{Provider, StructuredOutputCapability};
use crate::checkpoint::PgCheckpointStore;
use crate::config::Config;
use crate::pipeline::orchestrator::{PipelineOrchestrator, PipelineSettings};
use crate::reference::PgReferenceStore;
use crate::routes::build_router;
use crate::sessions::SessionRegistry;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Postsmith API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    info!("Connecting to PostgreSQL...");
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    info!("PostgreSQL connection pool established");

    // Model providers in failover order
    let providers: Vec<Arc<dyn Provider>> = vec![
        Arc::new(AnthropicProvider::new(
            "anthropic-primary",
            config.anthropic_api_key.clone(),
            PRIMARY_MODEL,
        )),
        Arc::new(AnthropicProvider::new(
            "anthropic-fallback",
            config.anthropic_api_key.clone(),
            FALLBACK_MODEL,
        )),
    ];
    let capability = Arc::new(StructuredOutputCapability::new(providers));
    info!("Generation capability initialized ({PRIMARY_MODEL} -> {FALLBACK_MODEL})");

    // Reference data, checkpoints, and the feedback session registry
    let reference = Arc::new(PgReferenceStore::new(db.clone()));
    let checkpoints = Arc::new(PgCheckpointStore::new(db.clone()));
    let sessions = Arc::new(SessionRegistry::new(Duration::from_secs(
        config.feedback_session_ttl_secs,
    )));

    // Pipeline orchestrator
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        Arc::clone(&capability),
        reference,
        checkpoints,
        Arc::clone(&sessions),
        PipelineSettings::from_config(&config),
    ));

    // Build app state
    let state = AppState {
        orchestrator,
        sessions,
        capability,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

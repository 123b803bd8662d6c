//! HTTP/SSE server for the resume-authoring pipeline (axum).
//!
//! Exposes session and pipeline-control routes plus an SSE stream per
//! session; see [`routes::router`] for the full route table.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`].

mod auth;
mod error;
mod metrics;
mod rate_limit;
mod rate_limit_middleware;
mod request_id;
mod routes;
mod state;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::net::TcpListener;
use tracing::info;

use config::PipelineConfig;
use pipeline::{
    ChatOpenAI, InMemoryPipelineStateStore, InMemoryUsageStore, ModelProfile, ProfileModelRouter,
    SqlitePipelineStateStore, SqliteUsageStore, StageToolkits,
};

pub use state::AppState;

const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8080";

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Builds the default production [`AppState`]: a SQLite-backed pipeline
/// store and usage ledger (falling back to in-memory stores if the
/// configured database file can't be opened), a [`ProfileModelRouter`]
/// backed by `OPENAI_API_KEY`, and config from the environment.
fn default_state() -> Arc<AppState> {
    let config = PipelineConfig::from_env();

    let pipeline_db = std::env::var("PIPELINE_DB").unwrap_or_else(|_| "pipeline.db".to_string());
    let store: Arc<dyn pipeline::PipelineStateStore> =
        match SqlitePipelineStateStore::new(&pipeline_db) {
            Ok(store) => Arc::new(store),
            Err(err) => {
                tracing::warn!(error = %err, path = %pipeline_db, "falling back to in-memory pipeline state store");
                Arc::new(InMemoryPipelineStateStore::new())
            }
        };

    let usage_db = std::env::var("USAGE_DB").unwrap_or_else(|_| "usage.db".to_string());
    let usage_store: Arc<dyn pipeline::UsageStore> = match SqliteUsageStore::new(&usage_db) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::warn!(error = %err, path = %usage_db, "falling back to in-memory usage store");
            Arc::new(InMemoryUsageStore::new())
        }
    };

    let model = std::env::var("PIPELINE_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    let light_model =
        std::env::var("PIPELINE_LIGHT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    let router = ProfileModelRouter::new(Arc::new(ChatOpenAI::new(model)))
        .with_profile(ModelProfile::Light, Arc::new(ChatOpenAI::new(light_model)));

    Arc::new(AppState::new(
        store,
        usage_store,
        router,
        StageToolkits::new(),
        config,
    ))
}

/// Runs the server on an existing listener. Used directly by production
/// startup and by integration tests (bind `127.0.0.1:0`, pass the listener
/// in, read back the assigned port).
pub async fn run_serve_on_listener(
    listener: TcpListener,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("pipeline server listening on http://{}", addr);
    let app = routes::router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Runs the server, binding `addr` (default `127.0.0.1:8080`) and building
/// the default production [`AppState`] from the environment.
pub async fn run_serve(
    addr: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_HTTP_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener, default_state()).await
}

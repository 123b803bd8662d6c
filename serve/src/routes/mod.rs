//! Route modules and the top-level [`axum::Router`] assembly.

pub mod health;
pub mod pipeline;
pub mod sessions;
pub mod sse;
pub mod workflow;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::metrics::metrics_middleware;
use crate::rate_limit_middleware::rate_limit_middleware;
use crate::request_id::request_id_middleware;
use crate::state::AppState;

/// Builds the full application router: unauthenticated liveness endpoints
/// plus the rate-limited, request-id-tagged `/api` tree.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/sessions", post(sessions::create_session).get(sessions::list_sessions))
        .route("/sessions/:id/resume", get(sessions::get_resume))
        .route("/sessions/:id/sse", get(sse::stream_session))
        .route("/pipeline/start", post(pipeline::start))
        .route("/pipeline/respond", post(pipeline::respond))
        .route("/workflow/:id", get(workflow::get_workflow))
        .route(
            "/workflow/:id/benchmark/assumptions",
            post(workflow::benchmark_assumptions),
        )
        .route("/workflow/:id/restart", post(workflow::restart))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(health::metrics))
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

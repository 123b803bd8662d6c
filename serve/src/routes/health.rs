//! Liveness, readiness, and metrics endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// `GET /health` — liveness only; never touches the store or an LLM.
pub async fn health() -> Response {
    let mut response = (StatusCode::OK, "ok").into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, "no-store".parse().unwrap());
    response
}

#[derive(Serialize)]
struct ReadyBody {
    ready: bool,
    db_ok: bool,
    llm_key_ok: bool,
}

/// `GET /ready` — checks the durable store is reachable and an LLM
/// credential is configured. 200 when both hold, 503 otherwise.
pub async fn ready(State(state): State<Arc<AppState>>) -> Response {
    let db_ok = state.store.count_active().await.is_ok();
    let llm_key_ok = std::env::var("OPENAI_API_KEY")
        .map(|v| !v.is_empty())
        .unwrap_or(false);
    let ready = db_ok && llm_key_ok;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let mut response = (
        status,
        Json(ReadyBody {
            ready,
            db_ok,
            llm_key_ok,
        }),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, "no-store".parse().unwrap());
    response
}

/// `GET /metrics` — counters and a latency histogram. See [`crate::metrics`].
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let mut response = (StatusCode::OK, Json(state.metrics.snapshot())).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, "no-store".parse().unwrap());
    response
}

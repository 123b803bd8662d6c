//! `/api/pipeline/start` and `/api/pipeline/respond`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use pipeline::{capacity, AdvanceOutcome};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StartRequest {
    pub session_id: String,
}

#[derive(Serialize)]
pub struct StartResponse {
    pub session_id: String,
    pub status: &'static str,
}

/// `POST /api/pipeline/start` — admits the session (ownership, then global,
/// then per-user capacity) and spawns the stage loop. Returns immediately;
/// progress is reported over the session's SSE stream.
pub async fn start(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    let loaded = state
        .store
        .load(&body.session_id)
        .await
        .map_err(ApiError::from)?;
    capacity::check_ownership(loaded.as_ref(), &user_id).map_err(ApiError::from)?;

    capacity::check_global_capacity(state.store.as_ref(), state.config.max_global_pipelines)
        .await
        .map_err(ApiError::from)?;
    capacity::claim_pipeline_slot(
        state.store.as_ref(),
        &user_id,
        state.config.max_pipelines_per_user,
    )
    .await
    .map_err(ApiError::from)?;

    let mut pipeline_state = loaded.expect("checked by check_ownership");
    let session_id = pipeline_state.session_id.clone();
    let bus = state
        .fanout
        .bus(&session_id)
        .unwrap_or_else(|| state.fanout.register(session_id.clone(), user_id.clone()));

    let store = state.store.clone();
    let coordinator = state.coordinator.clone();
    let metrics = state.metrics.clone();
    tokio::spawn(async move {
        loop {
            match coordinator.advance_stage(&mut pipeline_state, &bus).await {
                Ok(AdvanceOutcome::Advanced { .. }) => {
                    if let Err(err) = store.save(&pipeline_state).await {
                        tracing::error!(session_id = %pipeline_state.session_id, error = %err, "failed to persist stage advance");
                        break;
                    }
                }
                Ok(AdvanceOutcome::Complete) => {
                    metrics.record_usage(&pipeline_state.usage);
                    let _ = store.save(&pipeline_state).await;
                    break;
                }
                Err(err) => {
                    tracing::error!(session_id = %pipeline_state.session_id, error = %err, "stage advance failed");
                    let _ = store.save(&pipeline_state).await;
                    break;
                }
            }
        }
    });

    Ok(Json(StartResponse {
        session_id: body.session_id,
        status: "started",
    }))
}

#[derive(Deserialize)]
pub struct RespondRequest {
    pub session_id: String,
    pub gate: String,
    pub response: serde_json::Value,
}

#[derive(Serialize)]
pub struct RespondResponse {
    pub status: &'static str,
}

/// `POST /api/pipeline/respond` — answers a pending gate. `200 {status:
/// "ok"}` if a waiter was woken, `{status: "buffered"}` if the coordinator
/// hasn't parked yet (the response is applied as soon as it does).
pub async fn respond(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<RespondRequest>,
) -> Result<Json<RespondResponse>, ApiError> {
    let pipeline_state = state
        .store
        .load(&body.session_id)
        .await
        .map_err(ApiError::from)?;
    let pipeline_state = match pipeline_state {
        Some(s) if s.user_id == user_id => s,
        _ => return Err(ApiError::NotFoundOrForbidden),
    };

    let now_millis = crate::now_millis();
    let outcome = state
        .gates
        .respond(
            &body.session_id,
            &body.gate,
            body.response,
            &pipeline_state,
            now_millis,
        )
        .map_err(ApiError::from)?;

    let status = match outcome {
        pipeline::RespondOutcome::Woken => "ok",
        pipeline::RespondOutcome::Buffered => "buffered",
    };
    Ok(Json(RespondResponse { status }))
}

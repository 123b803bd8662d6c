//! `/api/workflow/:id` and its benchmark/restart sub-routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use pipeline::{PipelineState, PipelineStatus, Stage};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

async fn load_owned(
    state: &AppState,
    user_id: &str,
    session_id: &str,
) -> Result<PipelineState, ApiError> {
    let loaded = state.store.load(session_id).await.map_err(ApiError::from)?;
    match loaded {
        Some(s) if s.user_id == user_id => Ok(s),
        _ => Err(ApiError::NotFoundOrForbidden),
    }
}

#[derive(Serialize)]
pub struct WorkflowView {
    pub session_id: String,
    pub stage: String,
    pub status: PipelineStatus,
    pub approved_sections: Vec<String>,
    pub revision_counts: std::collections::HashMap<String, u32>,
    pub replan_phase: Option<String>,
    pub draft_ready: bool,
}

impl From<&PipelineState> for WorkflowView {
    fn from(state: &PipelineState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            stage: state.stage.as_str().to_string(),
            status: state.status,
            approved_sections: state.approved_sections.iter().cloned().collect(),
            revision_counts: state.revision_counts.clone(),
            replan_phase: state.replan_phase.map(|p| format!("{p:?}").to_lowercase()),
            draft_ready: state.stage.index() >= Stage::SectionReview.index(),
        }
    }
}

/// `GET /api/workflow/:id` — a status summary distinct from the raw session
/// record: approvals, revision counts, and replan progress, without the
/// scratchpad bodies.
pub async fn get_workflow(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<WorkflowView>, ApiError> {
    let pipeline_state = load_owned(&state, &user_id, &session_id).await?;
    Ok(Json(WorkflowView::from(&pipeline_state)))
}

#[derive(Deserialize)]
pub struct BenchmarkAssumptionsRequest {
    #[serde(default)]
    pub confirm_rebuild: bool,
}

#[derive(Serialize)]
pub struct BenchmarkAssumptionsResponse {
    pub status: &'static str,
}

/// `POST /api/workflow/:id/benchmark/assumptions` — requests a mid-run
/// replan. Refused with `409 BENCHMARK_REBUILD_CONFIRM_REQUIRED` once
/// section writing has started unless `confirm_rebuild` is set.
pub async fn benchmark_assumptions(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(session_id): Path<String>,
    Json(body): Json<BenchmarkAssumptionsRequest>,
) -> Result<Json<BenchmarkAssumptionsResponse>, ApiError> {
    let mut pipeline_state = load_owned(&state, &user_id, &session_id).await?;
    state
        .coordinator
        .request_replan(&mut pipeline_state, body.confirm_rebuild)
        .map_err(ApiError::from)?;
    state
        .store
        .save(&pipeline_state)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(BenchmarkAssumptionsResponse { status: "accepted" }))
}

#[derive(Serialize)]
pub struct RestartResponse {
    pub session_id: String,
    pub stage: String,
}

/// `POST /api/workflow/:id/restart` — resets the run back to `intake`,
/// keeping the session id, owner, and every scratchpad already produced (a
/// restart re-drives the stage graph from saved inputs; it does not erase
/// prior work, since there is no separate "original inputs" record to
/// restart from — `scratchpads["intake"]`, if present, is what a fresh
/// `advance_stage` call will read back).
pub async fn restart(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<RestartResponse>, ApiError> {
    let mut pipeline_state = load_owned(&state, &user_id, &session_id).await?;
    pipeline_state.stage = Stage::Intake;
    pipeline_state.status = PipelineStatus::Running;
    pipeline_state.error = None;
    pipeline_state.clear_pending_gate();
    pipeline_state.clear_replan_phase();
    pipeline_state.updated_at_millis = crate::now_millis();
    state
        .store
        .save(&pipeline_state)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(RestartResponse {
        session_id: pipeline_state.session_id,
        stage: pipeline_state.stage.as_str().to_string(),
    }))
}

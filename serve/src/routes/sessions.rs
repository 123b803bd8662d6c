//! `/api/sessions` and `/api/sessions/:id/...`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use pipeline::{PipelineState, PipelineStatus};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

#[derive(Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub pipeline_stage: String,
    pub pipeline_status: PipelineStatus,
    pub pending_gate: Option<String>,
    pub total_prompt_tokens: u32,
    pub total_completion_tokens: u32,
    pub total_tokens: u32,
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub updated_at_millis: u64,
}

impl From<&PipelineState> for SessionView {
    fn from(state: &PipelineState) -> Self {
        let (company_name, job_title) = state.company_and_job_title();
        Self {
            session_id: state.session_id.clone(),
            pipeline_stage: state.stage.as_str().to_string(),
            pipeline_status: state.status,
            pending_gate: state.pending_gate.as_ref().map(|g| g.name.clone()),
            total_prompt_tokens: state.usage.prompt_tokens,
            total_completion_tokens: state.usage.completion_tokens,
            total_tokens: state.usage.total_tokens,
            company_name,
            job_title,
            updated_at_millis: state.updated_at_millis,
        }
    }
}

#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session: SessionView,
}

/// `POST /api/sessions` — creates a new, unstarted session for the caller.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let pipeline_state = PipelineState::new(session_id.clone(), user_id.clone());
    state
        .store
        .save(&pipeline_state)
        .await
        .map_err(ApiError::from)?;
    state.fanout.register(session_id, user_id);
    Ok(Json(CreateSessionResponse {
        session: SessionView::from(&pipeline_state),
    }))
}

#[derive(Deserialize)]
pub struct ListSessionsQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionView>,
}

/// `GET /api/sessions` — the caller's sessions, newest first, capped at
/// [`MAX_LIST_LIMIT`] regardless of the requested `limit`.
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<ListSessionsResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);
    let mut sessions = state
        .store
        .list_for_user(&user_id)
        .await
        .map_err(ApiError::from)?;
    sessions.sort_by(|a, b| b.updated_at_millis.cmp(&a.updated_at_millis));
    sessions.truncate(limit);
    Ok(Json(ListSessionsResponse {
        sessions: sessions.iter().map(SessionView::from).collect(),
    }))
}

#[derive(Serialize)]
pub struct ResumeResponse {
    pub session_id: String,
    pub content: String,
}

/// `GET /api/sessions/:id/resume` — the latest rendered resume, taken from
/// the quality-review stage's scratchpad (the last stage before completion
/// that holds the full document). 404 if the stage hasn't produced output
/// yet or the caller doesn't own the session; 400 on a malformed UUID.
pub async fn get_resume(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<ResumeResponse>, ApiError> {
    uuid::Uuid::parse_str(&session_id)
        .map_err(|_| ApiError::Validation("session id must be a UUID".to_string()))?;

    let pipeline_state = state
        .store
        .load(&session_id)
        .await
        .map_err(ApiError::from)?;
    let pipeline_state = match pipeline_state {
        Some(s) if s.user_id == user_id => s,
        _ => return Err(ApiError::NotFoundOrForbidden),
    };

    let content = pipeline_state
        .scratchpads
        .get(pipeline::Stage::QualityReview.as_str())
        .cloned()
        .ok_or(ApiError::NotFoundOrForbidden)?;

    Ok(Json(ResumeResponse { session_id, content }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_view_hides_last_panel_but_surfaces_derived_fields() {
        let mut state = PipelineState::new("s1", "u1");
        state.set_last_panel(
            "intake",
            serde_json::json!({"company_name": "Acme", "job_title": "Engineer"}),
        );
        let view = SessionView::from(&state);
        assert_eq!(view.company_name.as_deref(), Some("Acme"));
        assert_eq!(view.job_title.as_deref(), Some("Engineer"));
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("last_panel_data").is_none());
        assert!(json.get("last_panel").is_none());
    }
}

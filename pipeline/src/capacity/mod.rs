//! Capacity & Admission: the three ordered checks a new pipeline run must
//! pass before the coordinator starts working, plus the atomic per-user
//! slot claim that backs the second and third checks.
//!
//! Order matters: ownership before capacity, global cap before per-user cap.
//! A database error on the capacity check **fails open** — an outage should
//! not additionally take down the ability to start new work — while an
//! ownership check that can't resolve the session at all is a 404, not a
//! capacity failure.

use crate::pipeline_state::{PipelineState, PipelineStateError, PipelineStateStore};

/// Default global concurrent-pipeline cap.
pub const DEFAULT_MAX_GLOBAL_PIPELINES: u64 = 10;

/// Default per-user concurrent-pipeline cap.
pub const DEFAULT_MAX_PIPELINES_PER_USER: u64 = 2;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AdmissionError {
    #[error("session not found")]
    NotOwner,
    #[error("global pipeline capacity reached")]
    CapacityLimit,
}

/// Result of an ownership check: found-and-owned, or not.
pub fn check_ownership<'a>(
    state: Option<&'a PipelineState>,
    user_id: &str,
) -> Result<&'a PipelineState, AdmissionError> {
    match state {
        Some(state) if state.user_id == user_id => Ok(state),
        _ => Err(AdmissionError::NotOwner),
    }
}

/// Global admission cap. On a store error, fails open (admits the request)
/// rather than blocking all new pipelines on a transient storage outage.
pub async fn check_global_capacity(
    store: &dyn PipelineStateStore,
    max_global: u64,
) -> Result<(), AdmissionError> {
    match store.count_active().await {
        Ok(count) if count >= max_global => Err(AdmissionError::CapacityLimit),
        Ok(_) => Ok(()),
        Err(_) => Ok(()), // fail open
    }
}

/// Atomically claims a per-user pipeline slot: checks the user's active
/// count against `max_per_user` and, if under cap, the caller proceeds to
/// persist a new [`PipelineState`] for that user. Unlike the global check,
/// this does **not** fail open — a per-user store error surfaces to the
/// caller so a single user's storage problem can't be worked around by
/// starting unlimited pipelines for them.
pub async fn claim_pipeline_slot(
    store: &dyn PipelineStateStore,
    user_id: &str,
    max_per_user: u64,
) -> Result<(), PipelineStateError> {
    let count = store.count_active_for_user(user_id).await?;
    if count >= max_per_user {
        return Err(PipelineStateError::Store(format!(
            "user {user_id} has reached the per-user pipeline cap"
        )));
    }
    Ok(())
}

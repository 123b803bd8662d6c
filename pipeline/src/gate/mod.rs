//! Gate Coordinator: blocks a gate-bearing stage on a user response and
//! matches the eventual `/api/pipeline/respond` POST back to it.
//!
//! `wait_for_user` sets the pending gate on [`PipelineState`] and persists it
//! through the shared store *before* parking on a per-session wake channel,
//! so a reader of the durable record (`/api/pipeline/respond`'s validation,
//! session restore on SSE reconnect) sees the true pending gate for the
//! whole time the stage is parked, not only after it resolves. `respond`
//! validates the gate name and session freshness before waking it. A
//! response that arrives before anyone is waiting is buffered by gate name
//! so it isn't lost to a race.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::pipeline_state::{PipelineState, PipelineStateError, PipelineStateStore};

/// Window after which a session with no activity is considered stale: a
/// gate response is refused rather than applied to a run nobody is
/// watching anymore.
pub const STALE_THRESHOLD_MILLIS: u64 = 15 * 60 * 1000;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GateError {
    #[error("no pipeline session: {0}")]
    NotFound(String),
    #[error("gate name mismatch: expected {expected}, got {got}")]
    NameMismatch { expected: String, got: String },
    #[error("pipeline is stale")]
    Stale,
    #[error("pipeline state error: {0}")]
    State(#[from] PipelineStateError),
}

/// Outcome of posting a gate response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespondOutcome {
    /// A waiter was parked and has been woken immediately.
    Woken,
    /// Nobody was waiting yet; the response was buffered by gate name.
    Buffered,
}

struct Waiter {
    gate: String,
    wake: oneshot::Sender<serde_json::Value>,
}

/// Coordinates gate waits and responses across sessions. One instance is
/// shared by the whole server.
pub struct GateCoordinator {
    waiters: Mutex<HashMap<String, Waiter>>,
    buffered: Mutex<HashMap<(String, String), serde_json::Value>>,
    store: Arc<dyn PipelineStateStore>,
}

impl GateCoordinator {
    pub fn new(store: Arc<dyn PipelineStateStore>) -> Self {
        Self {
            waiters: Mutex::new(HashMap::new()),
            buffered: Mutex::new(HashMap::new()),
            store,
        }
    }

    /// Called by the Pipeline Coordinator when a gate-bearing stage needs a
    /// user response. Checks for an already-buffered response first (a
    /// reconnecting client that answered before the coordinator parked);
    /// otherwise persists the pending gate and parks until [`Self::respond`]
    /// wakes it.
    pub async fn wait_for_user(
        &self,
        session_id: &str,
        gate: &str,
        data: serde_json::Value,
        state: &mut PipelineState,
    ) -> serde_json::Value {
        if let Some(buffered) = self
            .buffered
            .lock()
            .unwrap()
            .remove(&(session_id.to_string(), gate.to_string()))
        {
            return buffered;
        }

        state.set_pending_gate(gate, data);
        if let Err(err) = self.store.save(state).await {
            tracing::error!(session_id, gate, error = %err, "failed to persist pending gate");
        }

        let (tx, rx) = oneshot::channel();
        self.waiters.lock().unwrap().insert(
            session_id.to_string(),
            Waiter {
                gate: gate.to_string(),
                wake: tx,
            },
        );

        rx.await.unwrap_or(serde_json::Value::Null)
    }

    /// Handles an `/api/pipeline/respond` POST: validates the session isn't
    /// stale and that `gate` matches what's pending, then wakes the waiter
    /// (or buffers the response if nobody is parked yet).
    pub fn respond(
        &self,
        session_id: &str,
        gate: &str,
        response: serde_json::Value,
        state: &PipelineState,
        now_millis: u64,
    ) -> Result<RespondOutcome, GateError> {
        if state.is_stale(now_millis, STALE_THRESHOLD_MILLIS) {
            return Err(GateError::Stale);
        }

        if let Some(pending) = &state.pending_gate {
            if pending.name != gate {
                return Err(GateError::NameMismatch {
                    expected: pending.name.clone(),
                    got: gate.to_string(),
                });
            }
        }

        let mut waiters = self.waiters.lock().unwrap();
        if let Some(waiter) = waiters.remove(session_id) {
            if waiter.gate != gate {
                waiters.insert(session_id.to_string(), waiter);
                return Err(GateError::NameMismatch {
                    expected: gate.to_string(),
                    got: gate.to_string(),
                });
            }
            let _ = waiter.wake.send(response);
            return Ok(RespondOutcome::Woken);
        }

        self.buffered
            .lock()
            .unwrap()
            .insert((session_id.to_string(), gate.to_string()), response);
        Ok(RespondOutcome::Buffered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline_state::InMemoryPipelineStateStore;

    fn coordinator() -> GateCoordinator {
        GateCoordinator::new(Arc::new(InMemoryPipelineStateStore::new()))
    }

    #[tokio::test]
    async fn respond_wakes_a_waiting_gate() {
        let coordinator = coordinator();
        let mut state = PipelineState::new("s1", "u1");

        let wait = coordinator.wait_for_user("s1", "positioning", serde_json::json!({}), &mut state);
        tokio::pin!(wait);

        tokio::task::yield_now().await;
        let state_snapshot = PipelineState::new("s1", "u1");
        let outcome = coordinator
            .respond("s1", "positioning", serde_json::json!({"ok": true}), &state_snapshot, 0)
            .unwrap();
        assert_eq!(outcome, RespondOutcome::Woken);

        let response = wait.await;
        assert_eq!(response["ok"], true);
    }

    #[tokio::test]
    async fn wait_for_user_persists_the_pending_gate_before_parking() {
        let store = Arc::new(InMemoryPipelineStateStore::new());
        let coordinator = GateCoordinator::new(store.clone());
        let mut state = PipelineState::new("s1", "u1");
        store.save(&state).await.unwrap();

        let wait = coordinator.wait_for_user(
            "s1",
            "positioning",
            serde_json::json!({"content": "draft"}),
            &mut state,
        );
        tokio::pin!(wait);
        tokio::task::yield_now().await;

        let persisted = store.load("s1").await.unwrap().unwrap();
        assert_eq!(persisted.pending_gate.as_ref().map(|g| g.name.as_str()), Some("positioning"));

        coordinator
            .respond("s1", "positioning", serde_json::json!({"ok": true}), &persisted, 0)
            .unwrap();
        wait.await;
    }

    #[test]
    fn respond_with_wrong_gate_name_is_rejected() {
        let coordinator = coordinator();
        let mut state = PipelineState::new("s1", "u1");
        state.set_pending_gate("positioning", serde_json::json!({}));

        let err = coordinator
            .respond("s1", "quality_review", serde_json::json!({}), &state, 0)
            .unwrap_err();
        assert!(matches!(err, GateError::NameMismatch { .. }));
    }

    #[test]
    fn respond_against_stale_session_is_rejected() {
        let coordinator = coordinator();
        let mut state = PipelineState::new("s1", "u1");
        state.set_pending_gate("positioning", serde_json::json!({}));

        let now = state.updated_at_millis + STALE_THRESHOLD_MILLIS + 1_000;
        let err = coordinator
            .respond("s1", "positioning", serde_json::json!({}), &state, now)
            .unwrap_err();
        assert!(matches!(err, GateError::Stale));
    }

    #[test]
    fn response_before_anyone_is_waiting_is_buffered() {
        let coordinator = coordinator();
        let state = PipelineState::new("s1", "u1");
        let outcome = coordinator
            .respond("s1", "positioning", serde_json::json!({"ok": true}), &state, 0)
            .unwrap();
        assert_eq!(outcome, RespondOutcome::Buffered);
    }

    #[tokio::test]
    async fn buffered_response_is_delivered_to_a_later_wait() {
        let coordinator = coordinator();
        let state = PipelineState::new("s1", "u1");
        coordinator
            .respond("s1", "positioning", serde_json::json!({"ok": true}), &state, 0)
            .unwrap();

        let mut state2 = PipelineState::new("s1", "u1");
        let response = coordinator
            .wait_for_user("s1", "positioning", serde_json::json!({}), &mut state2)
            .await;
        assert_eq!(response["ok"], true);
    }
}

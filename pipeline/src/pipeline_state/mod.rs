//! Pipeline State: the durable record of one authoring run.
//!
//! Holds everything the Pipeline Coordinator, Gate Coordinator, and Revision
//! Controller read and mutate between rounds: current stage, per-section
//! approval and revision bookkeeping, the token ledger, and any pending gate
//! waiting on a user response. Persisted through [`PipelineStateStore`] so a
//! process restart or SSE reconnect can resume a run in place.

mod sqlite_store;

pub use sqlite_store::SqlitePipelineStateStore;

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::LlmUsage;
use crate::stage::Stage;

/// Maximum number of revision rounds a single section may go through before
/// the Revision Controller starts dropping further requests for it.
pub const REVISION_CAP: u32 = 3;

/// Status of a pipeline run, orthogonal to which stage it is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Running,
    WaitingOnUser,
    Error,
    Complete,
}

/// The three durable phases of a replan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplanPhase {
    Requested,
    InProgress,
    Completed,
}

/// A gate blocking a run on a user response, with the payload shown to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingGate {
    pub name: String,
    pub data: serde_json::Value,
}

/// The client-facing right-panel snapshot: type tag plus payload, used to
/// redraw the workspace view on `session_restore` and to enrich the session
/// list (e.g. `company_name`/`job_title`) without replaying the whole event
/// log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelSnapshot {
    pub panel_type: String,
    pub data: serde_json::Value,
}

/// The durable state of one authoring run.
///
/// Invariants (see module docs): `stage` only advances forward or rewinds to
/// `gap_analysis` via replan; `revision_counts` entries only increase;
/// `approved_sections` only grows within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub session_id: String,
    pub user_id: String,
    pub stage: Stage,
    pub status: PipelineStatus,
    pub approved_sections: HashSet<String>,
    pub revision_counts: HashMap<String, u32>,
    pub usage: LlmUsage,
    pub scratchpads: HashMap<String, String>,
    pub pending_gate: Option<PendingGate>,
    pub replan_phase: Option<ReplanPhase>,
    pub last_panel: Option<PanelSnapshot>,
    pub updated_at_millis: u64,
    pub error: Option<String>,
}

impl PipelineState {
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            stage: Stage::Intake,
            status: PipelineStatus::Running,
            approved_sections: HashSet::new(),
            revision_counts: HashMap::new(),
            usage: LlmUsage::default(),
            scratchpads: HashMap::new(),
            pending_gate: None,
            replan_phase: None,
            last_panel: None,
            updated_at_millis: now_millis(),
            error: None,
        }
    }

    /// Advances to `stage`, rejecting any move that is neither forward
    /// progression nor the sanctioned replan rewind to `gap_analysis`.
    pub fn advance_to(&mut self, stage: Stage) -> Result<(), PipelineStateError> {
        if !stage.is_forward_or_replan_from(self.stage) {
            return Err(PipelineStateError::InvalidTransition {
                from: self.stage,
                to: stage,
            });
        }
        self.stage = stage;
        self.touch();
        Ok(())
    }

    /// Revision count for `section`, lazily defaulting to 0 for sessions that
    /// predate the field or have never revised this section.
    pub fn revision_count(&self, section: &str) -> u32 {
        self.revision_counts.get(section).copied().unwrap_or(0)
    }

    /// Whether `section` has reached the revision cap and should no longer
    /// accept further revision requests.
    pub fn revision_cap_reached(&self, section: &str) -> bool {
        self.revision_count(section) >= REVISION_CAP
    }

    /// Increments the revision counter for `section`. Counters live here
    /// (not on the controller) so they survive process restarts, and only
    /// ever increase.
    pub fn increment_revision(&mut self, section: &str) -> u32 {
        let counter = self.revision_counts.entry(section.to_string()).or_insert(0);
        *counter += 1;
        self.touch();
        *counter
    }

    pub fn is_approved(&self, section: &str) -> bool {
        self.approved_sections.contains(section)
    }

    pub fn approve_section(&mut self, section: impl Into<String>) {
        self.approved_sections.insert(section.into());
        self.touch();
    }

    pub fn add_usage(&mut self, usage: &LlmUsage) {
        self.usage.prompt_tokens += usage.prompt_tokens;
        self.usage.completion_tokens += usage.completion_tokens;
        self.usage.total_tokens += usage.total_tokens;
        self.touch();
    }

    /// Persists a gate wait: the coordinator blocks until a matching
    /// `/api/pipeline/respond` arrives.
    pub fn set_pending_gate(&mut self, name: impl Into<String>, data: serde_json::Value) {
        self.pending_gate = Some(PendingGate {
            name: name.into(),
            data,
        });
        self.status = PipelineStatus::WaitingOnUser;
        self.touch();
    }

    pub fn clear_pending_gate(&mut self) {
        self.pending_gate = None;
        self.status = PipelineStatus::Running;
        self.touch();
    }

    /// Advances the durable replan phase. The Coordinator is the only writer;
    /// `None` means no replan is in flight.
    pub fn set_replan_phase(&mut self, phase: ReplanPhase) {
        self.replan_phase = Some(phase);
        self.touch();
    }

    pub fn clear_replan_phase(&mut self) {
        self.replan_phase = None;
        self.touch();
    }

    /// Records the latest right-panel snapshot for client resume. Every
    /// stage transition and gate open overwrites this; only the most recent
    /// snapshot is kept, matching the spec's "last panel" (not a history).
    pub fn set_last_panel(&mut self, panel_type: impl Into<String>, data: serde_json::Value) {
        self.last_panel = Some(PanelSnapshot {
            panel_type: panel_type.into(),
            data,
        });
        self.touch();
    }

    /// Best-effort `(company_name, job_title)` extraction from the last
    /// panel's payload, for the `/api/sessions` list enrichment. Returns
    /// `None` for either field the panel data doesn't carry — the panel's
    /// exact shape is produced by out-of-scope prompt content, so this never
    /// assumes a fixed schema beyond "top-level string fields if present".
    pub fn company_and_job_title(&self) -> (Option<String>, Option<String>) {
        let Some(panel) = &self.last_panel else {
            return (None, None);
        };
        let company = panel
            .data
            .get("company_name")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let job_title = panel
            .data
            .get("job_title")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        (company, job_title)
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.status = PipelineStatus::Error;
        self.touch();
    }

    /// Whether this state is too old to accept a gate response: the 15
    /// minute staleness window from SPEC_FULL.md's Gate Coordinator.
    pub fn is_stale(&self, now_millis: u64, threshold_millis: u64) -> bool {
        now_millis.saturating_sub(self.updated_at_millis) > threshold_millis
    }

    fn touch(&mut self) {
        self.updated_at_millis = now_millis();
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Errors from mutating or loading [`PipelineState`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PipelineStateError {
    #[error("invalid stage transition from {from} to {to}")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("pipeline state not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(String),
}

/// Durable storage for [`PipelineState`], keyed by session id.
///
/// Implementations use upsert + a monotonic `updated_at` watermark so
/// concurrent writers cannot regress a session's state out from under a
/// slower caller.
#[async_trait]
pub trait PipelineStateStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<PipelineState>, PipelineStateError>;
    async fn save(&self, state: &PipelineState) -> Result<(), PipelineStateError>;
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<PipelineState>, PipelineStateError>;
    /// Count of sessions currently in a non-terminal status, for the global
    /// admission cap. Implementations should fail open (return `Ok(0)`) is
    /// never correct here; callers decide fail-open behavior on `Err`.
    async fn count_active(&self) -> Result<u64, PipelineStateError>;
    async fn count_active_for_user(&self, user_id: &str) -> Result<u64, PipelineStateError>;
}

/// In-memory [`PipelineStateStore`] for tests and single-process dev runs.
#[derive(Default)]
pub struct InMemoryPipelineStateStore {
    sessions: std::sync::Mutex<HashMap<String, PipelineState>>,
}

impl InMemoryPipelineStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PipelineStateStore for InMemoryPipelineStateStore {
    async fn load(&self, session_id: &str) -> Result<Option<PipelineState>, PipelineStateError> {
        Ok(self.sessions.lock().unwrap().get(session_id).cloned())
    }

    async fn save(&self, state: &PipelineState) -> Result<(), PipelineStateError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(state.session_id.clone(), state.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<PipelineState>, PipelineStateError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_active(&self) -> Result<u64, PipelineStateError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| !matches!(s.status, PipelineStatus::Complete | PipelineStatus::Error))
            .count() as u64)
    }

    async fn count_active_for_user(&self, user_id: &str) -> Result<u64, PipelineStateError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                s.user_id == user_id
                    && !matches!(s.status, PipelineStatus::Complete | PipelineStatus::Error)
            })
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_advance_succeeds() {
        let mut state = PipelineState::new("s1", "u1");
        state.advance_to(Stage::Positioning).unwrap();
        assert_eq!(state.stage, Stage::Positioning);
    }

    #[test]
    fn backward_advance_rejected() {
        let mut state = PipelineState::new("s1", "u1");
        state.advance_to(Stage::SectionWriting).unwrap();
        let err = state.advance_to(Stage::Research).unwrap_err();
        assert!(matches!(err, PipelineStateError::InvalidTransition { .. }));
    }

    #[test]
    fn replan_rewind_to_gap_analysis_succeeds() {
        let mut state = PipelineState::new("s1", "u1");
        state.advance_to(Stage::QualityReview).unwrap();
        state.advance_to(Stage::GapAnalysis).unwrap();
        assert_eq!(state.stage, Stage::GapAnalysis);
    }

    #[test]
    fn revision_counter_only_increases_and_caps() {
        let mut state = PipelineState::new("s1", "u1");
        assert_eq!(state.revision_count("intro"), 0);
        assert!(!state.revision_cap_reached("intro"));
        for _ in 0..REVISION_CAP {
            state.increment_revision("intro");
        }
        assert!(state.revision_cap_reached("intro"));
        assert_eq!(state.revision_count("intro"), REVISION_CAP);
    }

    #[test]
    fn approved_sections_only_grow() {
        let mut state = PipelineState::new("s1", "u1");
        assert!(!state.is_approved("intro"));
        state.approve_section("intro");
        assert!(state.is_approved("intro"));
        state.approve_section("intro");
        assert_eq!(state.approved_sections.len(), 1);
    }

    #[test]
    fn replan_phase_can_be_set_and_cleared() {
        let mut state = PipelineState::new("s1", "u1");
        assert!(state.replan_phase.is_none());
        state.set_replan_phase(ReplanPhase::Requested);
        assert_eq!(state.replan_phase, Some(ReplanPhase::Requested));
        state.clear_replan_phase();
        assert!(state.replan_phase.is_none());
    }

    #[test]
    fn staleness_uses_threshold() {
        let state = PipelineState::new("s1", "u1");
        assert!(!state.is_stale(state.updated_at_millis + 1_000, 15 * 60 * 1000));
        assert!(state.is_stale(state.updated_at_millis + 20 * 60 * 1000, 15 * 60 * 1000));
    }

    #[test]
    fn last_panel_starts_empty_and_overwrites_on_each_set() {
        let mut state = PipelineState::new("s1", "u1");
        assert!(state.last_panel.is_none());
        state.set_last_panel("intake", serde_json::json!({"company_name": "Acme"}));
        state.set_last_panel("positioning", serde_json::json!({"job_title": "Engineer"}));
        let panel = state.last_panel.as_ref().unwrap();
        assert_eq!(panel.panel_type, "positioning");
        assert_eq!(panel.data["job_title"], "Engineer");
    }

    #[test]
    fn company_and_job_title_extracted_from_last_panel() {
        let mut state = PipelineState::new("s1", "u1");
        assert_eq!(state.company_and_job_title(), (None, None));
        state.set_last_panel(
            "intake",
            serde_json::json!({"company_name": "Acme", "job_title": "Engineer"}),
        );
        assert_eq!(
            state.company_and_job_title(),
            (Some("Acme".to_string()), Some("Engineer".to_string()))
        );
    }

    #[tokio::test]
    async fn in_memory_store_round_trips_and_counts_active() {
        let store = InMemoryPipelineStateStore::new();
        let mut state = PipelineState::new("s1", "u1");
        store.save(&state).await.unwrap();
        assert_eq!(store.count_active().await.unwrap(), 1);

        state.status = PipelineStatus::Complete;
        store.save(&state).await.unwrap();
        assert_eq!(store.count_active().await.unwrap(), 0);

        let loaded = store.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.status, PipelineStatus::Complete);
    }
}

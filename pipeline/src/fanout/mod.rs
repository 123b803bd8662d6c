//! Stream Fan-out: per-session SSE event bus.
//!
//! One [`SessionBus`] per running pipeline session multiplexes everything
//! the Pipeline Coordinator, Gate Coordinator, and Revision Controller emit
//! into the closed [`PipelineEvent`] catalogue, and replays a bounded
//! backlog to a client that reconnects within the grace period. This sits
//! on top of the generic [`crate::stream::StreamWriter`] plumbing: stages
//! still emit token-level chunks through a `StreamWriter`, and the
//! coordinator translates those (plus its own lifecycle events) into
//! `PipelineEvent`s here.

mod registry;

pub use registry::{FanoutError, FanoutRegistry};

use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

/// Default number of recent events buffered per session for reconnect replay.
pub const DEFAULT_REPLAY_BUFFER: usize = 256;

/// Default heartbeat interval for idle SSE connections.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Default window after a disconnect during which a reconnect still gets
/// buffered events instead of starting from an empty stream.
pub const DEFAULT_RECONNECT_GRACE: Duration = Duration::from_secs(30);

/// The closed set of SSE event types a pipeline session may emit.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Connected { session_id: String },
    SessionRestore { events: Vec<serde_json::Value> },
    Transparency { message: String },
    TextDelta { stage: String, content: String },
    TextComplete { stage: String, seq: u64 },
    ToolStart { name: String, call_id: String },
    ToolComplete { name: String, call_id: String, is_error: bool },
    StageStart { stage: String },
    StageComplete { stage: String },
    AskUser { prompt: String },
    PhaseGate { gate: String, data: serde_json::Value },
    Questionnaire { questions: Vec<serde_json::Value> },
    PositioningQuestion { question: String },
    PositioningProfileFound { profile: serde_json::Value },
    BlueprintReady { blueprint: serde_json::Value },
    SectionDraft { section: String, content: String },
    SectionRevised { section: String, round: u32 },
    SectionApproved { section: String },
    QualityScores { scores: serde_json::Value },
    DraftReadinessUpdate { ready: bool, missing: Vec<String> },
    WorkflowReplanRequested,
    WorkflowReplanStarted,
    WorkflowReplanCompleted,
    RightPanelUpdate { payload: serde_json::Value },
    ResumeUpdate { payload: serde_json::Value },
    RevisionStart { section: String, round: u32 },
    PipelineComplete { session_id: String },
    PipelineError { message: String },
    Error { message: String, code: Option<String> },
    Heartbeat,
    Complete,
}

impl PipelineEvent {
    /// Whether this event ends the stream: no further events should be sent
    /// or replayed after it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::Complete)
    }
}

/// Per-session SSE fan-out: one broadcast ring buffer plus a replay log of
/// the last [`DEFAULT_REPLAY_BUFFER`] events for `session_restore`.
pub struct SessionBus {
    session_id: String,
    sender: broadcast::Sender<PipelineEvent>,
    replay: std::sync::Mutex<std::collections::VecDeque<PipelineEvent>>,
    replay_capacity: usize,
    text_complete_seq: std::sync::atomic::AtomicU64,
}

impl SessionBus {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self::with_capacity(session_id, DEFAULT_REPLAY_BUFFER)
    }

    pub fn with_capacity(session_id: impl Into<String>, replay_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(replay_capacity.max(32));
        Self {
            session_id: session_id.into(),
            sender,
            replay: std::sync::Mutex::new(std::collections::VecDeque::with_capacity(replay_capacity)),
            replay_capacity,
            text_complete_seq: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Publishes `event`, recording it in the replay log (bounded to
    /// `replay_capacity`, oldest dropped first).
    pub fn publish(&self, event: PipelineEvent) {
        {
            let mut replay = self.replay.lock().unwrap();
            if replay.len() == self.replay_capacity {
                replay.pop_front();
            }
            replay.push_back(event.clone());
        }
        let _ = self.sender.send(event);
    }

    /// Convenience for `TextComplete`: assigns the next dedup sequence number.
    pub fn publish_text_complete(&self, stage: impl Into<String>) {
        let seq = self
            .text_complete_seq
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.publish(PipelineEvent::TextComplete {
            stage: stage.into(),
            seq,
        });
    }

    /// New subscriber for live events from this point forward.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// The replay buffer as JSON values, oldest first, for `session_restore`.
    pub fn replay_snapshot(&self) -> Vec<serde_json::Value> {
        self.replay
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| serde_json::to_value(e).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_buffer_is_bounded() {
        let bus = SessionBus::with_capacity("s1", 3);
        for i in 0..5 {
            bus.publish(PipelineEvent::Transparency {
                message: format!("msg {i}"),
            });
        }
        assert_eq!(bus.replay_snapshot().len(), 3);
    }

    #[tokio::test]
    async fn subscriber_receives_live_events_in_order() {
        let bus = SessionBus::new("s1");
        let mut rx = bus.subscribe();
        bus.publish(PipelineEvent::StageStart { stage: "intake".into() });
        bus.publish(PipelineEvent::StageComplete { stage: "intake".into() });
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, PipelineEvent::StageStart { .. }));
        assert!(matches!(second, PipelineEvent::StageComplete { .. }));
    }

    #[test]
    fn text_complete_seq_increases_monotonically() {
        let bus = SessionBus::new("s1");
        bus.publish_text_complete("intake");
        bus.publish_text_complete("intake");
        let snapshot = bus.replay_snapshot();
        let seqs: Vec<u64> = snapshot
            .iter()
            .filter_map(|v| v.get("seq").and_then(|s| s.as_u64()))
            .collect();
        assert_eq!(seqs, vec![0, 1]);
    }

    #[test]
    fn complete_is_the_only_terminal_event() {
        assert!(PipelineEvent::Complete.is_terminal());
        assert!(!PipelineEvent::Heartbeat.is_terminal());
        assert!(!PipelineEvent::PipelineComplete { session_id: "s1".into() }.is_terminal());
    }
}

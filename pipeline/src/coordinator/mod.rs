//! Pipeline Coordinator: the durable state machine that drives one
//! authoring run through the stage graph, picks a model profile per stage,
//! handles gate waits, dispatches revision sub-loops, and handles mid-run
//! replanning.
//!
//! This stitches together every other module in the crate: [`crate::stage`]
//! for the graph, [`crate::pipeline_state`] for the durable record,
//! [`crate::agent_loop`] to run each stage's agent, [`crate::fanout`] to
//! publish progress, [`crate::gate`] to block gate-bearing stages, and
//! [`crate::revision`]/[`crate::agent_bus`] for the rework cycle.

mod router;

pub use router::{ModelRouter, ProfileModelRouter, SingleModelRouter};

use std::sync::Arc;

use crate::agent_bus::{AgentBus, BusMessage};
use crate::agent_loop::{self, AgentLoopConfig, NoopHooks};
use crate::error::AgentError;
use crate::fanout::{PipelineEvent, SessionBus};
use crate::gate::GateCoordinator;
use crate::message::Message;
use crate::pipeline_state::{PipelineState, PipelineStateError, ReplanPhase};
use crate::revision::{RevisionController, RevisionDecision};
use crate::stage::Stage;
use crate::tools::StageToolkits;

/// Result of running one stage forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The run moved to the named stage; more work remains.
    Advanced { stage: Stage },
    /// The run reached `complete` and the stream has been closed.
    Complete,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoordinatorError {
    #[error("benchmark change arrived after section writing started; resubmit with confirm_rebuild=true")]
    BenchmarkRebuildConfirmRequired,
    #[error("pipeline state error: {0}")]
    State(#[from] PipelineStateError),
    #[error("agent loop error: {0}")]
    Agent(#[from] AgentError),
}

/// Drives the stage graph for one session. Stateless itself: every method
/// takes the session's [`PipelineState`] and [`SessionBus`] explicitly so one
/// coordinator instance serves every concurrent run.
pub struct PipelineCoordinator {
    bus: Arc<AgentBus>,
    gates: Arc<GateCoordinator>,
    toolkits: Arc<StageToolkits>,
    router: Arc<dyn ModelRouter>,
    agent_config: AgentLoopConfig,
}

impl PipelineCoordinator {
    pub fn new(
        bus: Arc<AgentBus>,
        gates: Arc<GateCoordinator>,
        toolkits: Arc<StageToolkits>,
        router: Arc<dyn ModelRouter>,
        agent_config: AgentLoopConfig,
    ) -> Self {
        Self {
            bus,
            gates,
            toolkits,
            router,
            agent_config,
        }
    }

    /// Runs `state`'s current stage to completion: builds the stage
    /// instruction, runs its agent loop, waits on a gate if the stage is
    /// gate-bearing, then advances to the next stage (or `complete`).
    ///
    /// On agent failure, sets `status = error` and leaves every prior
    /// artifact untouched so a restart can resume from saved inputs; the
    /// Coordinator never silently re-runs a stage.
    pub async fn advance_stage(
        &self,
        state: &mut PipelineState,
        events: &SessionBus,
    ) -> Result<AdvanceOutcome, CoordinatorError> {
        if state.stage == Stage::Complete {
            return Ok(AdvanceOutcome::Complete);
        }

        let stage = state.stage;
        events.publish(PipelineEvent::StageStart {
            stage: stage.as_str().to_string(),
        });

        // Subscribed before the stage's agent runs so a revision request
        // emitted mid-round is never missed; drained after the stage (and
        // its gate, if any) below.
        let craftsman_rx = (stage == Stage::QualityReview)
            .then(|| self.bus.subscribe(crate::revision::CHANNEL));

        let started_at = std::time::Instant::now();
        let instruction = build_stage_instruction(stage, state);
        let toolkit = self.toolkits.for_stage(stage);
        let llm = self.router.llm_for(stage.model_profile());

        let outcome = agent_loop::run(
            &self.agent_config,
            llm,
            toolkit.as_ref(),
            Message::user(instruction),
            vec![],
            &NoopHooks,
        )
        .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                state.set_error(user_safe_message(&err));
                events.publish(PipelineEvent::PipelineError {
                    message: user_safe_message(&err),
                });
                return Err(CoordinatorError::Agent(err));
            }
        };

        state.add_usage(&outcome.usage);

        let content = if stage == Stage::SectionWriting {
            let sanitized = crate::authoring::sanitize_delimiters(&outcome.scratchpad);
            for finding in crate::authoring::audit_draft(&sanitized, &[]) {
                events.publish(PipelineEvent::Transparency {
                    message: format!("{}: {}", finding.check, finding.message),
                });
            }
            sanitized
        } else {
            outcome.scratchpad.clone()
        };
        state.scratchpads.insert(stage.as_str().to_string(), content.clone());
        state.set_last_panel(
            stage.as_str(),
            serde_json::json!({"stage": stage.as_str(), "content": content}),
        );

        tracing::info!(
            stage = stage.as_str(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "stage complete"
        );
        events.publish(PipelineEvent::StageComplete {
            stage: stage.as_str().to_string(),
        });

        if let Some(gate) = stage.gate_name() {
            let payload = serde_json::json!({
                "stage": stage.as_str(),
                "content": outcome.scratchpad,
            });
            events.publish(PipelineEvent::PhaseGate {
                gate: gate.to_string(),
                data: payload.clone(),
            });
            state.set_last_panel(format!("{gate}_gate"), payload.clone());
            let session_id = state.session_id.clone();
            let response = self
                .gates
                .wait_for_user(&session_id, gate, payload, state)
                .await;
            state.clear_pending_gate();
            state
                .scratchpads
                .insert(format!("{}_gate_response", stage.as_str()), response.to_string());
        }

        // quality_review → (revision ↻ section_writing)*: drain any revision
        // requests the reviewing agent published on the craftsman channel
        // and, if at least one was actually dispatched, stay at
        // quality_review for another pass instead of advancing.
        let mut revised_any = false;
        if let Some(mut rx) = craftsman_rx {
            loop {
                match rx.try_recv() {
                    Ok(message) => {
                        let decisions = self.handle_revision_request(&message, state, events).await;
                        if decisions
                            .iter()
                            .any(|d| matches!(d, RevisionDecision::Dispatch { .. }))
                        {
                            revised_any = true;
                        }
                    }
                    Err(tokio::sync::broadcast::error::TryRecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
        }

        let next = if revised_any {
            Stage::QualityReview
        } else {
            stage.next().unwrap_or(Stage::Complete)
        };
        state.advance_to(next)?;

        if next == Stage::Complete {
            events.publish(PipelineEvent::PipelineComplete {
                session_id: state.session_id.clone(),
            });
            events.publish(PipelineEvent::Complete);
            Ok(AdvanceOutcome::Complete)
        } else {
            Ok(AdvanceOutcome::Advanced { stage: next })
        }
    }

    /// Runs `advance_stage` until the pipeline reaches `complete`. Stops
    /// early (without erroring further) if a stage fails — the caller sees
    /// the underlying [`CoordinatorError`] and `state.status` is `error`.
    pub async fn run_to_completion(
        &self,
        state: &mut PipelineState,
        events: &SessionBus,
    ) -> Result<(), CoordinatorError> {
        loop {
            match self.advance_stage(state, events).await? {
                AdvanceOutcome::Complete => return Ok(()),
                AdvanceOutcome::Advanced { .. } => continue,
            }
        }
    }

    /// Requests a mid-run replan. Refuses in place once section writing has
    /// started, unless `confirm_rebuild` is set — matching the coordinator's
    /// rule that a downstream rebuild after drafting requires an explicit ack.
    pub fn request_replan(
        &self,
        state: &mut PipelineState,
        confirm_rebuild: bool,
    ) -> Result<(), CoordinatorError> {
        let started_writing = state.stage.index() >= Stage::SectionWriting.index();
        if started_writing && !confirm_rebuild {
            return Err(CoordinatorError::BenchmarkRebuildConfirmRequired);
        }
        state.set_replan_phase(ReplanPhase::Requested);
        Ok(())
    }

    /// At the next safe checkpoint, rewinds `state` to `gap_analysis` and
    /// marks the replan in progress.
    pub fn begin_replan_rewind(&self, state: &mut PipelineState) -> Result<(), CoordinatorError> {
        state.set_replan_phase(ReplanPhase::InProgress);
        state.advance_to(Stage::GapAnalysis)?;
        Ok(())
    }

    /// Marks a replan's rewound path as having caught back up to where the
    /// original run was suspended.
    pub fn complete_replan(&self, state: &mut PipelineState) {
        state.set_replan_phase(ReplanPhase::Completed);
    }

    /// Applies one Agent Bus revision request: filters it through the
    /// Revision Controller and, if it survives, runs a section-writer
    /// sub-loop for the affected section. Sub-loop failures are logged, not
    /// propagated, so a flaky revision never takes down the quality reviewer.
    pub async fn handle_revision_request(
        &self,
        message: &BusMessage,
        state: &mut PipelineState,
        events: &SessionBus,
    ) -> Vec<RevisionDecision> {
        let controller = RevisionController::new(&self.bus);
        let decisions = controller.handle(message, state);

        for decision in &decisions {
            match decision {
                RevisionDecision::Dispatch { section, round } => {
                    events.publish(PipelineEvent::RevisionStart {
                        section: section.clone(),
                        round: *round,
                    });

                    let instruction = build_revision_instruction(section, message, state);
                    let toolkit = self.toolkits.for_stage(Stage::SectionWriting);
                    let llm = self.router.llm_for(Stage::SectionWriting.model_profile());

                    match agent_loop::run(
                        &self.agent_config,
                        llm,
                        toolkit.as_ref(),
                        Message::user(instruction),
                        vec![],
                        &NoopHooks,
                    )
                    .await
                    {
                        Ok(outcome) => {
                            state.add_usage(&outcome.usage);
                            state.scratchpads.insert(section.clone(), outcome.scratchpad);
                            events.publish(PipelineEvent::SectionRevised {
                                section: section.clone(),
                                round: *round,
                            });
                        }
                        Err(err) => {
                            tracing::warn!(section = %section, error = %err, "revision sub-loop failed");
                        }
                    }
                }
                RevisionDecision::DroppedCapReached { section } => {
                    events.publish(PipelineEvent::Transparency {
                        message: format!(
                            "revision cap reached for section \"{section}\"; no further rework will be dispatched"
                        ),
                    });
                }
                RevisionDecision::Ignored { reason } => {
                    tracing::debug!(reason = %reason, "ignored non-revision-request bus message");
                }
                RevisionDecision::DroppedLowPriority { .. }
                | RevisionDecision::DroppedAlreadyApproved { .. } => {}
            }
        }

        decisions
    }
}

fn build_stage_instruction(stage: Stage, state: &PipelineState) -> String {
    let prior = state
        .scratchpads
        .get(previous_stage_key(stage))
        .map(String::as_str)
        .unwrap_or("");
    format!(
        "Stage: {stage}\nSession: {session}\nPrior stage output:\n{prior}",
        stage = stage.as_str(),
        session = state.session_id,
    )
}

fn previous_stage_key(stage: Stage) -> &'static str {
    Stage::ORDER
        .iter()
        .position(|s| *s == stage)
        .and_then(|idx| idx.checked_sub(1))
        .map(|idx| Stage::ORDER[idx].as_str())
        .unwrap_or("")
}

fn build_revision_instruction(section: &str, message: &BusMessage, state: &PipelineState) -> String {
    let current = state.scratchpads.get(section).map(String::as_str).unwrap_or("");
    let blueprint = state
        .scratchpads
        .get(Stage::Architect.as_str())
        .map(String::as_str)
        .unwrap_or("");
    format!(
        "Revise section \"{section}\".\nInstructions:\n{instructions}\nCurrent content:\n{current}\nBlueprint:\n{blueprint}",
        instructions = message.payload,
    )
}

/// Strips internal detail from an error before it reaches the stream or API
/// response; the raw Debug form is logged separately via `tracing`.
fn user_safe_message(err: &AgentError) -> String {
    tracing::error!(error = %err, "stage failed");
    match err {
        AgentError::Timeout(_) => "the pipeline timed out; try again".to_string(),
        _ => "the pipeline hit an unexpected error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_bus::Priority;
    use crate::llm::MockLlm;
    use crate::pipeline_state::InMemoryPipelineStateStore;

    fn coordinator_with_toolkits() -> (PipelineCoordinator, Arc<AgentBus>, Arc<GateCoordinator>) {
        let bus = Arc::new(AgentBus::new());
        let gates = Arc::new(GateCoordinator::new(Arc::new(InMemoryPipelineStateStore::new())));
        let toolkits = Arc::new(StageToolkits::new());
        let router: Arc<dyn ModelRouter> =
            Arc::new(SingleModelRouter::new(Arc::new(MockLlm::with_text("ok"))));
        let coordinator = PipelineCoordinator::new(
            bus.clone(),
            gates.clone(),
            toolkits,
            router,
            AgentLoopConfig::default(),
        );
        (coordinator, bus, gates)
    }

    #[tokio::test]
    async fn advance_stage_moves_through_non_gate_stage() {
        let (coordinator, _bus, _gates) = coordinator_with_toolkits();
        let mut state = PipelineState::new("s1", "u1");
        let events = SessionBus::new("s1");

        let outcome = coordinator.advance_stage(&mut state, &events).await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::Advanced { stage: Stage::Positioning });
        assert!(state.scratchpads.contains_key("intake"));
    }

    #[tokio::test]
    async fn advance_stage_through_gate_blocks_until_responded() {
        let (coordinator, _bus, gates) = coordinator_with_toolkits();
        let mut state = PipelineState::new("s1", "u1");
        state.advance_to(Stage::Positioning).unwrap();
        let events = SessionBus::new("s1");

        let advance = coordinator.advance_stage(&mut state, &events);
        tokio::pin!(advance);

        // Nobody has responded yet; poll once to let it park on the gate,
        // then answer it from another "request" and ensure it completes.
        tokio::select! {
            _ = &mut advance => panic!("should not complete before gate response"),
            _ = tokio::time::sleep(std::time::Duration::from_millis(20)) => {}
        }

        let snapshot = PipelineState::new("s1", "u1");
        gates
            .respond("s1", "positioning", serde_json::json!({"ok": true}), &snapshot, 0)
            .unwrap();

        let outcome = advance.await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::Advanced { stage: Stage::Research });
    }

    #[tokio::test]
    async fn replan_refused_after_section_writing_without_confirmation() {
        let (coordinator, _bus, _gates) = coordinator_with_toolkits();
        let mut state = PipelineState::new("s1", "u1");
        state.advance_to(Stage::SectionWriting).unwrap();

        let err = coordinator.request_replan(&mut state, false).unwrap_err();
        assert!(matches!(err, CoordinatorError::BenchmarkRebuildConfirmRequired));
    }

    #[tokio::test]
    async fn replan_allowed_after_section_writing_with_confirmation() {
        let (coordinator, _bus, _gates) = coordinator_with_toolkits();
        let mut state = PipelineState::new("s1", "u1");
        state.advance_to(Stage::SectionWriting).unwrap();

        coordinator.request_replan(&mut state, true).unwrap();
        assert_eq!(state.replan_phase, Some(ReplanPhase::Requested));

        coordinator.begin_replan_rewind(&mut state).unwrap();
        assert_eq!(state.stage, Stage::GapAnalysis);
        assert_eq!(state.replan_phase, Some(ReplanPhase::InProgress));

        coordinator.complete_replan(&mut state);
        assert_eq!(state.replan_phase, Some(ReplanPhase::Completed));
    }

    #[tokio::test]
    async fn revision_request_dispatches_sub_loop_and_updates_section() {
        let (coordinator, _bus, _gates) = coordinator_with_toolkits();
        let mut state = PipelineState::new("s1", "u1");
        let events = SessionBus::new("s1");

        let message = BusMessage {
            channel: "craftsman".into(),
            from: "producer".into(),
            kind: "request".into(),
            session_id: "s1".into(),
            priority: Priority::High,
            payload: serde_json::json!({"section": "intro"}),
        };

        let decisions = coordinator
            .handle_revision_request(&message, &mut state, &events)
            .await;
        assert_eq!(decisions, vec![RevisionDecision::Dispatch { section: "intro".into(), round: 1 }]);
        assert_eq!(state.scratchpads.get("intro").map(String::as_str), Some("ok"));
    }

    #[tokio::test]
    async fn quality_review_stays_put_while_a_revision_request_is_pending() {
        let (coordinator, bus, gates) = coordinator_with_toolkits();
        let mut state = PipelineState::new("s1", "u1");
        state.advance_to(Stage::QualityReview).unwrap();
        let events = SessionBus::new("s1");

        bus.publish(BusMessage {
            channel: crate::revision::CHANNEL.to_string(),
            from: crate::revision::PRODUCER.to_string(),
            kind: "request".into(),
            session_id: "s1".into(),
            priority: Priority::High,
            payload: serde_json::json!({"section": "intro"}),
        });

        let advance = coordinator.advance_stage(&mut state, &events);
        tokio::pin!(advance);
        tokio::select! {
            _ = &mut advance => panic!("should not complete before gate response"),
            _ = tokio::time::sleep(std::time::Duration::from_millis(20)) => {}
        }

        let snapshot = PipelineState::new("s1", "u1");
        gates
            .respond("s1", "quality_review", serde_json::json!({"ok": true}), &snapshot, 0)
            .unwrap();

        let outcome = advance.await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::Advanced { stage: Stage::QualityReview });
        assert_eq!(state.revision_count("intro"), 1);
        assert_eq!(state.scratchpads.get("intro").map(String::as_str), Some("ok"));
    }

    #[tokio::test]
    async fn quality_review_advances_when_no_revision_request_arrives() {
        let (coordinator, _bus, gates) = coordinator_with_toolkits();
        let mut state = PipelineState::new("s1", "u1");
        state.advance_to(Stage::QualityReview).unwrap();
        let events = SessionBus::new("s1");

        let advance = coordinator.advance_stage(&mut state, &events);
        tokio::pin!(advance);
        tokio::select! {
            _ = &mut advance => panic!("should not complete before gate response"),
            _ = tokio::time::sleep(std::time::Duration::from_millis(20)) => {}
        }

        let snapshot = PipelineState::new("s1", "u1");
        gates
            .respond("s1", "quality_review", serde_json::json!({"ok": true}), &snapshot, 0)
            .unwrap();

        let outcome = advance.await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::Complete);
    }

    #[tokio::test]
    async fn stage_failure_sets_error_status_and_preserves_prior_artifacts() {
        let bus = Arc::new(AgentBus::new());
        let gates = Arc::new(GateCoordinator::new(Arc::new(InMemoryPipelineStateStore::new())));
        let toolkits = Arc::new(StageToolkits::new());
        let failing_llm = Arc::new(MockLlm::with_error("boom"));
        let router: Arc<dyn ModelRouter> = Arc::new(SingleModelRouter::new(failing_llm));
        let coordinator = PipelineCoordinator::new(
            bus,
            gates,
            toolkits,
            router,
            AgentLoopConfig::default(),
        );

        let mut state = PipelineState::new("s1", "u1");
        state.scratchpads.insert("intake".into(), "earlier output".into());
        let events = SessionBus::new("s1");

        let err = coordinator.advance_stage(&mut state, &events).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Agent(_)));
        assert_eq!(state.status, crate::pipeline_state::PipelineStatus::Error);
        assert_eq!(state.scratchpads.get("intake").map(String::as_str), Some("earlier output"));
    }
}

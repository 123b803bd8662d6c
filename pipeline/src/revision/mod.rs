//! Revision Controller: turns `craftsman` channel requests from a reviewing
//! stage into bounded rework cycles back to `section_writing`.
//!
//! Only `request` messages from the `producer` agent are honoured; anything
//! else is ignored outright. A request's payload is normalised to a list of
//! per-section instructions before filtering: either a `revision_instructions`
//! array of `{target_section, issue, instruction, priority}`, or a flat
//! `{section, issue, instruction}` treated as one high-priority instruction.
//!
//! Filtering happens in a fixed order before an instruction is ever
//! dispatched: drop anything below `High` priority, drop instructions for
//! sections already approved, then drop instructions for sections that have
//! hit the revision cap (emitting a `transparency` notice instead of silently
//! discarding). The revision counter lives on [`PipelineState`], not here,
//! and is incremented *before* dispatch so a crash mid-revision can't
//! under-count it.

use crate::agent_bus::{AgentBus, BusMessage, Priority};
use crate::pipeline_state::PipelineState;

/// Outcome of filtering one instruction extracted from an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionDecision {
    /// Dispatch a revision round for this section; counter already incremented.
    Dispatch { section: String, round: u32 },
    /// Dropped: priority too low to act on.
    DroppedLowPriority { section: String },
    /// Dropped: section is already approved, nothing left to revise.
    DroppedAlreadyApproved { section: String },
    /// Dropped: section has hit [`crate::pipeline_state::REVISION_CAP`].
    DroppedCapReached { section: String },
    /// The message didn't match the `request`-from-`producer` contract, or
    /// its payload carried no recognisable instruction; nothing was parsed.
    Ignored { reason: String },
}

/// One section-targeted instruction after normalising either accepted
/// payload shape.
struct Instruction {
    section: String,
    priority: Priority,
}

/// Subscribes to the bus's `"craftsman"` channel on behalf of `producer` and
/// decides what to do with each incoming request against `state`.
pub struct RevisionController<'a> {
    bus: &'a AgentBus,
}

pub const CHANNEL: &str = "craftsman";
pub const PRODUCER: &str = "producer";

impl<'a> RevisionController<'a> {
    pub fn new(bus: &'a AgentBus) -> Self {
        Self { bus }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<BusMessage> {
        self.bus.subscribe(CHANNEL)
    }

    /// Applies the sender/kind guard, normalises the payload into one or
    /// more instructions, then runs each through the filtering rules against
    /// `state`, mutating its revision counters for every dispatched one.
    pub fn handle(&self, message: &BusMessage, state: &mut PipelineState) -> Vec<RevisionDecision> {
        if message.kind != "request" || message.from != PRODUCER {
            return vec![RevisionDecision::Ignored {
                reason: format!(
                    "expected a \"request\" message from \"{PRODUCER}\", got kind={:?} from={:?}",
                    message.kind, message.from
                ),
            }];
        }

        let instructions = parse_instructions(&message.payload);
        if instructions.is_empty() {
            return vec![RevisionDecision::Ignored {
                reason: "payload had neither revision_instructions nor a section".to_string(),
            }];
        }

        instructions
            .into_iter()
            .map(|instruction| self.apply(instruction, state))
            .collect()
    }

    fn apply(&self, instruction: Instruction, state: &mut PipelineState) -> RevisionDecision {
        let Instruction { section, priority } = instruction;

        if priority < Priority::High {
            return RevisionDecision::DroppedLowPriority { section };
        }
        if state.is_approved(&section) {
            return RevisionDecision::DroppedAlreadyApproved { section };
        }
        if state.revision_cap_reached(&section) {
            return RevisionDecision::DroppedCapReached { section };
        }

        let round = state.increment_revision(&section);
        RevisionDecision::Dispatch { section, round }
    }
}

/// Normalises a `craftsman` request payload into the list of instructions it
/// describes. The array form carries an explicit priority per instruction
/// (missing or unrecognised values default to `Medium`, which is filtered out
/// downstream rather than silently treated as urgent); the flat form has no
/// priority field and is always high priority.
fn parse_instructions(payload: &serde_json::Value) -> Vec<Instruction> {
    if let Some(entries) = payload.get("revision_instructions").and_then(|v| v.as_array()) {
        return entries
            .iter()
            .filter_map(|entry| {
                let section = entry.get("target_section")?.as_str()?.to_string();
                let priority = entry
                    .get("priority")
                    .and_then(|v| serde_json::from_value::<Priority>(v.clone()).ok())
                    .unwrap_or(Priority::Medium);
                Some(Instruction { section, priority })
            })
            .collect();
    }

    if let Some(section) = payload.get("section").and_then(|v| v.as_str()) {
        return vec![Instruction {
            section: section.to_string(),
            priority: Priority::High,
        }];
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(section: &str, priority: Priority) -> BusMessage {
        BusMessage {
            channel: CHANNEL.to_string(),
            from: PRODUCER.to_string(),
            kind: "request".to_string(),
            session_id: "s1".to_string(),
            priority,
            payload: serde_json::json!({"section": section}),
        }
    }

    fn array_request(instructions: Vec<(&str, &str)>) -> BusMessage {
        let entries: Vec<_> = instructions
            .into_iter()
            .map(|(section, priority)| {
                serde_json::json!({
                    "target_section": section,
                    "issue": "needs more detail",
                    "instruction": "expand with concrete numbers",
                    "priority": priority,
                })
            })
            .collect();
        BusMessage {
            channel: CHANNEL.to_string(),
            from: PRODUCER.to_string(),
            kind: "request".to_string(),
            session_id: "s1".to_string(),
            priority: Priority::High,
            payload: serde_json::json!({"revision_instructions": entries}),
        }
    }

    #[test]
    fn low_priority_flat_request_is_dropped() {
        // The flat form is always normalised to high priority regardless of
        // the envelope's own priority field, so use the array form to
        // exercise a genuinely low-priority instruction.
        let bus = AgentBus::new();
        let controller = RevisionController::new(&bus);
        let mut state = PipelineState::new("s1", "u1");
        let message = array_request(vec![("intro", "low")]);
        let decisions = controller.handle(&message, &mut state);
        assert_eq!(
            decisions,
            vec![RevisionDecision::DroppedLowPriority { section: "intro".into() }]
        );
        assert_eq!(state.revision_count("intro"), 0);
    }

    #[test]
    fn flat_request_is_normalised_to_high_priority() {
        let bus = AgentBus::new();
        let controller = RevisionController::new(&bus);
        let mut state = PipelineState::new("s1", "u1");
        let decision = controller.handle(&request("intro", Priority::Low), &mut state);
        assert_eq!(
            decision,
            vec![RevisionDecision::Dispatch { section: "intro".into(), round: 1 }]
        );
    }

    #[test]
    fn approved_section_request_is_dropped() {
        let bus = AgentBus::new();
        let controller = RevisionController::new(&bus);
        let mut state = PipelineState::new("s1", "u1");
        state.approve_section("intro");
        let decision = controller.handle(&request("intro", Priority::High), &mut state);
        assert_eq!(
            decision,
            vec![RevisionDecision::DroppedAlreadyApproved { section: "intro".into() }]
        );
    }

    #[test]
    fn request_dispatches_and_increments_counter_before_returning() {
        let bus = AgentBus::new();
        let controller = RevisionController::new(&bus);
        let mut state = PipelineState::new("s1", "u1");
        let decision = controller.handle(&request("intro", Priority::High), &mut state);
        assert_eq!(decision, vec![RevisionDecision::Dispatch { section: "intro".into(), round: 1 }]);
        assert_eq!(state.revision_count("intro"), 1);
    }

    #[test]
    fn cap_reached_drops_further_requests() {
        let bus = AgentBus::new();
        let controller = RevisionController::new(&bus);
        let mut state = PipelineState::new("s1", "u1");
        for _ in 0..crate::pipeline_state::REVISION_CAP {
            controller.handle(&request("intro", Priority::High), &mut state);
        }
        let decision = controller.handle(&request("intro", Priority::High), &mut state);
        assert_eq!(decision, vec![RevisionDecision::DroppedCapReached { section: "intro".into() }]);
    }

    #[test]
    fn array_request_dispatches_each_surviving_instruction() {
        let bus = AgentBus::new();
        let controller = RevisionController::new(&bus);
        let mut state = PipelineState::new("s1", "u1");
        let message = array_request(vec![("intro", "high"), ("summary", "high")]);
        let decisions = controller.handle(&message, &mut state);
        assert_eq!(
            decisions,
            vec![
                RevisionDecision::Dispatch { section: "intro".into(), round: 1 },
                RevisionDecision::Dispatch { section: "summary".into(), round: 1 },
            ]
        );
    }

    #[test]
    fn non_request_message_is_ignored() {
        let bus = AgentBus::new();
        let controller = RevisionController::new(&bus);
        let mut state = PipelineState::new("s1", "u1");
        let mut message = request("intro", Priority::High);
        message.kind = "notify".to_string();
        let decisions = controller.handle(&message, &mut state);
        assert!(matches!(decisions.as_slice(), [RevisionDecision::Ignored { .. }]));
        assert_eq!(state.revision_count("intro"), 0);
    }

    #[test]
    fn message_not_from_producer_is_ignored() {
        let bus = AgentBus::new();
        let controller = RevisionController::new(&bus);
        let mut state = PipelineState::new("s1", "u1");
        let mut message = request("intro", Priority::High);
        message.from = "quality_reviewer".to_string();
        let decisions = controller.handle(&message, &mut state);
        assert!(matches!(decisions.as_slice(), [RevisionDecision::Ignored { .. }]));
    }

    #[tokio::test]
    async fn subscribe_receives_published_requests() {
        let bus = AgentBus::new();
        let controller = RevisionController::new(&bus);
        let mut rx = controller.subscribe();
        bus.publish(request("intro", Priority::High));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.from, PRODUCER);
    }
}

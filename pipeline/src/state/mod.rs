//! Per-round state for the agent loop: conversation history plus the current
//! round's tool calls and their results.
//!
//! ```rust
//! use pipeline::{AgentLoopState, Message};
//!
//! let mut state = AgentLoopState::default();
//! state.messages.push(Message::system("You are a helpful assistant."));
//! state.messages.push(Message::user("What is 2+2?"));
//! ```

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// One tool invocation requested by the LLM in its last reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// The result of executing one [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

/// Conversation state threaded through one agent loop run: full message
/// history plus the tool calls and results accumulated in the current round.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentLoopState {
    pub messages: Vec<Message>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
}

impl AgentLoopState {
    /// The most recent assistant message, if any (the loop's final reply).
    pub fn last_assistant_reply(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m {
            Message::Assistant(c) => Some(c.as_str()),
            _ => None,
        })
    }

    /// Clears the current round's tool calls and results; keeps message history.
    pub fn start_new_round(&mut self) {
        self.tool_calls.clear();
        self.tool_results.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_assistant_reply_skips_user_messages() {
        let mut state = AgentLoopState::default();
        state.messages.push(Message::user("hi"));
        state.messages.push(Message::assistant("hello"));
        state.messages.push(Message::user("thanks"));
        assert_eq!(state.last_assistant_reply(), Some("hello"));
    }

    #[test]
    fn start_new_round_keeps_messages_but_clears_round_state() {
        let mut state = AgentLoopState::default();
        state.messages.push(Message::user("hi"));
        state.tool_calls.push(ToolCall {
            id: "1".into(),
            name: "search".into(),
            arguments: serde_json::json!({}),
        });
        state.tool_results.push(ToolResult::ok("1", "done"));
        state.start_new_round();
        assert_eq!(state.messages.len(), 1);
        assert!(state.tool_calls.is_empty());
        assert!(state.tool_results.is_empty());
    }
}

//! Conversation message: the unit the agent loop reads and writes.

use serde::{Deserialize, Serialize};

/// One turn in a conversation: system instruction, user input, or assistant reply.
///
/// Tool calls and their results are tracked separately on the agent loop state
/// (see [`crate::state::ToolCall`] / [`crate::state::ToolResult`]) and folded back
/// into a `Message::Assistant`/`Message::User` pair once a round completes, so the
/// history the LLM sees stays a plain system/user/assistant transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "content", rename_all = "snake_case")]
pub enum Message {
    System(String),
    User(String),
    Assistant(String),
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System(content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User(content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant(content.into())
    }

    /// Text content regardless of role.
    pub fn content(&self) -> &str {
        match self {
            Message::System(c) | Message::User(c) | Message::Assistant(c) => c,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Message::System(_) => "system",
            Message::User(_) => "user",
            Message::Assistant(_) => "assistant",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_expected_role() {
        assert_eq!(Message::system("s").role(), "system");
        assert_eq!(Message::user("u").role(), "user");
        assert_eq!(Message::assistant("a").role(), "assistant");
    }

    #[test]
    fn content_unwraps_regardless_of_role() {
        assert_eq!(Message::user("hi").content(), "hi");
        assert_eq!(Message::assistant("there").content(), "there");
    }
}

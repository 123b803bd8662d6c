//! `get_recent_messages`: exposes the current step's conversation as a tool.

use async_trait::async_trait;
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};

use super::r#trait::Tool;

/// Tool name for the get_recent_messages operation.
pub const TOOL_GET_RECENT_MESSAGES: &str = "get_recent_messages";

/// Tool that returns the current step's `recent_messages` from [`ToolCallContext`].
///
/// Reads only from the context injected via `ToolSource::set_call_context`;
/// holds no state of its own.
#[derive(Debug, Default)]
pub struct GetRecentMessagesTool;

impl GetRecentMessagesTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for GetRecentMessagesTool {
    fn name(&self) -> &str {
        TOOL_GET_RECENT_MESSAGES
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_GET_RECENT_MESSAGES.to_string(),
            description: Some(
                "Get the most recent messages in the current conversation. Call when you \
                 need to re-read earlier context before acting."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": { "type": "integer", "description": "Max messages to return (optional)" }
                }
            }),
            parallel_safe: true,
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let limit = args
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize);

        let messages = match ctx {
            Some(c) => c.recent_messages.clone(),
            None => Vec::new(),
        };

        let tail: Vec<_> = match limit {
            Some(n) if n < messages.len() => messages[messages.len() - n..].to_vec(),
            _ => messages,
        };

        let payload: Vec<serde_json::Value> = tail
            .iter()
            .map(|m| json!({"role": m.role(), "content": m.content()}))
            .collect();

        Ok(ToolCallContent {
            text: serde_json::to_string(&payload)
                .map_err(|e| ToolSourceError::InvalidInput(e.to_string()))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[tokio::test]
    async fn returns_empty_when_no_context() {
        let tool = GetRecentMessagesTool::new();
        let result = tool.call(json!({}), None).await.unwrap();
        assert_eq!(result.text, "[]");
    }

    #[tokio::test]
    async fn returns_messages_from_context() {
        let tool = GetRecentMessagesTool::new();
        let ctx = ToolCallContext::new(vec![Message::user("hi"), Message::assistant("hello")]);
        let result = tool.call(json!({}), Some(&ctx)).await.unwrap();
        assert!(result.text.contains("hello"));
    }

    #[tokio::test]
    async fn respects_limit() {
        let tool = GetRecentMessagesTool::new();
        let ctx = ToolCallContext::new(vec![
            Message::user("one"),
            Message::user("two"),
            Message::user("three"),
        ]);
        let result = tool.call(json!({"limit": 1}), Some(&ctx)).await.unwrap();
        assert!(result.text.contains("three"));
        assert!(!result.text.contains("one"));
    }
}

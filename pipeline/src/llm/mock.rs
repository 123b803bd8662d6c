//! Fixed-response `LlmClient` for tests and offline development.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::AgentError;
use crate::message::Message;
use crate::state::ToolCall;

use super::LlmResponse;

/// Returns a fixed sequence of responses, one per call; repeats the last
/// response once the sequence is exhausted.
pub struct MockLlm {
    responses: Mutex<Vec<LlmResponse>>,
    calls: Mutex<Vec<Vec<Message>>>,
    error: Option<String>,
}

impl MockLlm {
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
            error: None,
        }
    }

    /// An `LlmClient` that fails every `invoke` call with `AgentError::Llm(message)`.
    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            error: Some(message.into()),
        }
    }

    /// Convenience constructor: a single plain-text reply with no tool calls.
    pub fn with_text(content: impl Into<String>) -> Self {
        Self::new(vec![LlmResponse {
            content: content.into(),
            tool_calls: vec![],
            usage: None,
        }])
    }

    /// Convenience constructor: a single reply requesting the given tool calls.
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::new(vec![LlmResponse {
            content: content.into(),
            tool_calls,
            usage: None,
        }])
    }

    /// Messages passed to each `invoke` call, in order.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl super::LlmClient for MockLlm {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, AgentError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if let Some(message) = &self.error {
            return Err(AgentError::Llm(message.clone()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            let next = responses.remove(0);
            Ok(next)
        } else if let Some(last) = responses.first() {
            Ok(LlmResponse {
                content: last.content.clone(),
                tool_calls: last.tool_calls.clone(),
                usage: last.usage.clone(),
            })
        } else {
            Ok(LlmResponse {
                content: String::new(),
                tool_calls: vec![],
                usage: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::LlmClient;
    use super::*;

    #[tokio::test]
    async fn mock_llm_returns_fixed_response() {
        let llm = MockLlm::with_text("hello");
        let resp = llm.invoke(&[Message::user("hi")]).await.unwrap();
        assert_eq!(resp.content, "hello");
        assert!(resp.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn mock_llm_with_error_always_fails() {
        let llm = MockLlm::with_error("rate limited");
        let err = llm.invoke(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(msg) if msg == "rate limited"));
    }

    #[tokio::test]
    async fn mock_llm_records_calls() {
        let llm = MockLlm::with_text("hello");
        llm.invoke(&[Message::user("hi")]).await.unwrap();
        llm.invoke(&[Message::user("again")]).await.unwrap();
        assert_eq!(llm.calls().len(), 2);
    }
}

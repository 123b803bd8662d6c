//! `LlmClient` implementation backed by the OpenAI chat completions API.

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::error::AgentError;
use crate::message::Message;

use super::{LlmResponse, LlmUsage};

/// Chat completion client for a single OpenAI-compatible model.
///
/// Tool calling is not wired up here: the agent loop drives tool dispatch
/// itself from `LlmResponse::tool_calls`, which this client currently always
/// returns empty (plain chat completion, no `tools` parameter).
pub struct ChatOpenAI {
    client: Client<OpenAIConfig>,
    model: String,
}

impl ChatOpenAI {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
        }
    }

    pub fn with_api_base(model: impl Into<String>, api_base: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_base(api_base);
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }

    fn to_request_message(
        message: &Message,
    ) -> Result<ChatCompletionRequestMessage, AgentError> {
        let built = match message {
            Message::System(content) => ChatCompletionRequestSystemMessageArgs::default()
                .content(content.as_str())
                .build()
                .map(ChatCompletionRequestMessage::System),
            Message::User(content) => ChatCompletionRequestUserMessageArgs::default()
                .content(content.as_str())
                .build()
                .map(ChatCompletionRequestMessage::User),
            Message::Assistant(content) => ChatCompletionRequestAssistantMessageArgs::default()
                .content(content.as_str())
                .build()
                .map(ChatCompletionRequestMessage::Assistant),
        };
        built.map_err(|e| AgentError::Llm(e.to_string()))
    }
}

#[async_trait]
impl super::LlmClient for ChatOpenAI {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, AgentError> {
        let request_messages = messages
            .iter()
            .map(Self::to_request_message)
            .collect::<Result<Vec<_>, _>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(request_messages)
            .build()
            .map_err(|e| AgentError::Llm(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AgentError::Llm(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Llm("no choices in chat completion response".into()))?;

        let usage = response.usage.map(|u| LlmUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: vec![],
            usage,
        })
    }
}

//! `web_fetcher`: fetch external content over HTTP for research-stage evidence gathering.

use async_trait::async_trait;
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};

use super::r#trait::Tool;

/// Tool name for the web_fetcher operation.
pub const TOOL_WEB_FETCHER: &str = "web_fetcher";

/// Maximum response body size read back into the tool result.
const MAX_BODY_BYTES: usize = 200_000;

/// Tool that fetches a URL via HTTP GET or POST and returns the response body as text.
///
/// Used by the research stage to pull supporting evidence from URLs supplied
/// during positioning/gap-analysis rounds.
pub struct WebFetcherTool {
    client: reqwest::Client,
}

impl Default for WebFetcherTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WebFetcherTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WebFetcherTool {
    fn name(&self) -> &str {
        TOOL_WEB_FETCHER
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_WEB_FETCHER.to_string(),
            description: Some(
                "Fetch a URL via HTTP GET (or POST with a body) and return the response text. \
                 Use to pull supporting evidence for a requirement or claim."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string" },
                    "method": { "type": "string", "enum": ["GET", "POST"] },
                    "body": { "type": "string", "description": "Request body for POST (optional)" }
                },
                "required": ["url"]
            }),
            parallel_safe: true,
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing \"url\"".to_string()))?;
        let method = args
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("GET")
            .to_uppercase();

        let request = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => {
                let body = args
                    .get("body")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                self.client.post(url).body(body)
            }
            other => {
                return Err(ToolSourceError::InvalidInput(format!(
                    "unsupported method: {other}"
                )))
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let truncated: String = text.chars().take(MAX_BODY_BYTES).collect();

        Ok(ToolCallContent {
            text: format!("status: {status}\n\n{truncated}"),
        })
    }
}

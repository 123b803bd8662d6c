use async_trait::async_trait;
use serde_json::json;

use crate::memory::{Namespace, Store};
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

/// Tool name for the recall operation.
pub const TOOL_RECALL: &str = "recall";

/// Tool for reading a value by key from long-term memory.
///
/// Wraps [`Store::get`] and exposes it as a tool for the LLM.
pub struct RecallTool {
    store: std::sync::Arc<dyn Store>,
    namespace: Namespace,
}

impl RecallTool {
    pub fn new(store: std::sync::Arc<dyn Store>, namespace: Namespace) -> Self {
        Self { store, namespace }
    }
}

fn map_store_error(e: crate::memory::StoreError) -> ToolSourceError {
    match e {
        crate::memory::StoreError::NotFound => {
            ToolSourceError::NotFound("key not found".to_string())
        }
        crate::memory::StoreError::Serialization(s) => ToolSourceError::InvalidInput(s),
        crate::memory::StoreError::Storage(s) => ToolSourceError::Transport(s),
        crate::memory::StoreError::EmbeddingError(s) => ToolSourceError::Transport(s),
    }
}

#[async_trait]
impl Tool for RecallTool {
    fn name(&self) -> &str {
        TOOL_RECALL
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_RECALL.to_string(),
            description: Some(
                "Read a previously remembered value by key from long-term memory. Returns \
                 null if the key was never stored."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string" }
                },
                "required": ["key"]
            }),
            parallel_safe: true,
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let key = args
            .get("key")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing \"key\"".to_string()))?;

        let value = self
            .store
            .get(&self.namespace, key)
            .await
            .map_err(map_store_error)?;

        Ok(ToolCallContent {
            text: serde_json::to_string(&value)
                .map_err(|e| ToolSourceError::InvalidInput(e.to_string()))?,
        })
    }
}

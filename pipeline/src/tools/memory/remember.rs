use async_trait::async_trait;
use serde_json::json;

use crate::memory::{Namespace, Store};
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

/// Tool name for the remember operation.
pub const TOOL_REMEMBER: &str = "remember";

/// Tool for writing a key-value pair to long-term memory.
///
/// Wraps [`Store::put`] and exposes it as a tool for the LLM.
///
/// # Examples
///
/// ```no_run
/// use pipeline::tools::{RememberTool, Tool};
/// use pipeline::memory::InMemoryStore;
/// use std::sync::Arc;
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() {
/// let store = Arc::new(InMemoryStore::new());
/// let namespace = vec!["user-123".to_string()];
/// let remember = RememberTool::new(store, namespace);
/// remember
///     .call(json!({"key": "coffee", "value": "likes coffee"}), None)
///     .await
///     .unwrap();
/// # }
/// ```
pub struct RememberTool {
    store: std::sync::Arc<dyn Store>,
    namespace: Namespace,
}

impl RememberTool {
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
impl Tool for RememberTool {
    fn name(&self) -> &str {
        TOOL_REMEMBER
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_REMEMBER.to_string(),
            description: Some(
                "Store a key-value pair in long-term memory. Call when you learn something \
                 worth recalling in a later session."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string" },
                    "value": { "type": "string" }
                },
                "required": ["key", "value"]
            }),
            parallel_safe: false,
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
        let value = args
            .get("value")
            .ok_or_else(|| ToolSourceError::InvalidInput("missing \"value\"".to_string()))?;

        self.store
            .put(&self.namespace, key, value)
            .await
            .map_err(map_store_error)?;

        Ok(ToolCallContent {
            text: format!("remembered \"{key}\""),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn remember_writes_to_store() {
        let store = Arc::new(InMemoryStore::new());
        let namespace = vec!["user-123".to_string()];
        let tool = RememberTool::new(store.clone(), namespace.clone());
        tool.call(json!({"key": "coffee", "value": "likes coffee"}), None)
            .await
            .unwrap();
        let value = store.get(&namespace, "coffee").await.unwrap();
        assert_eq!(value, Some(json!("likes coffee")));
    }

    #[tokio::test]
    async fn remember_rejects_missing_key() {
        let store = Arc::new(InMemoryStore::new());
        let tool = RememberTool::new(store, vec!["user-123".to_string()]);
        let err = tool.call(json!({"value": "x"}), None).await;
        assert!(matches!(err, Err(ToolSourceError::InvalidInput(_))));
    }
}

//! Aggregates a fixed set of [`Tool`] implementations behind one [`ToolSource`].

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSource, ToolSourceError, ToolSpec};

use super::r#trait::Tool;
use super::registry::ToolRegistry;

/// A [`ToolSource`] backed by an in-process [`ToolRegistry`].
///
/// Every concrete tool source in this crate (`WebToolsSource`,
/// `StoreToolSource`, `MemoryToolsSource`, `ShortTermMemoryToolSource`) builds
/// one of these, registers its tools into it, and delegates the `ToolSource`
/// trait to it.
#[derive(Clone)]
pub struct AggregateToolSource {
    registry: Arc<ToolRegistry>,
    context: Arc<RwLock<Option<ToolCallContext>>>,
}

impl Default for AggregateToolSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateToolSource {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(ToolRegistry::new()),
            context: Arc::new(RwLock::new(None)),
        }
    }

    /// Registers a tool. Async for symmetry with call sites that build up a
    /// source inside an `async fn`; registration itself never awaits.
    pub async fn register_async(&self, tool: Box<dyn Tool>) {
        self.registry.insert(tool);
    }

    /// Registers a tool from non-async code.
    pub fn register_sync(&self, tool: Box<dyn Tool>) {
        self.registry.insert(tool);
    }

    fn current_context(&self) -> Option<ToolCallContext> {
        self.context.read().ok().and_then(|g| g.clone())
    }
}

#[async_trait]
impl ToolSource for AggregateToolSource {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError> {
        Ok(self
            .registry
            .names()
            .into_iter()
            .filter_map(|name| self.registry.get_spec(&name))
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let ctx = self.current_context();
        self.registry.call(name, arguments, ctx.as_ref()).await
    }

    async fn call_tool_with_context(
        &self,
        name: &str,
        arguments: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        self.registry.call(name, arguments, ctx).await
    }

    fn set_call_context(&self, ctx: Option<ToolCallContext>) {
        if let Ok(mut g) = self.context.write() {
            *g = ctx;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "echo".to_string(),
                description: None,
                input_schema: serde_json::json!({"type": "object"}),
                parallel_safe: true,
            }
        }

        async fn call(
            &self,
            args: serde_json::Value,
            _ctx: Option<&ToolCallContext>,
        ) -> Result<ToolCallContent, ToolSourceError> {
            Ok(ToolCallContent {
                text: args.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn registers_and_lists_tools() {
        let source = AggregateToolSource::new();
        source.register_async(Box::new(EchoTool)).await;
        let tools = source.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");
    }

    #[tokio::test]
    async fn call_tool_dispatches_to_registered_tool() {
        let source = AggregateToolSource::new();
        source.register_sync(Box::new(EchoTool));
        let result = source
            .call_tool("echo", serde_json::json!({"x": 1}))
            .await
            .unwrap();
        assert!(result.text.contains("\"x\":1"));
    }

    #[tokio::test]
    async fn call_tool_errors_on_unknown_name() {
        let source = AggregateToolSource::new();
        let err = source.call_tool("missing", serde_json::json!({})).await;
        assert!(matches!(err, Err(ToolSourceError::NotFound(_))));
    }
}

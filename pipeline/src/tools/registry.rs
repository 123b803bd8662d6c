//! In-process registry of [`Tool`] implementations keyed by name.

use dashmap::DashMap;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};

use super::r#trait::Tool;

/// Thread-safe map of tool name to implementation.
///
/// Used by [`AggregateToolSource`](super::AggregateToolSource) to back its
/// `list_tools`/`call_tool` dispatch; not itself a `ToolSource`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|e| e.key().clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get_spec(&self, name: &str) -> Option<ToolSpec> {
        self.tools.get(name).map(|t| t.spec())
    }

    pub async fn call(
        &self,
        name: &str,
        arguments: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolSourceError::NotFound(name.to_string()))?;
        tool.call(arguments, ctx).await
    }
}

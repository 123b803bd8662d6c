//! Tool sources: anything that can list tool specs and execute tool calls.
//!
//! A [`ToolSource`] is the unit the agent loop dispatches tool calls against.
//! [`crate::tools::AggregateToolSource`] is the concrete implementation used
//! everywhere: it wraps a [`crate::tools::ToolRegistry`] of [`crate::tools::Tool`]
//! implementations and exposes them through this trait.

pub mod context;
mod memory_tools_source;
mod short_term_memory_tool_source;
mod store_tool_source;
mod web_tools_source;

pub use context::ToolCallContext;
pub use memory_tools_source::MemoryToolsSource;
pub use short_term_memory_tool_source::{ShortTermMemoryToolSource, TOOL_GET_RECENT_MESSAGES};
pub use store_tool_source::{
    StoreToolSource, TOOL_LIST_MEMORIES, TOOL_RECALL, TOOL_REMEMBER, TOOL_SEARCH_MEMORIES,
};
pub use web_tools_source::{WebToolsSource, TOOL_WEB_FETCHER};

use async_trait::async_trait;
use thiserror::Error;

/// A tool's name, description, and JSON schema for its arguments.
///
/// Mirrors the shape of an MCP `tools/list` entry so tool specs can be sent
/// to the LLM (or over MCP) without reshaping.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
    /// Whether the agent loop may dispatch this tool concurrently with other
    /// parallel-safe calls in the same round. Defaults to `false`: a tool
    /// must opt in to concurrent dispatch, not opt out of sequential.
    pub parallel_safe: bool,
}

/// The text result of one tool call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolCallContent {
    pub text: String,
}

/// Errors from listing or calling tools through a [`ToolSource`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ToolSourceError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("invalid tool input: {0}")]
    InvalidInput(String),

    #[error("tool transport error: {0}")]
    Transport(String),
}

/// Something that can list its tools and execute calls against them.
///
/// Implementations compose via [`crate::tools::AggregateToolSource`], which
/// multiple modules (memory, web, conversation) build on top of to expose a
/// fixed set of tools as one source.
#[async_trait]
pub trait ToolSource: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallContent, ToolSourceError>;

    /// Like `call_tool`, but passes per-step context (recent messages, stream
    /// writer, thread/user id) to tools that need it. Default implementation
    /// ignores the context and delegates to `call_tool`.
    async fn call_tool_with_context(
        &self,
        name: &str,
        arguments: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        self.call_tool(name, arguments).await
    }

    /// Stores per-step context for tools (e.g. `get_recent_messages`) to read
    /// during the next `call_tool_with_context`. Default implementation is a
    /// no-op for sources whose tools don't need it.
    fn set_call_context(&self, _ctx: Option<ToolCallContext>) {}
}

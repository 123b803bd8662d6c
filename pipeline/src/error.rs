//! Crate-wide error type for agent execution: LLM calls, tool dispatch, persistence.

use thiserror::Error;

/// Error from running an agent loop round: LLM invocation, tool dispatch, or state persistence.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AgentError {
    #[error("llm error: {0}")]
    Llm(String),

    #[error("tool error: {0}")]
    Tool(#[from] crate::tool_source::ToolSourceError),

    #[error("store error: {0}")]
    Store(#[from] crate::memory::StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Other(String),
}

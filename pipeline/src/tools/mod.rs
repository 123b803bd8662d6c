//! Concrete [`Tool`] implementations and the registry/aggregate plumbing that
//! exposes them through a [`crate::tool_source::ToolSource`].

mod aggregate_source;
mod batch;
mod conversation;
pub mod memory;
mod registry;
pub mod stage_binding;
#[allow(clippy::module_inception)]
mod r#trait;
mod web;

pub use aggregate_source::AggregateToolSource;
pub use batch::{BatchTool, TOOL_BATCH};
pub use conversation::{GetRecentMessagesTool, TOOL_GET_RECENT_MESSAGES};
pub use memory::{
    ListMemoriesTool, RecallTool, RememberTool, SearchMemoriesTool, TOOL_LIST_MEMORIES,
    TOOL_RECALL, TOOL_REMEMBER, TOOL_SEARCH_MEMORIES,
};
pub use r#trait::Tool;
pub use registry::ToolRegistry;
pub use stage_binding::StageToolkits;
pub use web::{WebFetcherTool, TOOL_WEB_FETCHER};

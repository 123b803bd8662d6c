//! # Pipeline
//!
//! The agent loop, tool plumbing, and supporting memory/LLM infrastructure that
//! drives a single document-authoring run from intake through a completed
//! deliverable.
//!
//! ## Design principles
//!
//! - **Single state type**: one [`AgentLoopState`] carries the conversation,
//!   pending tool calls, and tool results through a run; agents read and write it.
//! - **Bounded rounds**: each round is think → act → observe, with automatic
//!   [`compress::compact`]ion once the transcript grows past a token budget.
//! - **Pluggable LLM**: [`LlmClient`] trait with [`MockLlm`] for tests and an
//!   OpenAI-compatible [`ChatOpenAI`] for production.
//! - **Tool plumbing**: [`Tool`] implementations register into a [`ToolRegistry`]
//!   exposed to the loop through an [`AggregateToolSource`].
//!
//! ## Main modules
//!
//! - [`state`]: [`AgentLoopState`], [`ToolCall`], [`ToolResult`] — the loop's state type.
//! - [`message`]: [`Message`] (System / User / Assistant).
//! - [`error`]: [`AgentError`].
//! - [`llm`]: [`LlmClient`] trait, [`MockLlm`], [`ChatOpenAI`].
//! - [`compress`]: transcript compaction ([`compress::compact`], [`CompactionConfig`]).
//! - [`model_spec`]: per-model context/output limits and resolvers ([`ModelLimitResolver`],
//!   [`CompositeResolver`], [`ConfigOverride`], [`CachedResolver`]).
//! - [`tool_source`]: [`ToolSource`] trait, [`ToolSpec`], [`ToolCallContext`].
//! - [`tools`]: concrete [`Tool`] implementations, [`ToolRegistry`], [`AggregateToolSource`],
//!   [`tools::StageToolkits`] for per-stage tool binding.
//! - [`memory`]: cross-session [`Store`] (in-memory and SQLite backed).
//! - [`user_message`]: append-only record of raw user input ([`UserMessageStore`]).
//! - [`stream`]: [`StreamEvent`], [`StreamMode`], [`StreamWriter`] a tool can use to emit
//!   progress updates mid-call ([`tool_source::ToolCallContext::stream_writer`]); stage-level
//!   lifecycle events are published directly as [`fanout::PipelineEvent`]s, not bridged through this.
//! - [`config`]: config summaries for diagnostics ([`RunConfigSummary`], [`build_config_summary`]).
//! - [`cache`]: [`Cache`] trait, [`InMemoryCache`].
//! - [`stage`]: the fixed authoring [`stage::Stage`] graph and [`stage::ModelProfile`] tiers.
//! - [`pipeline_state`]: durable [`pipeline_state::PipelineState`] for one authoring run.
//! - [`agent_loop`]: [`agent_loop::run`], the bounded think/act/observe loop a stage's agent runs.
//! - [`agent_bus`]: in-process pub/sub ([`agent_bus::AgentBus`]) for inter-stage handoffs.
//! - [`revision`]: [`revision::RevisionController`], bounding rework cycles back to section writing.
//! - [`fanout`]: per-session SSE fan-out ([`fanout::SessionBus`], [`fanout::FanoutRegistry`]).
//! - [`gate`]: [`gate::GateCoordinator`], blocking a stage on a user response.
//! - [`capacity`]: admission checks ([`capacity::check_ownership`], [`capacity::claim_pipeline_slot`]).
//! - [`authoring`]: content post-processing invariants ([`authoring::audit_draft`]).
//! - [`usage`]: per-user LLM usage ledger ([`usage::UsageLedger`], watermark-based [`usage::UsageStore`]).
//!
//! Key types are re-exported at crate root: `use pipeline::{Message, AgentLoopState, LlmClient};`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use pipeline::{AgentLoopState, Message};
//!
//! let mut state = AgentLoopState::default();
//! state.messages.push(Message::user("hello, world!"));
//! assert_eq!(state.messages.len(), 1);
//! ```

pub mod agent_bus;
pub mod agent_loop;
pub mod authoring;
pub mod cache;
pub mod capacity;
pub mod compress;
pub mod coordinator;
pub mod config;
pub mod error;
pub mod fanout;
pub mod gate;
pub mod llm;
pub mod memory;
pub mod message;
pub mod model_spec;
pub mod pipeline_state;
pub mod revision;
pub mod stage;
pub mod state;
pub mod stream;
pub mod tool_source;
pub mod tools;
pub mod usage;
pub mod user_message;

pub use agent_bus::{AgentBus, BusMessage, Priority};
pub use agent_loop::{AgentLoopConfig, AgentLoopHooks, AgentLoopOutcome, NoopHooks};
pub use authoring::{audit_draft, AuthoringFinding};
pub use cache::{Cache, CacheError, InMemoryCache};
pub use capacity::{check_global_capacity, check_ownership, claim_pipeline_slot, AdmissionError};
pub use compress::{compact, CompactionConfig};
pub use coordinator::{
    AdvanceOutcome, CoordinatorError, ModelRouter, PipelineCoordinator, ProfileModelRouter,
    SingleModelRouter,
};
pub use fanout::{FanoutError, FanoutRegistry, PipelineEvent, SessionBus};
pub use gate::{GateCoordinator, GateError, RespondOutcome};
pub use config::{
    build_config_summary, ConfigSection, EmbeddingConfigSummary, LlmConfigSummary,
    MemoryConfigSummary, RunConfigSummary, RunConfigSummarySource, ToolConfigSummary,
};
pub use error::AgentError;
pub use llm::{ChatOpenAI, LlmClient, LlmResponse, LlmUsage, MockLlm, ToolChoiceMode};
pub use memory::{
    FilterOp, InMemoryStore, Item, ListNamespacesOptions, MatchCondition, Namespace,
    NamespaceMatchType, SearchItem, SearchOptions, SqliteStore, Store, StoreError, StoreOp,
    StoreOpResult, StoreSearchHit,
};
pub use message::Message;
pub use model_spec::{
    CachedResolver, CompositeResolver, ConfigOverride, LocalFileResolver, ModelLimitResolver,
    ModelSpec, ModelsDevResolver, ResolverRefresher,
};
pub use pipeline_state::{
    InMemoryPipelineStateStore, PanelSnapshot, PendingGate, PipelineState, PipelineStateError,
    PipelineStateStore, PipelineStatus, ReplanPhase, SqlitePipelineStateStore,
};
pub use revision::{RevisionController, RevisionDecision};
pub use stage::{ModelProfile, Stage};
pub use state::{AgentLoopState, ToolCall, ToolResult};
pub use stream::{
    CheckpointEvent, MessageChunk, StreamEvent, StreamMetadata, StreamMode, StreamWriter,
    ToolStreamWriter,
};
pub use tool_source::{
    MemoryToolsSource, ShortTermMemoryToolSource, StoreToolSource, ToolCallContent,
    ToolCallContext, ToolSource, ToolSourceError, ToolSpec, WebToolsSource,
    TOOL_GET_RECENT_MESSAGES, TOOL_LIST_MEMORIES, TOOL_RECALL, TOOL_REMEMBER,
    TOOL_SEARCH_MEMORIES, TOOL_WEB_FETCHER,
};
pub use tools::{
    AggregateToolSource, BatchTool, GetRecentMessagesTool, ListMemoriesTool, RecallTool,
    RememberTool, SearchMemoriesTool, StageToolkits, Tool, ToolRegistry, WebFetcherTool,
    TOOL_BATCH,
};
pub use usage::{
    InMemoryUsageStore, LlmUsageTotals, SqliteUsageStore, UsageError, UsageLedger, UsageStore,
    UserUsageRecord,
};
pub use user_message::{
    NoOpUserMessageStore, SqliteUserMessageStore, UserMessageStore, UserMessageStoreError,
};

/// When running `cargo test -p pipeline`, initializes tracing from `RUST_LOG` so that
/// unit tests in `src/**` can print logs with `--nocapture`.
#[cfg(test)]
mod test_logging {
    use ctor::ctor;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::Layer;

    #[ctor]
    fn init() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_filter(filter),
            )
            .try_init();
    }
}

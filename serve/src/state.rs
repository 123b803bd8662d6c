//! Shared application state: every long-lived collaborator the routes need,
//! built once at startup and cloned (cheaply, via `Arc`) into each handler.

use std::sync::Arc;

use config::PipelineConfig;
use pipeline::{
    AgentBus, FanoutRegistry, GateCoordinator, PipelineCoordinator, PipelineStateStore,
    ProfileModelRouter, StageToolkits, UsageStore,
};

use crate::metrics::Metrics;
use crate::rate_limit::RateLimiter;

/// Everything a route handler needs: the durable store, the coordinator and
/// its collaborators, the SSE registry, admission limits, and counters.
pub struct AppState {
    pub store: Arc<dyn PipelineStateStore>,
    pub usage_store: Arc<dyn UsageStore>,
    pub coordinator: Arc<PipelineCoordinator>,
    pub gates: Arc<GateCoordinator>,
    pub bus: Arc<AgentBus>,
    pub fanout: Arc<FanoutRegistry>,
    pub config: PipelineConfig,
    pub metrics: Arc<Metrics>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Wires up a coordinator with the given LLM router and an empty
    /// per-stage toolkit set, plus fresh in-process collaborators (bus,
    /// gates, fanout registry) sized from `config`.
    pub fn new(
        store: Arc<dyn PipelineStateStore>,
        usage_store: Arc<dyn UsageStore>,
        router: ProfileModelRouter,
        toolkits: StageToolkits,
        config: PipelineConfig,
    ) -> Self {
        let bus = Arc::new(AgentBus::new());
        let gates = Arc::new(GateCoordinator::new(store.clone()));
        let fanout = Arc::new(FanoutRegistry::new(
            config.max_global_sse_connections,
            config.max_sse_connections_per_user,
        ));
        let agent_config = pipeline::AgentLoopConfig {
            max_rounds: config.max_rounds,
            round_timeout: config.round_timeout,
            overall_timeout: config.overall_timeout,
            ..Default::default()
        };
        let coordinator = Arc::new(PipelineCoordinator::new(
            bus.clone(),
            gates.clone(),
            Arc::new(toolkits),
            Arc::new(router),
            agent_config,
        ));
        Self {
            store,
            usage_store,
            coordinator,
            gates,
            bus,
            fanout,
            config,
            metrics: Arc::new(Metrics::default()),
            rate_limiter: Arc::new(RateLimiter::new(30, 5)),
        }
    }
}

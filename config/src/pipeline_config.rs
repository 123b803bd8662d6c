//! Pipeline-specific knobs, loaded with the same env precedence as
//! [`crate::load_and_apply`]: process environment wins, falling back to
//! whatever `.env`/XDG values [`crate::load_and_apply`] already applied.
//!
//! Every field has a default matching the pipeline crate's own constants
//! (`AgentLoopConfig::default()`, `capacity::DEFAULT_MAX_GLOBAL_PIPELINES`,
//! `gate::STALE_THRESHOLD_MILLIS`, `fanout::DEFAULT_HEARTBEAT_INTERVAL`,
//! `fanout::DEFAULT_RECONNECT_GRACE`, `pipeline_state::REVISION_CAP`) so a
//! deployment that sets no env vars behaves exactly like the library
//! defaults used in tests.

use std::time::Duration;

/// Centralised pipeline configuration. No module outside this crate should
/// read `std::env` directly; callers build a `PipelineConfig` once at
/// startup and pass its fields to the coordinator, gate, capacity, and
/// fanout constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Wall-clock budget for one agent-loop round.
    pub round_timeout: Duration,
    /// Wall-clock budget for an entire stage's agent-loop run.
    pub overall_timeout: Duration,
    /// Hard cap on agent-loop rounds before a stage aborts.
    pub max_rounds: u32,
    /// Message-count threshold at which the agent loop compacts its transcript.
    pub compaction_threshold: usize,
    /// Maximum number of revision cycles a section may go through.
    pub revision_cap: u32,
    /// Maximum number of non-terminal pipelines across all users.
    pub max_global_pipelines: u64,
    /// Maximum number of non-terminal pipelines for a single user.
    pub max_pipelines_per_user: u64,
    /// Maximum number of concurrent SSE connections across all sessions.
    pub max_global_sse_connections: u32,
    /// Maximum number of concurrent SSE connections for a single user.
    pub max_sse_connections_per_user: u32,
    /// Interval between SSE heartbeat events on an idle connection.
    pub heartbeat_interval: Duration,
    /// Grace period a disconnected client has to reconnect and resume.
    pub reconnect_grace: Duration,
    /// Age past which a pipeline's pending gate is considered stale and its
    /// `respond` calls are refused.
    pub stale_pipeline_threshold: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            round_timeout: Duration::from_secs(120),
            overall_timeout: Duration::from_secs(600),
            max_rounds: 10,
            compaction_threshold: 30,
            revision_cap: 3,
            max_global_pipelines: 10,
            max_pipelines_per_user: 2,
            max_global_sse_connections: 500,
            max_sse_connections_per_user: 5,
            heartbeat_interval: Duration::from_secs(20),
            reconnect_grace: Duration::from_secs(30),
            stale_pipeline_threshold: Duration::from_secs(15 * 60),
        }
    }
}

impl PipelineConfig {
    /// Builds a [`PipelineConfig`] from the process environment, falling back
    /// to [`PipelineConfig::default`] for any variable that is unset or
    /// fails to parse. Call [`crate::load_and_apply`] first so `.env`/XDG
    /// values have already been applied to the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            round_timeout: env_secs("PIPELINE_ROUND_TIMEOUT_SECS", defaults.round_timeout),
            overall_timeout: env_secs("PIPELINE_OVERALL_TIMEOUT_SECS", defaults.overall_timeout),
            max_rounds: env_parsed("PIPELINE_MAX_ROUNDS", defaults.max_rounds),
            compaction_threshold: env_parsed(
                "PIPELINE_COMPACTION_THRESHOLD",
                defaults.compaction_threshold,
            ),
            revision_cap: env_parsed("PIPELINE_REVISION_CAP", defaults.revision_cap),
            max_global_pipelines: env_parsed(
                "PIPELINE_MAX_GLOBAL_PIPELINES",
                defaults.max_global_pipelines,
            ),
            max_pipelines_per_user: env_parsed(
                "PIPELINE_MAX_PIPELINES_PER_USER",
                defaults.max_pipelines_per_user,
            ),
            max_global_sse_connections: env_parsed(
                "PIPELINE_MAX_GLOBAL_SSE_CONNECTIONS",
                defaults.max_global_sse_connections,
            ),
            max_sse_connections_per_user: env_parsed(
                "PIPELINE_MAX_SSE_CONNECTIONS_PER_USER",
                defaults.max_sse_connections_per_user,
            ),
            heartbeat_interval: env_secs(
                "PIPELINE_HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval,
            ),
            reconnect_grace: env_secs("PIPELINE_RECONNECT_GRACE_SECS", defaults.reconnect_grace),
            stale_pipeline_threshold: env_secs(
                "PIPELINE_STALE_THRESHOLD_SECS",
                defaults.stale_pipeline_threshold,
            ),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    match std::env::var(key).ok().and_then(|v| v.parse::<u64>().ok()) {
        Some(secs) => Duration::from_secs(secs),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_all() {
        for key in [
            "PIPELINE_ROUND_TIMEOUT_SECS",
            "PIPELINE_OVERALL_TIMEOUT_SECS",
            "PIPELINE_MAX_ROUNDS",
            "PIPELINE_COMPACTION_THRESHOLD",
            "PIPELINE_REVISION_CAP",
            "PIPELINE_MAX_GLOBAL_PIPELINES",
            "PIPELINE_MAX_PIPELINES_PER_USER",
            "PIPELINE_MAX_GLOBAL_SSE_CONNECTIONS",
            "PIPELINE_MAX_SSE_CONNECTIONS_PER_USER",
            "PIPELINE_HEARTBEAT_INTERVAL_SECS",
            "PIPELINE_RECONNECT_GRACE_SECS",
            "PIPELINE_STALE_THRESHOLD_SECS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn defaults_match_library_constants_when_env_is_empty() {
        clear_all();
        let config = PipelineConfig::from_env();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.revision_cap, 3);
        assert_eq!(config.max_global_pipelines, 10);
        assert_eq!(config.max_pipelines_per_user, 2);
        assert_eq!(config.stale_pipeline_threshold, Duration::from_secs(900));
    }

    #[test]
    fn env_override_wins_over_default() {
        clear_all();
        std::env::set_var("PIPELINE_REVISION_CAP", "7");
        std::env::set_var("PIPELINE_MAX_ROUNDS", "20");
        let config = PipelineConfig::from_env();
        assert_eq!(config.revision_cap, 7);
        assert_eq!(config.max_rounds, 20);
        clear_all();
    }

    #[test]
    fn unparsable_env_value_falls_back_to_default() {
        clear_all();
        std::env::set_var("PIPELINE_MAX_ROUNDS", "not-a-number");
        let config = PipelineConfig::from_env();
        assert_eq!(config.max_rounds, PipelineConfig::default().max_rounds);
        clear_all();
    }
}

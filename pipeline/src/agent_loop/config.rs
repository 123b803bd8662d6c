//! Tunables for [`super::run`]: retry policy, timeouts, and round bounds.

use std::time::Duration;

/// Tool names exempt from the per-round timeout because they wait on a human
/// (e.g. a gate prompt surfaced through the interview tool). They are never
/// exempt from the *overall* run timeout.
pub const INTERACTIVE_TOOL_PATTERNS: &[&str] = &["interview", "present_to_user", "questionnaire"];

pub fn is_interactive_tool(name: &str) -> bool {
    INTERACTIVE_TOOL_PATTERNS
        .iter()
        .any(|pat| name.contains(pat))
}

/// Configuration for one [`super::run`] invocation.
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    /// Maximum attempts for one LLM call before giving up (includes the first try).
    pub max_retry_attempts: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_base_delay: Duration,
    /// Wall-clock budget for one round (model call + tool dispatch). Interactive
    /// tools are exempt from this but not from `overall_timeout`.
    pub round_timeout: Duration,
    /// Wall-clock budget for the entire run, across all rounds.
    pub overall_timeout: Duration,
    /// Hard cap on the number of rounds before the loop aborts.
    pub max_rounds: u32,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            round_timeout: Duration::from_secs(120),
            overall_timeout: Duration::from_secs(600),
            max_rounds: 10,
        }
    }
}

//! The Agent Loop: one round is a model call followed by tool dispatch.
//!
//! [`run`] drives this to completion — or to a bounded number of rounds —
//! for a single stage's agent. Every stage in the Pipeline Coordinator's
//! stage graph runs through the same loop with a different system prompt,
//! tool set, and model profile.

mod config;

pub use config::{is_interactive_tool, AgentLoopConfig, INTERACTIVE_TOOL_PATTERNS};

use std::time::{Duration, Instant};

use rand::Rng;

use crate::compress::compact;
use crate::error::AgentError;
use crate::llm::{LlmClient, LlmResponse, LlmUsage};
use crate::message::Message;
use crate::state::{ToolCall, ToolResult};
use crate::tool_source::{ToolCallContext, ToolSource};

/// Lifecycle hooks run once at the start and end of a loop invocation, e.g.
/// to open/close a per-run tracing span or flush a scratchpad to storage.
pub trait AgentLoopHooks: Send + Sync {
    fn on_init(&self) {}
    fn on_shutdown(&self) {}
}

/// No-op hooks, for callers that don't need lifecycle notification.
pub struct NoopHooks;
impl AgentLoopHooks for NoopHooks {}

/// Result of one completed (or round-exhausted) agent loop run.
#[derive(Debug, Clone)]
pub struct AgentLoopOutcome {
    /// The assistant's final text reply once no further tool calls were requested.
    pub scratchpad: String,
    /// Full message history accumulated during the run, ready to seed a follow-up call.
    pub messages_out: Vec<Message>,
    /// Token usage summed across every model call in the run.
    pub usage: LlmUsage,
    /// Number of rounds actually executed.
    pub rounds_used: u32,
}

/// Runs the agent loop: `initial_message` (plus any `prior_messages`) seeds
/// the conversation; each round calls `llm`, and if it requests tool calls,
/// dispatches them through `tools` and folds the results back in as one user
/// message before looping. Returns once the model replies with no tool
/// calls, or once `config.max_rounds` is reached.
pub async fn run(
    config: &AgentLoopConfig,
    llm: &dyn LlmClient,
    tools: &dyn ToolSource,
    initial_message: Message,
    prior_messages: Vec<Message>,
    hooks: &dyn AgentLoopHooks,
) -> Result<AgentLoopOutcome, AgentError> {
    hooks.on_init();
    let result = run_inner(config, llm, tools, initial_message, prior_messages).await;
    hooks.on_shutdown();
    result
}

async fn run_inner(
    config: &AgentLoopConfig,
    llm: &dyn LlmClient,
    tools: &dyn ToolSource,
    initial_message: Message,
    prior_messages: Vec<Message>,
) -> Result<AgentLoopOutcome, AgentError> {
    let started_at = Instant::now();
    let mut messages = prior_messages;
    messages.push(initial_message);

    let mut usage = LlmUsage::default();
    let mut scratchpad = String::new();
    let mut rounds_used = 0u32;

    for round in 0..config.max_rounds {
        rounds_used = round + 1;

        let remaining_overall = config
            .overall_timeout
            .checked_sub(started_at.elapsed())
            .ok_or(AgentError::Timeout(config.overall_timeout))?;

        let round_budget = config.round_timeout.min(remaining_overall);
        let response = run_round_with_retry(config, llm, &messages, round_budget).await?;

        if let Some(u) = &response.usage {
            usage.prompt_tokens += u.prompt_tokens;
            usage.completion_tokens += u.completion_tokens;
            usage.total_tokens += u.total_tokens;
        }

        if response.tool_calls.is_empty() {
            scratchpad = response.content.clone();
            messages.push(Message::assistant(response.content));
            messages = compact(messages);
            return Ok(AgentLoopOutcome {
                scratchpad,
                messages_out: messages,
                usage,
                rounds_used,
            });
        }

        if !response.content.is_empty() {
            messages.push(Message::assistant(response.content.clone()));
        }

        let overall_deadline = started_at + config.overall_timeout;
        let results = dispatch_tool_calls(
            tools,
            &messages,
            &response.tool_calls,
            round_budget,
            overall_deadline,
        )
        .await?;

        messages.push(Message::user(render_tool_results(&results)));
        messages = compact(messages);
    }

    scratchpad = messages
        .iter()
        .rev()
        .find_map(|m| match m {
            Message::Assistant(c) => Some(c.clone()),
            _ => None,
        })
        .unwrap_or_default();

    Ok(AgentLoopOutcome {
        scratchpad,
        messages_out: messages,
        usage,
        rounds_used,
    })
}

/// Calls `llm.invoke` with exponential backoff + jitter on rate-limit/timeout
/// errors, up to `config.max_retry_attempts`, bounded by `round_budget`.
async fn run_round_with_retry(
    config: &AgentLoopConfig,
    llm: &dyn LlmClient,
    messages: &[Message],
    round_budget: Duration,
) -> Result<LlmResponse, AgentError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let call = tokio::time::timeout(round_budget, llm.invoke(messages)).await;
        match call {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(err)) if attempt < config.max_retry_attempts && is_retryable(&err) => {
                sleep_backoff(config, attempt).await;
                continue;
            }
            Ok(Err(err)) => return Err(err),
            Err(_elapsed) if attempt < config.max_retry_attempts => {
                sleep_backoff(config, attempt).await;
                continue;
            }
            Err(_elapsed) => return Err(AgentError::Timeout(round_budget)),
        }
    }
}

fn is_retryable(err: &AgentError) -> bool {
    match err {
        AgentError::Llm(msg) => {
            let lower = msg.to_lowercase();
            lower.contains("rate limit") || lower.contains("timeout") || lower.contains("429")
        }
        AgentError::Timeout(_) => true,
        _ => false,
    }
}

async fn sleep_backoff(config: &AgentLoopConfig, attempt: u32) {
    let base = config.retry_base_delay.as_millis() as u64;
    let exp = base.saturating_mul(1u64 << (attempt - 1).min(16));
    let jitter = rand::thread_rng().gen_range(0..=exp.max(1) / 2);
    tokio::time::sleep(Duration::from_millis(exp + jitter)).await;
}

/// Splits `calls` into the sequential set (every tool whose descriptor isn't
/// marked `parallel_safe`, the default) and the parallel-safe set, runs the
/// sequential set first in order, then the rest concurrently, and reassembles
/// all results in the original request order. Interactive tools (which block
/// on a human) are exempt from `round_budget` regardless of which set they
/// land in, bounded instead by the remaining overall run timeout.
async fn dispatch_tool_calls(
    tools: &dyn ToolSource,
    messages: &[Message],
    calls: &[ToolCall],
    round_budget: Duration,
    overall_deadline: Instant,
) -> Result<Vec<ToolResult>, AgentError> {
    let ctx = ToolCallContext::new(messages.to_vec());
    let mut results: Vec<Option<ToolResult>> = vec![None; calls.len()];

    let specs = tools.list_tools().await.unwrap_or_default();
    let is_parallel_safe = |name: &str| {
        specs
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.parallel_safe)
            .unwrap_or(false)
    };
    let budget_for = |name: &str| {
        if is_interactive_tool(name) {
            overall_deadline.saturating_duration_since(Instant::now())
        } else {
            round_budget
        }
    };

    let (sequential, parallel): (Vec<usize>, Vec<usize>) =
        (0..calls.len()).partition(|&i| !is_parallel_safe(&calls[i].name));

    for i in sequential {
        let call = &calls[i];
        let outcome = call_one_tool(tools, call, &ctx, budget_for(&call.name)).await;
        results[i] = Some(outcome);
    }

    if !parallel.is_empty() {
        let futures = parallel.iter().map(|&i| {
            let call = &calls[i];
            call_one_tool(tools, call, &ctx, budget_for(&call.name))
        });
        let outcomes = futures::future::join_all(futures).await;
        for (&i, outcome) in parallel.iter().zip(outcomes) {
            results[i] = Some(outcome);
        }
    }

    Ok(results.into_iter().map(|r| r.expect("every index assigned")).collect())
}

async fn call_one_tool(
    tools: &dyn ToolSource,
    call: &ToolCall,
    ctx: &ToolCallContext,
    budget: Duration,
) -> ToolResult {
    let call_future = tools.call_tool_with_context(&call.name, call.arguments.clone(), Some(ctx));
    match tokio::time::timeout(budget, call_future).await {
        Ok(Ok(content)) => ToolResult::ok(call.id.clone(), content.text),
        Ok(Err(e)) => ToolResult::error(call.id.clone(), e.to_string()),
        Err(_elapsed) => ToolResult::error(call.id.clone(), "tool call timed out".to_string()),
    }
}

/// Renders tool results as one user-role message, in the same order the
/// calls were requested, so the model sees a stable mapping from call id to
/// outcome regardless of which results finished first.
fn render_tool_results(results: &[ToolResult]) -> String {
    let mut out = String::new();
    for result in results {
        let label = if result.is_error { "error" } else { "result" };
        out.push_str(&format!(
            "[tool_call {} {}]\n{}\n\n",
            result.call_id, label, result.content
        ));
    }
    out
}

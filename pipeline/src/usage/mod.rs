//! Usage ledger: the `user_usage` watermark pattern from SPEC_FULL.md §6.
//!
//! Callers don't hand the ledger a delta directly — they hand it the
//! *cumulative* [`LlmUsage`] they've observed so far for a user (e.g.
//! [`crate::pipeline_state::PipelineState::usage`] after a stage completes).
//! [`UsageLedger::flush`] computes the delta against the last successfully
//! persisted watermark and asks the store to add it. If the store write
//! fails, the watermark is left untouched so the next flush recomputes the
//! same delta from scratch rather than losing it.

mod sqlite_store;

pub use sqlite_store::SqliteUsageStore;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmUsage;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum UsageError {
    #[error("usage store error: {0}")]
    Store(String),
}

/// One user's cumulative usage as currently persisted, including the
/// watermark (the cumulative values last flushed successfully — i.e. the
/// caller-side totals this record has already absorbed).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUsageRecord {
    pub user_id: String,
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub total_tokens: u64,
    pub watermark: LlmUsageTotals,
}

/// The three fields a watermark tracks, split out from [`LlmUsage`] so the
/// store doesn't need to depend on an (u32) input-facing type for its own
/// persisted (u64) cumulative counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LlmUsageTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Durable counterpart to the `user_usage` table in SPEC_FULL.md §6.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Adds `delta` to `user_id`'s running totals and advances its watermark
    /// to `new_watermark` in one atomic write. Implementations must leave
    /// both untouched if the write fails.
    async fn add_delta(
        &self,
        user_id: &str,
        delta: &LlmUsage,
        new_watermark: LlmUsageTotals,
    ) -> Result<(), UsageError>;

    async fn get(&self, user_id: &str) -> Result<UserUsageRecord, UsageError>;
}

/// In-memory [`UsageStore`] for tests and single-process dev runs.
#[derive(Default)]
pub struct InMemoryUsageStore {
    records: Mutex<HashMap<String, UserUsageRecord>>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn add_delta(
        &self,
        user_id: &str,
        delta: &LlmUsage,
        new_watermark: LlmUsageTotals,
    ) -> Result<(), UsageError> {
        let mut records = self.records.lock().unwrap();
        let record = records.entry(user_id.to_string()).or_insert_with(|| UserUsageRecord {
            user_id: user_id.to_string(),
            ..Default::default()
        });
        record.total_prompt_tokens += delta.prompt_tokens as u64;
        record.total_completion_tokens += delta.completion_tokens as u64;
        record.total_tokens += delta.total_tokens as u64;
        record.watermark = new_watermark;
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<UserUsageRecord, UsageError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserUsageRecord {
                user_id: user_id.to_string(),
                ..Default::default()
            }))
    }
}

/// Computes and flushes the watermark delta for one user against any
/// [`UsageStore`]. Stateless itself — the watermark lives in the store, not
/// here, so replacing the ledger instance never resets it (same discipline
/// as [`crate::revision::RevisionController`] and its counters).
pub struct UsageLedger<'a> {
    store: &'a dyn UsageStore,
}

impl<'a> UsageLedger<'a> {
    pub fn new(store: &'a dyn UsageStore) -> Self {
        Self { store }
    }

    /// Flushes `user_id`'s cumulative usage. `cumulative` is the full
    /// running total the caller has observed (e.g. `PipelineState::usage`
    /// summed across every session for that user) — not a per-call delta.
    pub async fn flush(&self, user_id: &str, cumulative: &LlmUsage) -> Result<(), UsageError> {
        let current = self.store.get(user_id).await?;
        let cumulative_totals = LlmUsageTotals {
            prompt_tokens: cumulative.prompt_tokens as u64,
            completion_tokens: cumulative.completion_tokens as u64,
            total_tokens: cumulative.total_tokens as u64,
        };
        if cumulative_totals.total_tokens <= current.watermark.total_tokens {
            return Ok(());
        }
        let delta = LlmUsage {
            prompt_tokens: (cumulative_totals.prompt_tokens - current.watermark.prompt_tokens) as u32,
            completion_tokens: (cumulative_totals.completion_tokens
                - current.watermark.completion_tokens) as u32,
            total_tokens: (cumulative_totals.total_tokens - current.watermark.total_tokens) as u32,
        };
        self.store.add_delta(user_id, &delta, cumulative_totals).await
    }
}

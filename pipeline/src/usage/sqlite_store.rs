//! SQLite-backed [`UsageStore`]. Same `rusqlite` + `spawn_blocking` shape as
//! [`crate::pipeline_state::SqlitePipelineStateStore`]: one connection opened
//! per call, one row per user holding both the running totals and the
//! watermark they were last advanced to.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::params;

use super::{LlmUsageTotals, UsageError, UsageStore, UserUsageRecord};
use crate::llm::LlmUsage;

pub struct SqliteUsageStore {
    db_path: std::path::PathBuf,
}

impl SqliteUsageStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, UsageError> {
        let db_path = path.as_ref().to_path_buf();
        let conn =
            rusqlite::Connection::open(&db_path).map_err(|e| UsageError::Store(e.to_string()))?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS user_usage (
                user_id TEXT PRIMARY KEY,
                total_prompt_tokens INTEGER NOT NULL,
                total_completion_tokens INTEGER NOT NULL,
                total_tokens INTEGER NOT NULL,
                watermark_prompt_tokens INTEGER NOT NULL,
                watermark_completion_tokens INTEGER NOT NULL,
                watermark_total_tokens INTEGER NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| UsageError::Store(e.to_string()))?;
        Ok(Self { db_path })
    }

    fn open(&self) -> Result<rusqlite::Connection, UsageError> {
        rusqlite::Connection::open(&self.db_path).map_err(|e| UsageError::Store(e.to_string()))
    }
}

#[async_trait]
impl UsageStore for SqliteUsageStore {
    async fn add_delta(
        &self,
        user_id: &str,
        delta: &LlmUsage,
        new_watermark: LlmUsageTotals,
    ) -> Result<(), UsageError> {
        let conn = self.open()?;
        let user_id = user_id.to_string();
        let delta = delta.clone();
        tokio::task::spawn_blocking(move || {
            conn.execute(
                r#"
                INSERT INTO user_usage (
                    user_id,
                    total_prompt_tokens, total_completion_tokens, total_tokens,
                    watermark_prompt_tokens, watermark_completion_tokens, watermark_total_tokens
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(user_id) DO UPDATE SET
                    total_prompt_tokens = total_prompt_tokens + excluded.total_prompt_tokens,
                    total_completion_tokens = total_completion_tokens + excluded.total_completion_tokens,
                    total_tokens = total_tokens + excluded.total_tokens,
                    watermark_prompt_tokens = excluded.watermark_prompt_tokens,
                    watermark_completion_tokens = excluded.watermark_completion_tokens,
                    watermark_total_tokens = excluded.watermark_total_tokens
                "#,
                params![
                    user_id,
                    delta.prompt_tokens as i64,
                    delta.completion_tokens as i64,
                    delta.total_tokens as i64,
                    new_watermark.prompt_tokens as i64,
                    new_watermark.completion_tokens as i64,
                    new_watermark.total_tokens as i64,
                ],
            )
            .map_err(|e| UsageError::Store(e.to_string()))
        })
        .await
        .map_err(|e| UsageError::Store(e.to_string()))??;
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<UserUsageRecord, UsageError> {
        let conn = self.open()?;
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || {
            let row = conn.query_row(
                r#"
                SELECT total_prompt_tokens, total_completion_tokens, total_tokens,
                       watermark_prompt_tokens, watermark_completion_tokens, watermark_total_tokens
                FROM user_usage WHERE user_id = ?1
                "#,
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            );
            match row {
                Ok((tp, tc, tt, wp, wc, wt)) => Ok(UserUsageRecord {
                    user_id,
                    total_prompt_tokens: tp as u64,
                    total_completion_tokens: tc as u64,
                    total_tokens: tt as u64,
                    watermark: LlmUsageTotals {
                        prompt_tokens: wp as u64,
                        completion_tokens: wc as u64,
                        total_tokens: wt as u64,
                    },
                }),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(UserUsageRecord {
                    user_id,
                    ..Default::default()
                }),
                Err(e) => Err(UsageError::Store(e.to_string())),
            }
        })
        .await
        .map_err(|e| UsageError::Store(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::UsageLedger;

    fn usage(total: u32) -> LlmUsage {
        LlmUsage {
            prompt_tokens: total / 2,
            completion_tokens: total - total / 2,
            total_tokens: total,
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteUsageStore::new(dir.path().join("usage.db")).unwrap();
        let ledger = UsageLedger::new(&store);
        ledger.flush("u1", &usage(100)).await.unwrap();
        let record = store.get("u1").await.unwrap();
        assert_eq!(record.total_tokens, 100);
        assert_eq!(record.watermark.total_tokens, 100);
    }

    #[tokio::test]
    async fn sequential_flushes_accumulate_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteUsageStore::new(dir.path().join("usage.db")).unwrap();
        let ledger = UsageLedger::new(&store);
        ledger.flush("u1", &usage(100)).await.unwrap();
        ledger.flush("u1", &usage(250)).await.unwrap();
        let record = store.get("u1").await.unwrap();
        assert_eq!(record.total_tokens, 250);
        assert_eq!(record.watermark.total_tokens, 250);
    }

    #[tokio::test]
    async fn unknown_user_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteUsageStore::new(dir.path().join("usage.db")).unwrap();
        let record = store.get("nobody").await.unwrap();
        assert_eq!(record, UserUsageRecord { user_id: "nobody".into(), ..Default::default() });
    }
}

//! SQLite-backed [`PipelineStateStore`]. Follows the same `rusqlite` +
//! `spawn_blocking` shape as [`crate::memory::SqliteStore`]: one connection
//! opened per call, state serialized to JSON in a single column keyed by
//! session id.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::params;

use super::{PipelineState, PipelineStateError, PipelineStateStore, PipelineStatus};

pub struct SqlitePipelineStateStore {
    db_path: std::path::PathBuf,
}

impl SqlitePipelineStateStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, PipelineStateError> {
        let db_path = path.as_ref().to_path_buf();
        let conn = rusqlite::Connection::open(&db_path)
            .map_err(|e| PipelineStateError::Store(e.to_string()))?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                state_json TEXT NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| PipelineStateError::Store(e.to_string()))?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS sessions_user_id ON sessions(user_id)",
            [],
        )
        .map_err(|e| PipelineStateError::Store(e.to_string()))?;
        Ok(Self { db_path })
    }

    fn open(&self) -> Result<rusqlite::Connection, PipelineStateError> {
        rusqlite::Connection::open(&self.db_path).map_err(|e| PipelineStateError::Store(e.to_string()))
    }
}

fn status_str(status: PipelineStatus) -> &'static str {
    match status {
        PipelineStatus::Running => "running",
        PipelineStatus::WaitingOnUser => "waiting_on_user",
        PipelineStatus::Error => "error",
        PipelineStatus::Complete => "complete",
    }
}

fn is_active_status(status: &str) -> bool {
    !matches!(status, "error" | "complete")
}

#[async_trait]
impl PipelineStateStore for SqlitePipelineStateStore {
    async fn load(&self, session_id: &str) -> Result<Option<PipelineState>, PipelineStateError> {
        let conn = self.open()?;
        let session_id = session_id.to_string();
        tokio::task::spawn_blocking(move || {
            let json: Option<String> = match conn.query_row(
                "SELECT state_json FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            ) {
                Ok(json) => Some(json),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(PipelineStateError::Store(e.to_string())),
            };
            match json {
                Some(json) => serde_json::from_str(&json)
                    .map(Some)
                    .map_err(|e| PipelineStateError::Store(e.to_string())),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| PipelineStateError::Store(e.to_string()))?
    }

    async fn save(&self, state: &PipelineState) -> Result<(), PipelineStateError> {
        let conn = self.open()?;
        let state = state.clone();
        tokio::task::spawn_blocking(move || {
            let json = serde_json::to_string(&state)
                .map_err(|e| PipelineStateError::Store(e.to_string()))?;
            conn.execute(
                r#"
                INSERT INTO sessions (session_id, user_id, status, updated_at, state_json)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(session_id) DO UPDATE SET
                    user_id = excluded.user_id,
                    status = excluded.status,
                    updated_at = excluded.updated_at,
                    state_json = excluded.state_json
                WHERE excluded.updated_at >= sessions.updated_at
                "#,
                params![
                    state.session_id,
                    state.user_id,
                    status_str(state.status),
                    state.updated_at_millis as i64,
                    json,
                ],
            )
            .map_err(|e| PipelineStateError::Store(e.to_string()))
        })
        .await
        .map_err(|e| PipelineStateError::Store(e.to_string()))??;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<PipelineState>, PipelineStateError> {
        let conn = self.open()?;
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut stmt = conn
                .prepare("SELECT state_json FROM sessions WHERE user_id = ?1")
                .map_err(|e| PipelineStateError::Store(e.to_string()))?;
            let rows = stmt
                .query_map(params![user_id], |row| row.get::<_, String>(0))
                .map_err(|e| PipelineStateError::Store(e.to_string()))?;
            let mut out = Vec::new();
            for row in rows {
                let json = row.map_err(|e| PipelineStateError::Store(e.to_string()))?;
                out.push(
                    serde_json::from_str(&json).map_err(|e| PipelineStateError::Store(e.to_string()))?,
                );
            }
            Ok(out)
        })
        .await
        .map_err(|e| PipelineStateError::Store(e.to_string()))?
    }

    async fn count_active(&self) -> Result<u64, PipelineStateError> {
        let conn = self.open()?;
        tokio::task::spawn_blocking(move || {
            let mut stmt = conn
                .prepare("SELECT status FROM sessions")
                .map_err(|e| PipelineStateError::Store(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| PipelineStateError::Store(e.to_string()))?;
            let mut count = 0u64;
            for row in rows {
                let status = row.map_err(|e| PipelineStateError::Store(e.to_string()))?;
                if is_active_status(&status) {
                    count += 1;
                }
            }
            Ok(count)
        })
        .await
        .map_err(|e| PipelineStateError::Store(e.to_string()))?
    }

    async fn count_active_for_user(&self, user_id: &str) -> Result<u64, PipelineStateError> {
        let conn = self.open()?;
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut stmt = conn
                .prepare("SELECT status FROM sessions WHERE user_id = ?1")
                .map_err(|e| PipelineStateError::Store(e.to_string()))?;
            let rows = stmt
                .query_map(params![user_id], |row| row.get::<_, String>(0))
                .map_err(|e| PipelineStateError::Store(e.to_string()))?;
            let mut count = 0u64;
            for row in rows {
                let status = row.map_err(|e| PipelineStateError::Store(e.to_string()))?;
                if is_active_status(&status) {
                    count += 1;
                }
            }
            Ok(count)
        })
        .await
        .map_err(|e| PipelineStateError::Store(e.to_string()))?
    }
}

//! Tracks one [`SessionBus`] per live session and admits SSE connections
//! against global and per-user caps, refusing with a structured error
//! rather than silently dropping the connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::SessionBus;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FanoutError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("global SSE connection cap reached")]
    GlobalCapacity,
    #[error("per-user SSE connection cap reached")]
    UserCapacity,
}

struct Entry {
    bus: Arc<SessionBus>,
    user_id: String,
    connection_count: u32,
}

/// Registry of live [`SessionBus`]es plus connection accounting for the SSE
/// admission checks in [`crate::capacity`].
pub struct FanoutRegistry {
    sessions: Mutex<HashMap<String, Entry>>,
    max_global_connections: u32,
    max_connections_per_user: u32,
}

impl FanoutRegistry {
    pub fn new(max_global_connections: u32, max_connections_per_user: u32) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_global_connections,
            max_connections_per_user,
        }
    }

    /// Registers a new session bus, replacing any existing one for the same id.
    pub fn register(&self, session_id: impl Into<String>, user_id: impl Into<String>) -> Arc<SessionBus> {
        let session_id = session_id.into();
        let bus = Arc::new(SessionBus::new(session_id.clone()));
        self.sessions.lock().unwrap().insert(
            session_id,
            Entry {
                bus: bus.clone(),
                user_id: user_id.into(),
                connection_count: 0,
            },
        );
        bus
    }

    pub fn bus(&self, session_id: &str) -> Option<Arc<SessionBus>> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .map(|e| e.bus.clone())
    }

    /// Admits one new SSE connection to `session_id`, checking global cap
    /// then per-user cap, in that order. Returns the session's bus on success.
    pub fn admit_connection(&self, session_id: &str) -> Result<Arc<SessionBus>, FanoutError> {
        let mut sessions = self.sessions.lock().unwrap();
        let total_connections: u32 = sessions.values().map(|e| e.connection_count).sum();
        if total_connections >= self.max_global_connections {
            return Err(FanoutError::GlobalCapacity);
        }

        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| FanoutError::NotFound(session_id.to_string()))?;

        let user_id = entry.user_id.clone();
        let per_user: u32 = sessions
            .values()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.connection_count)
            .sum();
        if per_user >= self.max_connections_per_user {
            return Err(FanoutError::UserCapacity);
        }

        let entry = sessions.get_mut(session_id).expect("checked above");
        entry.connection_count += 1;
        Ok(entry.bus.clone())
    }

    pub fn release_connection(&self, session_id: &str) {
        if let Some(entry) = self.sessions.lock().unwrap().get_mut(session_id) {
            entry.connection_count = entry.connection_count.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_within_caps_and_refuses_at_global_cap() {
        let registry = FanoutRegistry::new(1, 10);
        registry.register("s1", "u1");
        registry.register("s2", "u2");
        assert!(registry.admit_connection("s1").is_ok());
        let err = registry.admit_connection("s2").unwrap_err();
        assert!(matches!(err, FanoutError::GlobalCapacity));
    }

    #[test]
    fn refuses_at_per_user_cap_even_under_global_cap() {
        let registry = FanoutRegistry::new(10, 1);
        registry.register("s1", "u1");
        registry.register("s2", "u1");
        assert!(registry.admit_connection("s1").is_ok());
        let err = registry.admit_connection("s2").unwrap_err();
        assert!(matches!(err, FanoutError::UserCapacity));
    }

    #[test]
    fn release_frees_a_connection_slot() {
        let registry = FanoutRegistry::new(1, 10);
        registry.register("s1", "u1");
        registry.admit_connection("s1").unwrap();
        registry.release_connection("s1");
        assert!(registry.admit_connection("s1").is_ok());
    }

    #[test]
    fn unknown_session_is_not_found() {
        let registry = FanoutRegistry::new(10, 10);
        let err = registry.admit_connection("missing").unwrap_err();
        assert!(matches!(err, FanoutError::NotFound(_)));
    }
}

//! Agent Bus: in-process publish/subscribe for inter-agent handoffs.
//!
//! Stage agents don't call each other directly; they publish a
//! [`BusMessage`] onto a named channel and move on. The one consumer wired
//! up today is the Revision Controller, which subscribes to `"craftsman"`
//! for `request` messages published by the `"producer"` agent when a
//! reviewing stage wants a section reworked.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Priority attached to a revision (or other) request; the Revision
/// Controller drops anything below `High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// One message published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub channel: String,
    pub from: String,
    pub kind: String,
    pub session_id: String,
    pub priority: Priority,
    pub payload: serde_json::Value,
}

/// In-process pub/sub keyed by channel name. Each channel gets its own
/// broadcast ring buffer so a slow or absent subscriber on one channel can't
/// back up another.
pub struct AgentBus {
    channels: Mutex<HashMap<String, broadcast::Sender<BusMessage>>>,
    capacity: usize,
}

impl AgentBus {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<BusMessage> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Subscribes to `channel`; returns a receiver that sees every message
    /// published from this point on.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<BusMessage> {
        self.sender_for(channel).subscribe()
    }

    /// Publishes `message` onto its own `channel` field. Returns the number
    /// of subscribers that received it; `0` is not an error (nobody may be
    /// listening yet).
    pub fn publish(&self, message: BusMessage) -> usize {
        self.sender_for(&message.channel).send(message).unwrap_or(0)
    }
}

impl Default for AgentBus {
    fn default() -> Self {
        Self::new()
    }
}

//! Listener registry: which `(channel, event)` pairs the host wants delivered.
//!
//! Backed by a `DashSet`, so host calls and the frame-processing task can
//! insert, remove and look up keys concurrently without outside locking.

use dashmap::DashSet;
use std::fmt;

/// Composite `(channel, event)` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerKey {
    channel: String,
    event: String,
}

impl ListenerKey {
    pub fn new(channel: &str, event: &str) -> Self {
        Self {
            channel: channel.to_string(),
            event: event.to_string(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn event(&self) -> &str {
        &self.event
    }
}

impl fmt::Display for ListenerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.channel, self.event)
    }
}

#[derive(Debug, Default)]
pub struct ListenerRegistry {
    keys: DashSet<ListenerKey>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest. Returns `false` if the key was already present.
    pub fn insert(&self, channel: &str, event: &str) -> bool {
        self.keys.insert(ListenerKey::new(channel, event))
    }

    /// Returns `true` if the key was present.
    pub fn remove(&self, channel: &str, event: &str) -> bool {
        self.keys.remove(&ListenerKey::new(channel, event)).is_some()
    }

    /// Drop every event registered under `channel`, returning how many were removed.
    pub fn remove_channel(&self, channel: &str) -> usize {
        let before = self.keys.len();
        self.keys.retain(|key| key.channel != channel);
        before.saturating_sub(self.keys.len())
    }

    pub fn contains(&self, channel: &str, event: &str) -> bool {
        self.keys.contains(&ListenerKey::new(channel, event))
    }

    pub fn clear(&self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Snapshot of registered keys, sorted.
    pub fn keys(&self) -> Vec<ListenerKey> {
        let mut keys: Vec<ListenerKey> = self.keys.iter().map(|k| k.key().clone()).collect();
        keys.sort();
        keys
    }
}

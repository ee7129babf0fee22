//! Latest-value cache of heartbeats
//!
//! The store keeps exactly one heartbeat per monitor, the most recent one the
//! bridge received, together with the time the bridge received it. Upstream
//! timestamps are never trusted for staleness decisions.

use crate::events::{Heartbeat, MonitorId, Timestamp};
use std::collections::BTreeMap;

/// A heartbeat together with the bridge's receipt time
#[derive(Debug, Clone, PartialEq)]
pub struct StoredHeartbeat {
    pub heartbeat: Heartbeat,
    pub observed_at: Timestamp,
}

impl StoredHeartbeat {
    /// Time elapsed between the last observation and `now`
    pub fn age(&self, now: Timestamp) -> chrono::Duration {
        now - self.observed_at
    }
}

/// Last heartbeat per monitor id
///
/// Entries never expire and survive registry replacement; ids that drop out
/// of the registry simply stop being resolved.
#[derive(Debug, Default)]
pub struct HeartbeatStore {
    entries: BTreeMap<MonitorId, StoredHeartbeat>,
}

impl HeartbeatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the entry for `monitor_id`, stamping it with `now`
    pub fn record(&mut self, monitor_id: MonitorId, heartbeat: Heartbeat, now: Timestamp) {
        self.entries.insert(
            monitor_id,
            StoredHeartbeat {
                heartbeat,
                observed_at: now,
            },
        );
    }

    pub fn get(&self, monitor_id: MonitorId) -> Option<&StoredHeartbeat> {
        self.entries.get(&monitor_id)
    }

    /// Refresh the receipt time of an existing entry
    ///
    /// Returns `false` when there is nothing stored for the id.
    pub fn touch(&mut self, monitor_id: MonitorId, now: Timestamp) -> bool {
        match self.entries.get_mut(&monitor_id) {
            Some(entry) => {
                entry.observed_at = now;
                true
            }
            None => false,
        }
    }

    /// Stored ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = MonitorId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Core event types shared by the transport, the reconciliation engine and the publisher
//!
//! Everything that crosses a component boundary lives here: heartbeats as observed by
//! the monitoring backend, the inbound events decoded from its feed, and the status
//! reports handed to the downstream status API.

use crate::registry::Monitor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Stable identifier of a monitor in the monitoring backend
pub type MonitorId = u64;

/// Up/down signal as reported by the monitoring backend
///
/// The backend encodes heartbeat status as an integer (`0` down, `1` up, `2` pending,
/// `3` maintenance). Only `1` (or a literal `true`) counts as up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawStatus {
    Up,
    Down,
}

impl<'de> Deserialize<'de> for RawStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Flag(bool),
            Code(i64),
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Flag(true) | Wire::Code(1) => RawStatus::Up,
            Wire::Flag(false) | Wire::Code(_) => RawStatus::Down,
        })
    }
}

/// One observation of a monitor's health
#[derive(Debug, Clone, PartialEq)]
pub struct Heartbeat {
    /// Monitor the observation belongs to
    pub monitor_id: MonitorId,
    /// Raw up/down signal
    pub status: RawStatus,
    /// Measured latency in milliseconds, 0 when the backend sent none
    pub latency: f64,
}

impl Heartbeat {
    pub fn new(monitor_id: MonitorId, status: RawStatus, latency: f64) -> Self {
        Self {
            monitor_id,
            status,
            latency,
        }
    }

    pub fn up(monitor_id: MonitorId, latency: f64) -> Self {
        Self::new(monitor_id, RawStatus::Up, latency)
    }

    pub fn down(monitor_id: MonitorId) -> Self {
        Self::new(monitor_id, RawStatus::Down, 0.0)
    }

    pub fn is_up(&self) -> bool {
        self.status == RawStatus::Up
    }
}

/// Normalized status understood by the downstream status API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResolvedStatus {
    Up,
    Degraded,
    Down,
}

impl fmt::Display for ResolvedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResolvedStatus::Up => "UP",
            ResolvedStatus::Degraded => "DEGRADED",
            ResolvedStatus::Down => "DOWN",
        };
        f.write_str(label)
    }
}

/// Body of `POST /api/status`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusPayload {
    pub status: ResolvedStatus,
    pub latency: f64,
    pub tag: String,
}

/// A resolved status ready to be published, with the monitor it came from
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub monitor_id: MonitorId,
    pub monitor_name: String,
    pub payload: StatusPayload,
}

/// Events decoded from the monitoring backend's push feed
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// The socket connected
    Connected,
    /// The login handshake succeeded
    LoggedIn,
    /// The socket failed to connect
    ConnectError(String),
    /// The socket went away
    Disconnected(String),
    /// Full listing of monitor definitions
    MonitorList(Vec<Monitor>),
    /// Backfill of recent heartbeats for one monitor, oldest first
    HeartbeatList {
        monitor_id: MonitorId,
        heartbeats: Vec<Heartbeat>,
        overwrite: bool,
    },
    /// A single live heartbeat
    Heartbeat(Heartbeat),
    /// Liveness ping for a monitor, carries no heartbeat
    Uptime { monitor_id: MonitorId },
}

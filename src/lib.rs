/// Error types for the bridge
pub mod error;

/// Heartbeats, statuses and inbound events shared by all components
pub mod events;

/// Monitor definitions and the registry snapshot
pub mod registry;

/// Latest heartbeat per monitor
pub mod store;

/// Status resolution and group aggregation
pub mod resolver;

/// Event routing into the reconciliation state
pub mod dispatch;

/// Periodic republish of every known status
pub mod watchdog;

/// Delivery of status reports to the status API
pub mod publisher;

/// Socket.IO client for the monitoring feed
pub mod transport;

/// Configuration management
pub mod config;

/// Single-owner event loop tying everything together
pub mod bridge;

// Re-export commonly used types
pub use bridge::{Bridge, BridgeMessage};
pub use error::{AuthFailure, ConfigError, EventError, PublishError, TransportError};
pub use events::{Heartbeat, InboundEvent, ResolvedStatus, StatusPayload, StatusReport};

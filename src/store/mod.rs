/// Heartbeat store and the clock that stamps its entries
pub mod clock;
pub mod heartbeat_store;

pub use clock::{Clock, SystemClock};
pub use heartbeat_store::{HeartbeatStore, StoredHeartbeat};

#[cfg(test)]
pub use clock::MockClock;

/// Publishing resolved statuses to the downstream status API
pub mod outbox;
pub mod sinks;

pub use outbox::Publisher;
pub use sinks::{KenerSink, MockSink, StatusSink};

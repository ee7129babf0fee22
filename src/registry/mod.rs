/// Monitor definitions and the registry snapshot that holds them
pub mod monitor;
pub mod monitor_registry;

pub use monitor::{Monitor, MonitorKind, Tag};
pub use monitor_registry::MonitorRegistry;

use crate::events::MonitorId;
use crate::registry::Monitor;
use std::collections::HashMap;

/// Snapshot of every monitor definition known to the bridge
///
/// The snapshot is only ever replaced as a whole; there is no partial update.
/// Lookups for ids that are missing, or whose kind the bridge does not handle,
/// return `None` and callers skip the event.
#[derive(Debug, Default)]
pub struct MonitorRegistry {
    monitors: HashMap<MonitorId, Monitor>,
    has_snapshot: bool,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a complete new listing
    pub fn replace(&mut self, snapshot: Vec<Monitor>) {
        self.monitors = snapshot
            .into_iter()
            .map(|monitor| (monitor.id, monitor))
            .collect();
        self.has_snapshot = true;
    }

    pub fn lookup(&self, id: MonitorId) -> Option<&Monitor> {
        self.monitors
            .get(&id)
            .filter(|monitor| monitor.kind.is_supported())
    }

    /// Number of monitors in the snapshot, supported or not
    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// False until the first listing arrives
    pub fn has_snapshot(&self) -> bool {
        self.has_snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MonitorKind;

    #[test]
    fn test_lookup_before_first_snapshot() {
        let registry = MonitorRegistry::new();
        assert!(!registry.has_snapshot());
        assert!(registry.is_empty());
        assert!(registry.lookup(1).is_none());
    }

    #[test]
    fn test_replace_discards_previous_snapshot() {
        let mut registry = MonitorRegistry::new();
        registry.replace(vec![
            Monitor::new(1, "One", MonitorKind::Http),
            Monitor::new(2, "Two", MonitorKind::Push),
        ]);
        assert_eq!(registry.len(), 2);

        registry.replace(vec![Monitor::new(3, "Three", MonitorKind::Port)]);
        assert!(registry.has_snapshot());
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(1).is_none());
        assert!(registry.lookup(2).is_none());
        assert_eq!(registry.lookup(3).map(|m| m.name.as_str()), Some("Three"));
    }

    #[test]
    fn test_unsupported_kind_is_not_found() {
        let mut registry = MonitorRegistry::new();
        registry.replace(vec![Monitor::new(
            5,
            "Resolver",
            MonitorKind::Unsupported("dns".to_string()),
        )]);

        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(5).is_none());
    }
}

use crate::events::MonitorId;
use crate::registry::MonitorRegistry;
use crate::store::HeartbeatStore;

/// Up/down tally over the eligible children of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupCounts {
    pub total: usize,
    pub up: usize,
    pub down: usize,
}

impl GroupCounts {
    /// Fraction of eligible children that are up, `None` when there are none
    pub fn up_ratio(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.up as f64 / self.total as f64)
        }
    }
}

/// Folds the children of a group monitor into a single tally
///
/// A child is eligible when it is registered, is a leaf check and has a
/// recorded heartbeat. Everything else (unknown ids, nested groups,
/// unsupported kinds, children never heard from) is left out of both the
/// numerator and the denominator.
pub struct GroupAggregator<'a> {
    registry: &'a MonitorRegistry,
    store: &'a HeartbeatStore,
}

impl<'a> GroupAggregator<'a> {
    pub fn new(registry: &'a MonitorRegistry, store: &'a HeartbeatStore) -> Self {
        Self { registry, store }
    }

    pub fn count(&self, children: &[MonitorId]) -> GroupCounts {
        let mut counts = GroupCounts::default();

        for &child_id in children {
            let Some(child) = self.registry.lookup(child_id) else {
                continue;
            };
            if !child.kind.is_leaf() {
                continue;
            }
            let Some(stored) = self.store.get(child_id) else {
                continue;
            };

            counts.total += 1;
            if stored.heartbeat.is_up() {
                counts.up += 1;
            } else {
                counts.down += 1;
            }
        }

        counts
    }
}

//! Mapping from monitor state to the three-valued downstream status
//!
//! Resolution is a pure function of the monitor definition, its latest heartbeat
//! and, for groups, the heartbeats of its children. It is re-run on every
//! trigger; nothing here is cached.

use crate::events::{Heartbeat, RawStatus, ResolvedStatus, StatusPayload, StatusReport};
use crate::registry::{Monitor, MonitorKind, MonitorRegistry};
use crate::resolver::{GroupAggregator, GroupCounts};
use crate::store::HeartbeatStore;
use log::{debug, warn};

/// Share of up children above which a mixed group is considered "mostly up"
const MOSTLY_UP_RATIO: f64 = 0.75;

/// Tag names and defaults the resolver reads monitors with
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverSettings {
    /// Tag whose value names the downstream identifier to report under
    pub publish_tag: String,
    /// Tag holding a per-monitor latency threshold in milliseconds
    pub latency_tag: String,
    /// Threshold used when a monitor has no latency tag
    pub default_max_latency: f64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            publish_tag: "kener".to_string(),
            latency_tag: "max_ping".to_string(),
            default_max_latency: 2000.0,
        }
    }
}

/// Resolves monitors into statuses and publishable reports
#[derive(Debug, Clone, Default)]
pub struct StatusResolver {
    settings: ResolverSettings,
}

impl StatusResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }

    /// Status of a directly checked monitor
    ///
    /// Down wins regardless of latency; an up heartbeat slower than the
    /// threshold is degraded. A latency equal to the threshold is still up.
    pub fn leaf_status(heartbeat: &Heartbeat, max_latency: f64) -> ResolvedStatus {
        match heartbeat.status {
            RawStatus::Down => ResolvedStatus::Down,
            RawStatus::Up if heartbeat.latency > max_latency => ResolvedStatus::Degraded,
            RawStatus::Up => ResolvedStatus::Up,
        }
    }

    /// Status of a group from the tally of its eligible children
    pub fn group_status(counts: GroupCounts) -> ResolvedStatus {
        if counts.total == 0 || counts.down == counts.total {
            return ResolvedStatus::Down;
        }
        if counts.up == counts.total {
            return ResolvedStatus::Up;
        }

        // "Mostly up" is reported the same way as any other mixed group.
        if counts.up_ratio().is_some_and(|ratio| ratio > MOSTLY_UP_RATIO) {
            debug!(
                "Group mostly up ({}/{} children up), reporting DEGRADED",
                counts.up, counts.total
            );
        }
        ResolvedStatus::Degraded
    }

    /// Latency threshold for a monitor, from its tag or the default
    pub fn max_latency(&self, monitor: &Monitor) -> f64 {
        let Some(raw) = monitor.tag_value(&self.settings.latency_tag) else {
            return self.settings.default_max_latency;
        };

        match leading_integer(raw) {
            Some(value) => value,
            None => {
                warn!(
                    "Monitor #{} ({}) has an unreadable {} tag '{}', using {}",
                    monitor.id,
                    monitor.name,
                    self.settings.latency_tag,
                    raw,
                    self.settings.default_max_latency
                );
                self.settings.default_max_latency
            }
        }
    }

    /// Resolve a monitor into a status and the latency to report with it
    ///
    /// Returns `None` when there is nothing to resolve from: a leaf that has
    /// never sent a heartbeat, or a kind the bridge does not handle.
    pub fn resolve(
        &self,
        monitor: &Monitor,
        registry: &MonitorRegistry,
        store: &HeartbeatStore,
    ) -> Option<(ResolvedStatus, f64)> {
        let own = store.get(monitor.id).map(|stored| &stored.heartbeat);

        match &monitor.kind {
            MonitorKind::Http
            | MonitorKind::Push
            | MonitorKind::Port
            | MonitorKind::Docker
            | MonitorKind::JsonQuery => {
                let heartbeat = own?;
                let status = Self::leaf_status(heartbeat, self.max_latency(monitor));
                Some((status, heartbeat.latency))
            }
            MonitorKind::Group { children } => {
                let counts = GroupAggregator::new(registry, store).count(children);
                debug!(
                    "Group #{} ({}): {} eligible children, {} up, {} down",
                    monitor.id, monitor.name, counts.total, counts.up, counts.down
                );
                let latency = own.map_or(0.0, |heartbeat| heartbeat.latency);
                Some((Self::group_status(counts), latency))
            }
            MonitorKind::Unsupported(_) => None,
        }
    }

    /// Build the report to publish for a monitor, if it should be published
    ///
    /// Inactive monitors and monitors without a publish tag never produce a
    /// report.
    pub fn report(
        &self,
        monitor: &Monitor,
        registry: &MonitorRegistry,
        store: &HeartbeatStore,
    ) -> Option<StatusReport> {
        if !monitor.active {
            debug!("Monitor #{} ({}) is paused, not publishing", monitor.id, monitor.name);
            return None;
        }
        let tag = monitor.tag_value(&self.settings.publish_tag)?;
        let (status, latency) = self.resolve(monitor, registry, store)?;

        Some(StatusReport {
            monitor_id: monitor.id,
            monitor_name: monitor.name.clone(),
            payload: StatusPayload {
                status,
                latency,
                tag: tag.to_string(),
            },
        })
    }
}

/// Integer at the start of a tag value, so "500ms" reads as 500
///
/// Anything after the leading digits is ignored, including a fractional part.
fn leading_integer(raw: &str) -> Option<f64> {
    let raw = raw.trim_start();
    let (negative, digits) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let value = digits[..end].parse::<f64>().ok()?;
    Some(if negative { -value } else { value })
}


// Property-based tests
#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    /// Finite, non-negative latency in milliseconds
    #[derive(Debug, Clone, Copy)]
    struct Latency(f64);

    impl Arbitrary for Latency {
        fn arbitrary(g: &mut Gen) -> Self {
            Latency((u32::arbitrary(g) % 10_000) as f64 + (u8::arbitrary(g) % 10) as f64 / 10.0)
        }
    }

    /// Group tally with `up + down == total`
    #[derive(Debug, Clone, Copy)]
    struct Tally(GroupCounts);

    impl Arbitrary for Tally {
        fn arbitrary(g: &mut Gen) -> Self {
            let total = (u8::arbitrary(g) % 20) as usize;
            let up = if total == 0 {
                0
            } else {
                usize::arbitrary(g) % (total + 1)
            };
            Tally(GroupCounts {
                total,
                up,
                down: total - up,
            })
        }
    }

    #[quickcheck]
    fn prop_down_heartbeat_is_always_down(latency: Latency, threshold: Latency) -> bool {
        let heartbeat = Heartbeat::new(1, RawStatus::Down, latency.0);
        StatusResolver::leaf_status(&heartbeat, threshold.0) == ResolvedStatus::Down
    }

    #[quickcheck]
    fn prop_up_heartbeat_degrades_only_above_threshold(latency: Latency, threshold: Latency) -> bool {
        let status = StatusResolver::leaf_status(&Heartbeat::up(1, latency.0), threshold.0);
        if latency.0 > threshold.0 {
            status == ResolvedStatus::Degraded
        } else {
            status == ResolvedStatus::Up
        }
    }

    #[quickcheck]
    fn prop_latency_at_threshold_is_up(threshold: Latency) -> bool {
        StatusResolver::leaf_status(&Heartbeat::up(1, threshold.0), threshold.0) == ResolvedStatus::Up
    }

    #[quickcheck]
    fn prop_group_status_follows_tally(tally: Tally) -> bool {
        let counts = tally.0;
        let status = StatusResolver::group_status(counts);
        match (counts.total, counts.up, counts.down) {
            (0, _, _) => status == ResolvedStatus::Down,
            (total, up, _) if up == total => status == ResolvedStatus::Up,
            (total, _, down) if down == total => status == ResolvedStatus::Down,
            _ => status == ResolvedStatus::Degraded,
        }
    }
}

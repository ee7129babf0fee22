//! Staleness watchdog
//!
//! A periodic safety net against missed or dropped feed events: on every tick
//! the last known status of every monitor we have a heartbeat for is published
//! again. Republishing an unchanged status is harmless downstream.

pub mod schedule;

pub use schedule::WatchdogSchedule;

use crate::bridge::BridgeMessage;
use crate::events::StatusReport;
use crate::registry::MonitorRegistry;
use crate::resolver::StatusResolver;
use crate::store::HeartbeatStore;
use chrono::Utc;
use log::{debug, info};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Re-resolve every stored heartbeat whose monitor is registered and publishable
///
/// Receipt timestamps are left untouched.
pub fn sweep(
    registry: &MonitorRegistry,
    store: &HeartbeatStore,
    resolver: &StatusResolver,
) -> Vec<StatusReport> {
    store
        .ids()
        .filter_map(|id| registry.lookup(id))
        .filter_map(|monitor| resolver.report(monitor, registry, store))
        .collect()
}

/// Timer task that asks the bridge for a sweep on every scheduled tick
pub struct Watchdog {
    schedule: WatchdogSchedule,
}

impl Watchdog {
    pub fn new(schedule: WatchdogSchedule) -> Self {
        Self { schedule }
    }

    /// Spawn the timer; it stops once the bridge channel is closed
    pub fn spawn(self, sender: UnboundedSender<BridgeMessage>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                target: "watchdog",
                "Watchdog started (every {}s at +{}s, {})",
                self.schedule.interval_seconds,
                self.schedule.offset_seconds,
                self.schedule.timezone
            );

            loop {
                let now = Utc::now();
                let next = self.schedule.next_tick_after(now);
                let wait = (next - now).to_std().unwrap_or_default();
                debug!(target: "watchdog", "Next sweep at {}", next);
                tokio::time::sleep(wait).await;

                info!(target: "watchdog", "Watchdog triggered");
                if sender.send(BridgeMessage::Sweep).is_err() {
                    break;
                }
            }

            info!(target: "watchdog", "Watchdog stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Heartbeat, ResolvedStatus};
    use crate::registry::{Monitor, MonitorKind};
    use chrono::Duration;

    #[test]
    fn test_sweep_reports_registered_tagged_monitors() {
        let mut registry = MonitorRegistry::new();
        registry.replace(vec![
            Monitor::new(1, "A", MonitorKind::Http).with_tag("kener", "a"),
            Monitor::new(2, "B", MonitorKind::Http),
            Monitor::new(3, "C", MonitorKind::Http)
                .with_tag("kener", "c")
                .inactive(),
        ]);
        let mut store = HeartbeatStore::new();
        let then = Utc::now() - Duration::minutes(3);
        for id in [1, 2, 3, 4] {
            store.record(id, Heartbeat::up(id, 12.0), then);
        }

        let reports = sweep(&registry, &store, &StatusResolver::default());

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].monitor_id, 1);
        assert_eq!(reports[0].payload.status, ResolvedStatus::Up);
        assert_eq!(store.get(1).unwrap().observed_at, then);
    }

    #[test]
    fn test_repeated_sweeps_are_identical() {
        let mut registry = MonitorRegistry::new();
        registry.replace(vec![
            Monitor::new(1, "A", MonitorKind::Http).with_tag("kener", "a"),
            Monitor::new(2, "G", MonitorKind::Group { children: vec![1] }).with_tag("kener", "g"),
        ]);
        let mut store = HeartbeatStore::new();
        store.record(1, Heartbeat::up(1, 3000.0), Utc::now());
        store.record(2, Heartbeat::up(2, 40.0), Utc::now());
        let resolver = StatusResolver::default();

        let first = sweep(&registry, &store, &resolver);
        let second = sweep(&registry, &store, &resolver);

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_watchdog_stops_when_channel_closes() {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        drop(receiver);

        let schedule = WatchdogSchedule {
            interval_seconds: 1,
            offset_seconds: 0,
            timezone: chrono_tz::UTC,
        };
        let handle = Watchdog::new(schedule).spawn(sender);

        tokio::time::timeout(std::time::Duration::from_secs(3), handle)
            .await
            .expect("watchdog should stop")
            .unwrap();
    }
}

//! Reconciliation dispatcher
//!
//! The dispatcher is the single owner of the monitor registry and the heartbeat
//! store. Each inbound event mutates that state and yields the status reports
//! that should be published as a consequence. Publishing itself happens
//! elsewhere so that handling stays synchronous and deterministic.

use crate::error::EventError;
use crate::events::{Heartbeat, InboundEvent, MonitorId, StatusReport};
use crate::registry::{Monitor, MonitorRegistry};
use crate::resolver::StatusResolver;
use crate::store::{Clock, HeartbeatStore, SystemClock};
use crate::watchdog;
use chrono::Duration;
use log::{debug, error, info};
use std::sync::Arc;

/// Routes inbound events to state updates and status reports
pub struct Dispatcher {
    registry: MonitorRegistry,
    store: HeartbeatStore,
    resolver: StatusResolver,
    /// Minimum heartbeat age before a liveness ping republishes it
    liveness_threshold: Duration,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(resolver: StatusResolver, liveness_threshold: Duration) -> Self {
        Self {
            registry: MonitorRegistry::new(),
            store: HeartbeatStore::new(),
            resolver,
            liveness_threshold,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used to stamp heartbeats
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &MonitorRegistry {
        &self.registry
    }

    pub fn store(&self) -> &HeartbeatStore {
        &self.store
    }

    /// Handle one event and return the reports to publish
    ///
    /// Errors never escape: a bad event is logged and dropped so the next
    /// one is handled normally.
    pub fn handle(&mut self, event: InboundEvent) -> Vec<StatusReport> {
        let name = event_name(&event);
        match self.try_handle(event) {
            Ok(reports) => reports,
            Err(e) => {
                error!("Failed to handle {} event: {}", name, e);
                Vec::new()
            }
        }
    }

    /// Reports for every stored heartbeat, see [`watchdog::sweep`]
    pub fn sweep(&self) -> Vec<StatusReport> {
        let reports = watchdog::sweep(&self.registry, &self.store, &self.resolver);
        info!(
            target: "watchdog",
            "Sweep over {} stored heartbeats, {} to republish",
            self.store.len(),
            reports.len()
        );
        reports
    }

    fn try_handle(&mut self, event: InboundEvent) -> Result<Vec<StatusReport>, EventError> {
        match event {
            InboundEvent::Connected => {
                info!(target: "kuma", "Connected to socket");
                Ok(Vec::new())
            }
            InboundEvent::LoggedIn => {
                info!(target: "kuma", "Logged in");
                Ok(Vec::new())
            }
            InboundEvent::ConnectError(reason) => {
                error!(target: "kuma", "Failed to connect to the backend: {}", reason);
                Ok(Vec::new())
            }
            InboundEvent::Disconnected(reason) => {
                error!(target: "kuma", "Disconnected from the socket server: {}", reason);
                Ok(Vec::new())
            }
            InboundEvent::MonitorList(monitors) => {
                info!(target: "kuma", "Receive {} monitors", monitors.len());
                self.registry.replace(monitors);
                Ok(Vec::new())
            }
            InboundEvent::HeartbeatList {
                monitor_id,
                heartbeats,
                overwrite,
            } => self.on_heartbeat_list(monitor_id, heartbeats, overwrite),
            InboundEvent::Heartbeat(heartbeat) => Ok(self.on_heartbeat(heartbeat)),
            InboundEvent::Uptime { monitor_id } => Ok(self.on_uptime(monitor_id)),
        }
    }

    fn on_heartbeat_list(
        &mut self,
        monitor_id: MonitorId,
        heartbeats: Vec<Heartbeat>,
        overwrite: bool,
    ) -> Result<Vec<StatusReport>, EventError> {
        let count = heartbeats.len();
        let Some(current) = heartbeats.into_iter().last() else {
            info!(target: "heartbeat", "Empty heartbeat list for monitor #{}", monitor_id);
            return Ok(Vec::new());
        };
        if current.monitor_id != monitor_id {
            return Err(EventError::Malformed(format!(
                "heartbeat for monitor #{} in the list of monitor #{}",
                current.monitor_id, monitor_id
            )));
        }

        self.store.record(monitor_id, current, self.clock.now());

        let Some(monitor) = self.registry.lookup(monitor_id) else {
            debug!(target: "heartbeat", "Heartbeat list for unknown monitor #{}", monitor_id);
            return Ok(Vec::new());
        };
        info!(
            target: "heartbeat",
            "Receive list of {} for monitor #{} ({} | {}){}",
            count,
            monitor_id,
            monitor.kind.label(),
            monitor.name,
            if overwrite { ", overwrite" } else { "" }
        );

        Ok(self.report_for(monitor).into_iter().collect())
    }

    fn on_heartbeat(&mut self, heartbeat: Heartbeat) -> Vec<StatusReport> {
        let monitor_id = heartbeat.monitor_id;
        // The store is written before the lookup so heartbeats for monitors
        // we do not know yet are still cached.
        self.store.record(monitor_id, heartbeat, self.clock.now());

        let Some(monitor) = self.registry.lookup(monitor_id) else {
            if self.registry.has_snapshot() {
                debug!(target: "heartbeat", "Heartbeat for unknown monitor #{}", monitor_id);
            } else {
                debug!(target: "heartbeat", "Heartbeat for monitor #{} before the monitor list", monitor_id);
            }
            return Vec::new();
        };
        info!(
            target: "heartbeat",
            "Receive for monitor #{} ({})", monitor_id, monitor.name
        );

        self.report_for(monitor).into_iter().collect()
    }

    fn on_uptime(&mut self, monitor_id: MonitorId) -> Vec<StatusReport> {
        let Some(monitor) = self.registry.lookup(monitor_id) else {
            return Vec::new();
        };
        let Some(stored) = self.store.get(monitor_id) else {
            return Vec::new();
        };

        let now = self.clock.now();
        let age = stored.age(now);
        if age < self.liveness_threshold {
            return Vec::new();
        }
        debug!(
            target: "uptime",
            "Monitor #{} ({}) last heard from {}ms ago",
            monitor_id,
            monitor.name,
            age.num_milliseconds()
        );

        let reports = self.report_for(monitor).into_iter().collect();
        self.store.touch(monitor_id, now);
        reports
    }

    fn report_for(&self, monitor: &Monitor) -> Option<StatusReport> {
        self.resolver.report(monitor, &self.registry, &self.store)
    }
}

fn event_name(event: &InboundEvent) -> &'static str {
    match event {
        InboundEvent::Connected => "connect",
        InboundEvent::LoggedIn => "login",
        InboundEvent::ConnectError(_) => "connect_error",
        InboundEvent::Disconnected(_) => "disconnect",
        InboundEvent::MonitorList(_) => "monitorList",
        InboundEvent::HeartbeatList { .. } => "heartbeatList",
        InboundEvent::Heartbeat(_) => "heartbeat",
        InboundEvent::Uptime { .. } => "uptime",
    }
}

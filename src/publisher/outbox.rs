use crate::events::StatusReport;
use crate::publisher::StatusSink;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Fire-and-forget delivery of status reports
///
/// Every report is sent on its own task so a slow status API never holds up
/// the next feed event. Failures are logged and dropped: there is no retry,
/// the watchdog's periodic republish is the only recovery path. Overlapping
/// publishes for the same monitor are allowed.
pub struct Publisher {
    sink: Arc<dyn StatusSink>,
    in_flight: JoinSet<()>,
}

impl Publisher {
    pub fn new(sink: Arc<dyn StatusSink>) -> Self {
        Self {
            sink,
            in_flight: JoinSet::new(),
        }
    }

    /// Start sending a report without waiting for the result
    pub fn publish(&mut self, report: StatusReport) {
        self.reap_finished();

        let sink = Arc::clone(&self.sink);
        self.in_flight.spawn(async move {
            debug!(
                target: "kener",
                "Start monitor update for #{} ({})", report.monitor_id, report.monitor_name
            );
            match sink.send(&report.payload).await {
                Ok(()) => info!(
                    target: "kener",
                    "{} updated status {} (latency: {}, tag: {})",
                    report.monitor_name,
                    report.payload.status,
                    report.payload.latency,
                    report.payload.tag
                ),
                Err(e) => error!(
                    target: "kener",
                    "Failed to publish {} for {} (tag: {}): {}",
                    report.payload.status,
                    report.monitor_name,
                    report.payload.tag,
                    e
                ),
            }
        });
    }

    /// Number of publishes not yet collected
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait for every outstanding publish to finish
    ///
    /// Used on shutdown; each publish is bounded by the sink's own timeout.
    pub async fn drain(&mut self) {
        while let Some(result) = self.in_flight.join_next().await {
            if let Err(e) = result {
                error!(target: "kener", "Publish task failed: {}", e);
            }
        }
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.in_flight.try_join_next() {
            if let Err(e) = result {
                error!(target: "kener", "Publish task failed: {}", e);
            }
        }
    }
}

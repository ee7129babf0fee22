//! Bridge runtime
//!
//! One task owns the dispatcher and drains a single channel fed by the feed
//! client, the watchdog timer and the signal handler. Handling is therefore
//! strictly sequential: a sweep never interleaves with an event. Publishing is
//! handed off to the [`Publisher`], which never blocks the loop.

use crate::dispatch::Dispatcher;
use crate::events::InboundEvent;
use crate::publisher::Publisher;
use log::{debug, info};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Messages processed by the bridge loop
#[derive(Debug)]
pub enum BridgeMessage {
    /// A decoded event from the monitoring feed
    Event(InboundEvent),
    /// Watchdog tick: republish everything we know about
    Sweep,
    Shutdown,
}

pub struct Bridge {
    dispatcher: Dispatcher,
    publisher: Publisher,
    receiver: UnboundedReceiver<BridgeMessage>,
}

impl Bridge {
    /// Create the bridge and the sender its producers share
    pub fn new(dispatcher: Dispatcher, publisher: Publisher) -> (Self, UnboundedSender<BridgeMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                dispatcher,
                publisher,
                receiver,
            },
            sender,
        )
    }

    /// Process messages until `Shutdown` or until every sender is gone
    ///
    /// Outstanding publishes are awaited before returning. The dispatcher is
    /// handed back so its final state can be inspected.
    pub async fn run(mut self) -> Dispatcher {
        info!("Bridge started");

        while let Some(message) = self.receiver.recv().await {
            let reports = match message {
                BridgeMessage::Event(event) => self.dispatcher.handle(event),
                BridgeMessage::Sweep => self.dispatcher.sweep(),
                BridgeMessage::Shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            };

            debug!("{} reports to publish", reports.len());
            for report in reports {
                self.publisher.publish(report);
            }
        }

        self.receiver.close();
        let pending = self.publisher.in_flight();
        if pending > 0 {
            info!("Waiting for {} in-flight publishes", pending);
        }
        self.publisher.drain().await;

        info!("Bridge stopped");
        self.dispatcher
    }
}

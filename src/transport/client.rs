use crate::bridge::BridgeMessage;
use crate::error::TransportError;
use crate::events::InboundEvent;
use crate::transport::packet;
use crate::transport::session::{Credentials, Session, SessionAction};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const SOCKET_PATH: &str = "/socket.io/?EIO=4&transport=websocket";

/// Websocket client for the monitoring backend's push feed
///
/// Logs in once, then forwards every decoded feed event to the bridge until
/// the server goes away. There is no reconnect.
#[derive(Debug, Clone)]
pub struct KumaClient {
    url: String,
    credentials: Credentials,
}

impl KumaClient {
    pub fn new(url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            url: url.into(),
            credentials,
        }
    }

    /// Websocket endpoint derived from the configured base url
    pub fn socket_url(&self) -> String {
        let base = self.url.trim().trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else if base.starts_with("ws://") || base.starts_with("wss://") {
            base.to_string()
        } else {
            format!("ws://{}", base)
        };
        format!("{}{}", base, SOCKET_PATH)
    }

    /// Connect, log in and pump events into the bridge
    ///
    /// Returns `Ok(())` when the server closes the stream. A `Disconnected`
    /// event is delivered on every exit path after the socket was opened.
    pub async fn run(&self, bridge: UnboundedSender<BridgeMessage>) -> Result<(), TransportError> {
        let url = self.socket_url();
        info!(target: "kuma", "Connecting to {}", url);

        let (socket, _) = match connect_async(url.as_str()).await {
            Ok(connection) => connection,
            Err(e) => {
                deliver(&bridge, InboundEvent::ConnectError(e.to_string()))?;
                return Err(e.into());
            }
        };
        let (mut sink, mut stream) = socket.split();
        let mut session = Session::new(self.credentials.clone());

        let outcome: Result<(), TransportError> = async {
            while let Some(message) = stream.next().await {
                let frame = match message? {
                    Message::Text(frame) => frame,
                    Message::Close(frame) => {
                        debug!(target: "kuma", "Close frame received: {:?}", frame);
                        return Ok(());
                    }
                    // Websocket-level pings are answered by tungstenite itself
                    _ => continue,
                };

                let packet = match packet::decode(&frame) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!(target: "kuma", "Ignoring undecodable frame: {}", e);
                        continue;
                    }
                };

                for action in session.on_packet(packet)? {
                    match action {
                        SessionAction::Send(frame) => sink.send(Message::Text(frame)).await?,
                        SessionAction::Deliver(event) => deliver(&bridge, event)?,
                    }
                }
            }
            Ok(())
        }
        .await;

        if let Err(e) = sink.close().await {
            debug!(target: "kuma", "Error while closing socket: {}", e);
        }

        let reason = disconnect_reason(&outcome, session.is_logged_in());
        // The bridge may already be gone during shutdown
        let _ = deliver(&bridge, InboundEvent::Disconnected(reason));

        outcome
    }
}

fn disconnect_reason(outcome: &Result<(), TransportError>, logged_in: bool) -> String {
    let reason = match outcome {
        Ok(()) => "connection closed".to_string(),
        Err(e) => e.to_string(),
    };
    if logged_in {
        reason
    } else {
        format!("{} before login", reason)
    }
}

fn deliver(bridge: &UnboundedSender<BridgeMessage>, event: InboundEvent) -> Result<(), TransportError> {
    bridge
        .send(BridgeMessage::Event(event))
        .map_err(|_| TransportError::ChannelClosed)
}

use crate::error::{AuthFailure, TransportError};
use crate::events::InboundEvent;
use crate::transport::decode::decode_event;
use crate::transport::packet::{self, EnginePacket, SocketPacket};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;

/// Login for the monitoring backend
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What the connection should do in response to a packet
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Write a frame to the socket
    Send(String),
    /// Hand an event to the bridge
    Deliver(InboundEvent),
}

/// Answer to the `login` emit
#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(rename = "tokenRequired", default)]
    token_required: bool,
    #[serde(default)]
    msg: Option<String>,
}

/// Protocol state of one feed connection
///
/// Pure state machine: it turns decoded packets into frames to send and
/// events to deliver, so the handshake can be exercised without a socket.
#[derive(Debug)]
pub struct Session {
    credentials: Credentials,
    next_ack_id: u64,
    login_ack_id: Option<u64>,
    token: Option<String>,
}

impl Session {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            next_ack_id: 0,
            login_ack_id: None,
            token: None,
        }
    }

    /// Session token handed out by a successful login
    #[cfg(test)]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    /// React to one packet from the server
    ///
    /// Authentication failures and server-side closes end the session with
    /// an error; malformed feed events are logged and skipped.
    pub fn on_packet(&mut self, packet: EnginePacket) -> Result<Vec<SessionAction>, TransportError> {
        match packet {
            EnginePacket::Open(handshake) => {
                debug!(
                    target: "kuma",
                    "Engine session {} opened (ping every {}ms)", handshake.sid, handshake.ping_interval
                );
                Ok(vec![SessionAction::Send(packet::encode_connect())])
            }
            EnginePacket::Ping => Ok(vec![SessionAction::Send(packet::encode_pong())]),
            EnginePacket::Pong | EnginePacket::Noop => Ok(Vec::new()),
            EnginePacket::Close => Err(TransportError::Closed),
            EnginePacket::Message(message) => self.on_message(message),
        }
    }

    fn on_message(&mut self, message: SocketPacket) -> Result<Vec<SessionAction>, TransportError> {
        match message {
            SocketPacket::Connect(_) => {
                let id = self.next_ack_id;
                self.next_ack_id += 1;
                self.login_ack_id = Some(id);

                let login = json!({
                    "username": self.credentials.username,
                    "password": self.credentials.password,
                    "token": Value::Null,
                });
                Ok(vec![
                    SessionAction::Deliver(InboundEvent::Connected),
                    SessionAction::Send(packet::encode_event(Some(id), "login", login)),
                ])
            }
            SocketPacket::ConnectError(reason) => {
                Err(TransportError::Protocol(format!("connection refused: {}", reason)))
            }
            SocketPacket::Disconnect => Err(TransportError::Closed),
            SocketPacket::Ack { id, args } if Some(id) == self.login_ack_id => {
                self.login_ack_id = None;
                self.on_login(args)
            }
            SocketPacket::Ack { id, .. } => {
                debug!(target: "kuma", "Ignoring unexpected ack {}", id);
                Ok(Vec::new())
            }
            SocketPacket::Event { name, args, .. } => match decode_event(&name, &args) {
                Ok(Some(event)) => Ok(vec![SessionAction::Deliver(event)]),
                Ok(None) => Ok(Vec::new()),
                Err(e) => {
                    warn!(target: "kuma", "Dropping malformed {} event: {}", name, e);
                    Ok(Vec::new())
                }
            },
        }
    }

    fn on_login(&mut self, args: Vec<Value>) -> Result<Vec<SessionAction>, TransportError> {
        let response = args
            .into_iter()
            .next()
            .map(LoginResponse::deserialize)
            .transpose()
            .map_err(|e| TransportError::Protocol(format!("invalid login response: {}", e)))?
            .ok_or_else(|| TransportError::Protocol("empty login response".to_string()))?;

        if response.token_required {
            return Err(AuthFailure::TwoFactorRequired.into());
        }
        if !response.ok {
            let message = response
                .msg
                .unwrap_or_else(|| "an error has occurred".to_string());
            return Err(AuthFailure::Rejected(message).into());
        }

        self.token = Some(response.token.unwrap_or_default());
        Ok(vec![SessionAction::Deliver(InboundEvent::LoggedIn)])
    }
}

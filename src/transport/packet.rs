//! Engine.IO v4 / Socket.IO v5 text frame codec
//!
//! Only what the monitor feed uses is supported: text frames, the default
//! namespace, events, acknowledgements and the ping/pong keepalive. Binary
//! attachments are rejected.

use crate::error::TransportError;
use serde::Deserialize;
use serde_json::Value;

/// Handshake sent by the server when the Engine.IO session opens
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(rename = "pingInterval", default)]
    pub ping_interval: u64,
    #[serde(rename = "pingTimeout", default)]
    pub ping_timeout: u64,
}

/// Outer Engine.IO packet
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Noop,
}

/// Socket.IO packet carried in an Engine.IO message
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event {
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        id: u64,
        args: Vec<Value>,
    },
    ConnectError(Value),
}

/// Decode one websocket text frame
pub fn decode(frame: &str) -> Result<EnginePacket, TransportError> {
    let Some(kind) = frame.bytes().next() else {
        return Err(TransportError::Protocol("empty frame".to_string()));
    };
    if !kind.is_ascii_digit() {
        return Err(TransportError::Protocol(format!(
            "unexpected frame '{}'",
            frame
        )));
    }
    let body = &frame[1..];

    match kind {
        b'0' => serde_json::from_str(body)
            .map(EnginePacket::Open)
            .map_err(|e| TransportError::Protocol(format!("invalid open handshake: {}", e))),
        b'1' => Ok(EnginePacket::Close),
        // "2probe" is only used during transport upgrades, treat it as a ping
        b'2' => Ok(EnginePacket::Ping),
        b'3' => Ok(EnginePacket::Pong),
        b'4' => decode_socket(body).map(EnginePacket::Message),
        b'6' => Ok(EnginePacket::Noop),
        other => Err(TransportError::Protocol(format!(
            "unsupported engine packet type {}",
            other as char
        ))),
    }
}

fn decode_socket(body: &str) -> Result<SocketPacket, TransportError> {
    let Some(kind) = body.bytes().next() else {
        return Err(TransportError::Protocol("empty socket packet".to_string()));
    };
    if !kind.is_ascii_digit() {
        return Err(TransportError::Protocol(format!(
            "unexpected socket packet '{}'",
            body
        )));
    }
    let mut rest = &body[1..];

    // Namespace, only present for non-default namespaces: "/admin,"
    if rest.starts_with('/') {
        rest = match rest.find(',') {
            Some(comma) => &rest[comma + 1..],
            None => "",
        };
    }

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let id = if digits > 0 {
        Some(
            rest[..digits]
                .parse::<u64>()
                .map_err(|e| TransportError::Protocol(format!("invalid ack id: {}", e)))?,
        )
    } else {
        None
    };
    rest = &rest[digits..];

    let data = if rest.is_empty() {
        None
    } else {
        Some(
            serde_json::from_str::<Value>(rest)
                .map_err(|e| TransportError::Protocol(format!("invalid payload: {}", e)))?,
        )
    };

    match kind {
        b'0' => Ok(SocketPacket::Connect(data)),
        b'1' => Ok(SocketPacket::Disconnect),
        b'2' => {
            let mut args = into_array(data)?;
            if args.is_empty() {
                return Err(TransportError::Protocol("event without a name".to_string()));
            }
            let name = match args.remove(0) {
                Value::String(name) => name,
                other => {
                    return Err(TransportError::Protocol(format!(
                        "event name is not a string: {}",
                        other
                    )))
                }
            };
            Ok(SocketPacket::Event { id, name, args })
        }
        b'3' => {
            let id = id.ok_or_else(|| TransportError::Protocol("ack without id".to_string()))?;
            Ok(SocketPacket::Ack {
                id,
                args: into_array(data)?,
            })
        }
        b'4' => Ok(SocketPacket::ConnectError(data.unwrap_or(Value::Null))),
        b'5' | b'6' => Err(TransportError::Protocol(
            "binary packets are not supported".to_string(),
        )),
        other => Err(TransportError::Protocol(format!(
            "unsupported socket packet type {}",
            other as char
        ))),
    }
}

fn into_array(data: Option<Value>) -> Result<Vec<Value>, TransportError> {
    match data {
        Some(Value::Array(values)) => Ok(values),
        Some(other) => Err(TransportError::Protocol(format!(
            "expected an array payload, got {}",
            other
        ))),
        None => Ok(Vec::new()),
    }
}

/// Connect to the default namespace
pub fn encode_connect() -> String {
    "40".to_string()
}

/// Reply to a server ping
pub fn encode_pong() -> String {
    "3".to_string()
}

/// Emit an event, optionally asking for an acknowledgement
pub fn encode_event(id: Option<u64>, name: &str, data: Value) -> String {
    let id = id.map(|id| id.to_string()).unwrap_or_default();
    format!("42{}{}", id, Value::Array(vec![Value::from(name), data]))
}

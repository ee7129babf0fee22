use thiserror::Error;

/// Errors raised while decoding or handling an inbound event
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Malformed event: {0}")]
    Malformed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reasons the monitoring backend refused our login
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("two-factor authentication is enabled on this account")]
    TwoFactorRequired,

    #[error("login rejected: {0}")]
    Rejected(String),
}

/// Errors that end the inbound feed connection
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthFailure),

    #[error("Connection closed by server")]
    Closed,

    #[error("Event channel closed")]
    ChannelClosed,
}

/// Errors that can occur when publishing a status to the downstream API
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Status API returned {0}: {1}")]
    Status(u16, String),

    #[error("Request timeout")]
    Timeout,
}

impl From<reqwest::Error> for PublishError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            PublishError::Timeout
        } else {
            PublishError::Http(error.to_string())
        }
    }
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

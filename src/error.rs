//! Error types for the chat relay
//!
//! Transport errors end a single connection. Everything else is recovered
//! locally: delivery errors are logged and skipped, auth errors become
//! `AUTH_RESPONSE` replies, decode errors become an error notice to the sender.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Transport and startup errors
///
/// Fatal to one connection when raised by a handler; only startup errors
/// (`Io` on bind, `Config`) stop the process.
#[derive(Debug, Error)]
pub enum RelayError {
    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// IO error (listener bind)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Message delivery errors
///
/// Occurs when a recipient's outbound queue cannot take another message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The recipient's writer task has gone away
    #[error("Channel closed")]
    ChannelClosed,

    /// The recipient is not draining its queue fast enough
    #[error("Outbound queue full")]
    QueueFull,
}

/// Authentication and registration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Content was not of the form `username:secret`
    #[error("Malformed credentials")]
    MalformedCredentials,

    /// Username is already registered or currently online
    #[error("Username already exists")]
    UsernameExists,

    /// Unknown username or wrong secret
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The store refused the registration
    #[error("Registration rejected: {0}")]
    Rejected(String),
}

/// Errors from routing one inbound frame
#[derive(Debug, Error)]
pub enum RouteError {
    /// The frame is not a valid message envelope
    #[error("Invalid message format: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

//! Crate-level error types
//!
//! Per-message protocol failures are not errors at this level; they are
//! [`Rejection`](crate::protocol::Rejection)s answered on the wire. What ends up
//! here is what can stop a connection worker or the server itself.

use thiserror::Error;

/// Errors that can stop a connection or the server
#[derive(Error, Debug)]
pub enum Error {
    /// Socket or bind failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or framing failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON encoding or decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

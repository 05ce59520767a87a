//! Error types for nats-lite.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum NatsError {
    /// Operation needs an established connection (before connect, after close,
    /// or after the server hung up).
    #[error("Not connected")]
    NotConnected,

    /// A flush failed at the transport. Shared so every writer waiting on the
    /// failed batch receives the same error.
    #[error("Transport write failed: {0}")]
    TransportWrite(Arc<io::Error>),

    /// The TCP connect or the wait for the server greeting failed.
    #[error("Connection setup failed: {0}")]
    ConnectionSetup(#[source] io::Error),

    /// I/O error while reading from the socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON error on the CONNECT options or INFO payload.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using NatsError.
pub type Result<T> = std::result::Result<T, NatsError>;

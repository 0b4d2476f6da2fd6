//! Error handling for the De-Ransom event socket.
//!
//! All fallible operations in this crate return [`Result`]. Errors from the
//! underlying transport and serialization layers convert automatically via
//! `thiserror`. Nothing in this crate panics across the public API boundary:
//! the socket itself contains transport failures internally (logging them and
//! feeding the reconnection procedure), so these errors mostly surface from
//! frame parsing and endpoint derivation.

use thiserror::Error;

/// Result type for event socket operations
pub type Result<T> = std::result::Result<T, SocketError>;

/// Errors that can occur in the event socket layer
#[derive(Error, Debug)]
pub enum SocketError {
    /// I/O error from the underlying network stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket protocol or handshake error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A frame that parsed as JSON but does not form a valid message
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// The push endpoint could not be derived from the given base URL
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

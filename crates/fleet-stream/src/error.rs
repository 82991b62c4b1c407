//! Event-stream transport errors

use thiserror::Error;

/// Transport and framing errors.
///
/// The supervisor never returns these to `connect()` callers; they surface
/// as `connection-failed` events or log lines.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Stream URL is not a ws:// or wss:// URL
    #[error("Invalid stream URL: {0}")]
    InvalidUrl(String),

    /// Frame is not valid JSON for its event
    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] serde_json::Error),

    /// Frame names an event this client does not know
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// Outbound message attempted without an open session
    #[error("Not connected")]
    NotConnected,
}

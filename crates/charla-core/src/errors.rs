//! Protocol error types.
//!
//! Raised at the transport boundary when an inbound frame cannot be turned
//! into a [`ClientEvent`](crate::ClientEvent). These never reach other
//! sessions: the offending frame is logged and dropped.

use thiserror::Error;

/// Errors produced while validating an inbound frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not a JSON `{"event": ..., "data": ...}` envelope.
    #[error("invalid JSON envelope: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// The envelope named an event the relay does not accept.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    /// The envelope's `data` did not have the shape the event requires.
    #[error("invalid payload for {event}: {reason}")]
    InvalidPayload {
        /// Wire event name.
        event: String,
        /// What was wrong with the payload.
        reason: String,
    },
}

impl ProtocolError {
    /// Short machine-readable label, used as a metrics/log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::UnknownEvent(_) => "unknown_event",
            Self::InvalidPayload { .. } => "invalid_payload",
        }
    }
}

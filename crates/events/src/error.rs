//! Error types for the events crate.

use thiserror::Error;

/// Result type alias for event operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Event error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Channel closed.
    #[error("event channel closed")]
    ChannelClosed,

    /// Nothing is queued yet.
    #[error("no event queued")]
    Empty,

    /// Receiver fell behind and missed events.
    #[error("subscriber lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    /// No event with this name exists.
    #[error("unknown event '{name}'")]
    UnknownEvent { name: String },

    /// Payload does not match the event name.
    #[error("invalid payload for '{name}': {reason}")]
    InvalidPayload { name: String, reason: String },
}

impl Error {
    /// Create an unknown event error.
    pub fn unknown_event(name: impl Into<String>) -> Self {
        Self::UnknownEvent { name: name.into() }
    }

    /// Create an invalid payload error.
    pub fn invalid_payload(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

//! Error types for the Event Log

use shared_types::EventType;
use thiserror::Error;

/// Event Log errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventLogError {
    /// Underlying storage rejected the append or read
    #[error("Event log backend error: {reason}")]
    Backend { reason: String },

    /// Payload could not be encoded or a stored record decoded
    #[error("Event serialization error: {reason}")]
    Serialization { reason: String },

    /// Payload is not a JSON object
    #[error("Payload for {event_type} must be an object")]
    PayloadNotObject { event_type: EventType },
}

impl EventLogError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Backend { .. } => "RL_EVENT_APPEND_FAILED",
            Self::Serialization { .. } => "RL_EVENT_CORRUPT",
            Self::PayloadNotObject { .. } => "RL_EVENT_PAYLOAD_INVALID",
        }
    }
}

impl From<serde_json::Error> for EventLogError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            reason: e.to_string(),
        }
    }
}

/// Result type for event log operations
pub type EventLogResult<T> = Result<T, EventLogError>;

//! Error types for the session host and the customer viewer.

use rl_02_snapshot_store::StoreError;
use rl_03_event_log::EventLogError;
use shared_bus::FrameError;
use shared_types::{SessionId, ValidationError};
use thiserror::Error;

/// Host errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The receiptless feature gate is off
    #[error("Receiptless sessions are disabled")]
    FeatureDisabled,

    /// Input rejected before any side effect
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No session with that id or code
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The session actor has stopped
    #[error("Session {0} is closed")]
    SessionClosed(SessionId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    EventLog(#[from] EventLogError),

    #[error(transparent)]
    Channel(#[from] FrameError),
}

impl HostError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FeatureDisabled => "RL_DISABLED",
            Self::Validation(e) => e.code(),
            Self::SessionNotFound(_) => "RL_SESSION_NOT_FOUND",
            Self::SessionClosed(_) => "RL_SESSION_CLOSED",
            Self::Store(e) => e.code(),
            Self::EventLog(e) => e.code(),
            Self::Channel(_) => "RL_CHANNEL_FRAME_INVALID",
        }
    }
}

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;

//! Error types for the Snapshot Store

use shared_types::SessionId;
use thiserror::Error;

/// Snapshot Store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No snapshot exists for the session
    #[error("Snapshot not found for session {session_id}")]
    NotFound { session_id: SessionId },

    /// Underlying storage rejected the operation
    #[error("Snapshot backend error: {reason}")]
    Backend { reason: String },

    /// Stored bytes could not be encoded or decoded
    #[error("Snapshot serialization error: {reason}")]
    Serialization { reason: String },
}

impl StoreError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "RL_SNAPSHOT_NOT_FOUND",
            Self::Backend { .. } => "RL_SNAPSHOT_WRITE_FAILED",
            Self::Serialization { .. } => "RL_SNAPSHOT_CORRUPT",
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            reason: e.to_string(),
        }
    }
}

/// Result type for snapshot store operations
pub type StoreResult<T> = Result<T, StoreError>;

//! What a caller gets back from a session.

use serde::Serialize;
use shared_types::Snapshot;

/// Outcome of one dispatched intent.
///
/// `snapshot` is the state after the intent and any follow-ups it
/// triggered; on rejection it is the untouched current state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentReply {
    pub applied: bool,
    pub status: String,
    pub snapshot: Snapshot,
}

impl IntentReply {
    pub(crate) fn applied(status: impl Into<String>, snapshot: Snapshot) -> Self {
        Self {
            applied: true,
            status: status.into(),
            snapshot,
        }
    }

    pub(crate) fn rejected(status: impl Into<String>, snapshot: Snapshot) -> Self {
        Self {
            applied: false,
            status: status.into(),
            snapshot,
        }
    }
}

/// Write-behind persistence signal of one session.
///
/// The in-memory snapshot always advances; this reports whether storage
/// kept up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionHealth {
    /// The most recent transition reached both the store and the log.
    pub persisted: bool,
    pub failed_snapshot_writes: u64,
    pub failed_event_appends: u64,
    pub last_error: Option<String>,
}

impl SessionHealth {
    /// Healthy state of a freshly created session.
    pub fn healthy() -> Self {
        Self {
            persisted: true,
            ..Self::default()
        }
    }

    /// True if any write was ever lost.
    pub fn is_degraded(&self) -> bool {
        self.failed_snapshot_writes > 0 || self.failed_event_appends > 0
    }
}

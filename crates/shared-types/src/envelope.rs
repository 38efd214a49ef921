//! # Channel Envelope
//!
//! The transient message published on a Session Channel.
//!
//! ## Properties
//!
//! - **Hint, not record**: nothing here is persisted. A lost envelope is
//!   corrected by re-reading the Snapshot Store.
//! - **Typed**: the message body is a closed enum; the wire form
//!   `{ type, session_id, sale_id?, ts, payload }` is produced and parsed only
//!   at the channel boundary (`shared-bus` codec).

use crate::entities::{SaleId, ScanOutcome, SessionId, SessionMode, Snapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelMessageType {
    SessionCreated,
    CustomerJoined,
    CustomerScanned,
    CartUpdated,
    SnapshotSync,
    ResetRequested,
}

impl ChannelMessageType {
    /// Every message type.
    pub const ALL: [ChannelMessageType; 6] = [
        Self::SessionCreated,
        Self::CustomerJoined,
        Self::CustomerScanned,
        Self::CartUpdated,
        Self::SnapshotSync,
        Self::ResetRequested,
    ];

    /// Wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionCreated => "SESSION_CREATED",
            Self::CustomerJoined => "CUSTOMER_JOINED",
            Self::CustomerScanned => "CUSTOMER_SCANNED",
            Self::CartUpdated => "CART_UPDATED",
            Self::SnapshotSync => "SNAPSHOT_SYNC",
            Self::ResetRequested => "RESET_REQUESTED",
        }
    }

    /// Parse a wire name; unknown names yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for ChannelMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed channel message bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    /// A session was created (host → any listener).
    SessionCreated {
        session_code: String,
        mode: SessionMode,
    },
    /// A customer display attached (viewer → host).
    CustomerJoined { viewer_id: String },
    /// A customer display finished a scan (viewer → host).
    CustomerScanned {
        outcome: ScanOutcome,
        token_id: Option<String>,
    },
    /// The cart changed (host → viewers).
    CartUpdated { snapshot: Box<Snapshot> },
    /// Full canonical state (host → viewers).
    SnapshotSync { snapshot: Box<Snapshot> },
    /// The terminal was reset (host → viewers).
    ResetRequested { sale_id: SaleId },
}

impl ChannelMessage {
    /// Message type discriminator.
    #[must_use]
    pub fn message_type(&self) -> ChannelMessageType {
        match self {
            Self::SessionCreated { .. } => ChannelMessageType::SessionCreated,
            Self::CustomerJoined { .. } => ChannelMessageType::CustomerJoined,
            Self::CustomerScanned { .. } => ChannelMessageType::CustomerScanned,
            Self::CartUpdated { .. } => ChannelMessageType::CartUpdated,
            Self::SnapshotSync { .. } => ChannelMessageType::SnapshotSync,
            Self::ResetRequested { .. } => ChannelMessageType::ResetRequested,
        }
    }

    /// Snapshot carried by the message, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::CartUpdated { snapshot } | Self::SnapshotSync { snapshot } => Some(&**snapshot),
            _ => None,
        }
    }
}

/// A channel message plus routing metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEnvelope {
    pub session_id: SessionId,
    pub sale_id: Option<SaleId>,
    /// Unix milliseconds at publish time.
    pub ts: i64,
    pub message: ChannelMessage,
}

impl ChannelEnvelope {
    /// Wrap a message stamped with the current time.
    #[must_use]
    pub fn new(session_id: SessionId, sale_id: Option<SaleId>, message: ChannelMessage) -> Self {
        Self {
            session_id,
            sale_id,
            ts: chrono::Utc::now().timestamp_millis(),
            message,
        }
    }

    /// `SNAPSHOT_SYNC` for the given snapshot.
    #[must_use]
    pub fn snapshot_sync(snapshot: &Snapshot) -> Self {
        Self::new(
            snapshot.session_id,
            Some(snapshot.active_sale_id),
            ChannelMessage::SnapshotSync {
                snapshot: Box::new(snapshot.clone()),
            },
        )
    }

    /// `CART_UPDATED` for the given snapshot.
    #[must_use]
    pub fn cart_updated(snapshot: &Snapshot) -> Self {
        Self::new(
            snapshot.session_id,
            Some(snapshot.active_sale_id),
            ChannelMessage::CartUpdated {
                snapshot: Box::new(snapshot.clone()),
            },
        )
    }

    /// Message type discriminator.
    #[must_use]
    pub fn message_type(&self) -> ChannelMessageType {
        self.message.message_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_names() {
        for t in ChannelMessageType::ALL {
            assert_eq!(ChannelMessageType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ChannelMessageType::parse("PRESENCE"), None);
    }

    #[test]
    fn test_snapshot_accessor() {
        let joined = ChannelMessage::CustomerJoined {
            viewer_id: "v1".to_string(),
        };
        assert!(joined.snapshot().is_none());
        assert_eq!(joined.message_type(), ChannelMessageType::CustomerJoined);
    }
}

//! # Frame Codec
//!
//! The only place where channel messages exist as untyped JSON.
//!
//! ## Wire Form
//!
//! ```json
//! { "type": "SNAPSHOT_SYNC", "session_id": "…", "sale_id": "…", "ts": 1700000000000,
//!   "payload": { "snapshot": { … } } }
//! ```
//!
//! | Type | Payload |
//! |------|---------|
//! | `SESSION_CREATED` | `{ session_code, mode }` |
//! | `CUSTOMER_JOINED` | `{ viewer_id }` |
//! | `CUSTOMER_SCANNED` | `{ outcome, token_id? }` |
//! | `CART_UPDATED` | `{ snapshot }` |
//! | `SNAPSHOT_SYNC` | `{ snapshot }` |
//! | `RESET_REQUESTED` | `{ sale_id }` |
//!
//! [`decode_frame`] either yields a fully typed [`ChannelEnvelope`] or a
//! [`FrameError`] saying why the frame must be dropped.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{
    ChannelEnvelope, ChannelMessage, ChannelMessageType, SaleId, ScanOutcome, SessionId,
    SessionMode, Snapshot,
};
use std::sync::Arc;
use thiserror::Error;

/// Why a frame could not be turned into a typed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Not a JSON object with the envelope fields.
    #[error("Malformed frame: {0}")]
    Malformed(String),

    /// `type` is not in the message vocabulary.
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    /// `session_id` or `sale_id` is not a valid id.
    #[error("Invalid identifier in field {0}")]
    InvalidId(&'static str),

    /// Payload does not match the shape required by its type.
    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload {
        /// Message type whose payload failed
        kind: ChannelMessageType,
        /// Decoder message
        reason: String,
    },

    /// Frame belongs to a different session than the topic.
    #[error("Frame for session {found} on topic {expected}")]
    WrongSession {
        /// Topic session
        expected: SessionId,
        /// Session named in the frame
        found: SessionId,
    },

    /// Encoding failed on the publishing side.
    #[error("Encode failed: {0}")]
    Encode(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sale_id: Option<String>,
    ts: i64,
    #[serde(default)]
    payload: Value,
}

#[derive(Serialize, Deserialize)]
struct SessionCreatedBody {
    session_code: String,
    mode: SessionMode,
}

#[derive(Serialize, Deserialize)]
struct CustomerJoinedBody {
    viewer_id: String,
}

#[derive(Serialize, Deserialize)]
struct CustomerScannedBody {
    outcome: ScanOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotBody {
    snapshot: Snapshot,
}

#[derive(Serialize)]
struct SnapshotBodyRef<'a> {
    snapshot: &'a Snapshot,
}

#[derive(Serialize, Deserialize)]
struct ResetBody {
    sale_id: SaleId,
}

fn to_value<T: Serialize>(body: &T) -> Result<Value, FrameError> {
    serde_json::to_value(body).map_err(|e| FrameError::Encode(e.to_string()))
}

fn payload_of(message: &ChannelMessage) -> Result<Value, FrameError> {
    match message {
        ChannelMessage::SessionCreated { session_code, mode } => to_value(&SessionCreatedBody {
            session_code: session_code.clone(),
            mode: *mode,
        }),
        ChannelMessage::CustomerJoined { viewer_id } => to_value(&CustomerJoinedBody {
            viewer_id: viewer_id.clone(),
        }),
        ChannelMessage::CustomerScanned { outcome, token_id } => to_value(&CustomerScannedBody {
            outcome: *outcome,
            token_id: token_id.clone(),
        }),
        ChannelMessage::CartUpdated { snapshot } | ChannelMessage::SnapshotSync { snapshot } => {
            to_value(&SnapshotBodyRef { snapshot })
        }
        ChannelMessage::ResetRequested { sale_id } => to_value(&ResetBody { sale_id: *sale_id }),
    }
}

/// Encode an envelope into a wire frame.
pub fn encode_frame(envelope: &ChannelEnvelope) -> Result<Arc<str>, FrameError> {
    let frame = RawFrame {
        kind: envelope.message_type().as_str().to_string(),
        session_id: envelope.session_id.to_string(),
        sale_id: envelope.sale_id.map(|id| id.to_string()),
        ts: envelope.ts,
        payload: payload_of(&envelope.message)?,
    };
    serde_json::to_string(&frame)
        .map(Arc::from)
        .map_err(|e| FrameError::Encode(e.to_string()))
}

fn body<T: DeserializeOwned>(kind: ChannelMessageType, payload: Value) -> Result<T, FrameError> {
    serde_json::from_value(payload).map_err(|e| FrameError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}

/// Decode a wire frame into a typed envelope.
pub fn decode_frame(frame: &str) -> Result<ChannelEnvelope, FrameError> {
    let raw: RawFrame =
        serde_json::from_str(frame).map_err(|e| FrameError::Malformed(e.to_string()))?;

    let kind =
        ChannelMessageType::parse(&raw.kind).ok_or_else(|| FrameError::UnknownType(raw.kind))?;
    let session_id = SessionId::parse(&raw.session_id).map_err(|_| FrameError::InvalidId("session_id"))?;
    let sale_id = match raw.sale_id.as_deref() {
        Some(value) => {
            Some(SaleId::parse(value).map_err(|_| FrameError::InvalidId("sale_id"))?)
        }
        None => None,
    };

    let message = match kind {
        ChannelMessageType::SessionCreated => {
            let b: SessionCreatedBody = body(kind, raw.payload)?;
            ChannelMessage::SessionCreated {
                session_code: b.session_code,
                mode: b.mode,
            }
        }
        ChannelMessageType::CustomerJoined => {
            let b: CustomerJoinedBody = body(kind, raw.payload)?;
            ChannelMessage::CustomerJoined {
                viewer_id: b.viewer_id,
            }
        }
        ChannelMessageType::CustomerScanned => {
            let b: CustomerScannedBody = body(kind, raw.payload)?;
            ChannelMessage::CustomerScanned {
                outcome: b.outcome,
                token_id: b.token_id,
            }
        }
        ChannelMessageType::CartUpdated => {
            let b: SnapshotBody = body(kind, raw.payload)?;
            ChannelMessage::CartUpdated {
                snapshot: Box::new(b.snapshot),
            }
        }
        ChannelMessageType::SnapshotSync => {
            let b: SnapshotBody = body(kind, raw.payload)?;
            ChannelMessage::SnapshotSync {
                snapshot: Box::new(b.snapshot),
            }
        }
        ChannelMessageType::ResetRequested => {
            let b: ResetBody = body(kind, raw.payload)?;
            ChannelMessage::ResetRequested { sale_id: b.sale_id }
        }
    };

    Ok(ChannelEnvelope {
        session_id,
        sale_id,
        ts: raw.ts,
        message,
    })
}

/// Decode a frame received on `topic`, rejecting frames addressed elsewhere.
pub fn decode_for_topic(topic: SessionId, frame: &str) -> Result<ChannelEnvelope, FrameError> {
    let envelope = decode_frame(frame)?;
    if envelope.session_id != topic {
        return Err(FrameError::WrongSession {
            expected: topic,
            found: envelope.session_id,
        });
    }
    Ok(envelope)
}

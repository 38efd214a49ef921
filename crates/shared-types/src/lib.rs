//! # Shared Types Crate
//!
//! This crate contains the session data model, the audit event vocabulary
//! and the channel envelope used by every other crate in the workspace.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the `Snapshot` and its sub-states are
//!   defined once, here.
//! - **Whole-Document Writes**: a `Snapshot` is always replaced, never patched.
//! - **Typed Payloads**: events and channel messages are closed enums; untyped
//!   JSON exists only at storage and wire boundaries.
//! - **Exact Money**: amounts are integer cents, rounded half-up at every step.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod money;

pub use entities::*;
pub use envelope::{ChannelEnvelope, ChannelMessage, ChannelMessageType};
pub use errors::*;
pub use events::{sanitize_payload, Event, EventId, EventPayload, EventType};
pub use money::{round2, round_half_up, Money};

//! # Event Log (rl-03)
//!
//! Durable, append-only, per-session ordered list of audit records.
//!
//! ## Contract
//!
//! | Operation | Result |
//! |-----------|--------|
//! | `append(session_id, payload)` | stored `Event` with log-assigned `id`, `created_at` |
//! | `list(session_id, limit)` | events in insertion order |
//! | `watch(session_id)` | live appends from now on |
//!
//! ## Invariants
//!
//! - Events are never updated or deleted.
//! - `created_at` is non-decreasing within a session in insertion order.
//! - `null` payload values are stripped, not rejected.
//! - Consumers merging `list` and `watch` use [`EventFeed`] to count each
//!   `id` once.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;

pub use adapters::{AppendNotifier, FlakyEventLog, InMemoryEventLog};
pub use domain::{EventFeed, LiveFeed};
pub use error::{EventLogError, EventLogResult};
pub use ports::EventLog;

/// Helpers for adapters living outside this crate.
pub mod support {
    pub use crate::adapters::memory::{monotonic_timestamp, prepare_payload};
}

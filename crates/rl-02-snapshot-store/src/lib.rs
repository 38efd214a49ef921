//! # Snapshot Store (rl-02)
//!
//! Durable key-value record of the single canonical `Snapshot` per session.
//!
//! ## Contract
//!
//! | Operation | Result |
//! |-----------|--------|
//! | `get(session_id)` | `Snapshot` or `StoreError::NotFound` |
//! | `put(snapshot)` | `Ok` or a persistence error |
//!
//! Writes replace the whole document. A failed `put` is reported to the
//! caller and nothing else: the host keeps its in-memory snapshot and
//! carries on publishing it.
//!
//! ## Crate Structure
//!
//! - `ports/` - The `SnapshotStore` trait
//! - `adapters/` - In-memory store and a fault-injecting wrapper

pub mod adapters;
pub mod error;
pub mod ports;

pub use adapters::{FlakySnapshotStore, InMemorySnapshotStore};
pub use error::{StoreError, StoreResult};
pub use ports::SnapshotStore;

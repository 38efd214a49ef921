//! Snapshot Store adapters

pub mod memory;

pub use memory::{FlakySnapshotStore, InMemorySnapshotStore};

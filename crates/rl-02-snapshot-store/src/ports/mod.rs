//! Ports for the Snapshot Store

pub mod outbound;

pub use outbound::SnapshotStore;

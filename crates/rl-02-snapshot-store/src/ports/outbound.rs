//! Driven Ports (SPI - Outbound Dependencies)
//!
//! The host writes through this port; viewers only read.

use crate::error::StoreResult;
use async_trait::async_trait;
use shared_types::{SessionId, Snapshot};

/// Durable key-value record holding one Snapshot per session.
///
/// Production: `RocksDbSnapshotStore` (pos-runtime/adapters/storage, `rocksdb` feature)
/// Testing: `InMemorySnapshotStore`
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the current snapshot, or `StoreError::NotFound`.
    async fn get(&self, session_id: SessionId) -> StoreResult<Snapshot>;

    /// Replace the snapshot wholesale.
    async fn put(&self, snapshot: &Snapshot) -> StoreResult<()>;
}

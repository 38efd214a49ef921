//! In-memory Snapshot Store adapters.
//!
//! Snapshots are stored as encoded JSON so a round trip exercises the same
//! serialization as the durable adapter.

use crate::error::{StoreError, StoreResult};
use crate::ports::SnapshotStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{SessionId, Snapshot};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot store backed by a `HashMap`.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<SessionId, Vec<u8>>>,
}

impl InMemorySnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn get(&self, session_id: SessionId) -> StoreResult<Snapshot> {
        let guard = self.snapshots.read();
        let bytes = guard
            .get(&session_id)
            .ok_or(StoreError::NotFound { session_id })?;
        Ok(serde_json::from_slice(bytes)?)
    }

    async fn put(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.snapshots.write().insert(snapshot.session_id, bytes);
        Ok(())
    }
}

/// Wrapper whose writes can be switched to fail.
///
/// Used to exercise write-behind degradation without a real outage.
pub struct FlakySnapshotStore<S> {
    inner: S,
    failing: AtomicBool,
    failed_writes: AtomicU64,
}

impl<S: SnapshotStore> FlakySnapshotStore<S> {
    /// Wrap a store; writes succeed until [`Self::fail_writes`] is called.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            failed_writes: AtomicU64::new(0),
        }
    }

    /// Switch write failures on or off.
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Writes rejected so far.
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::SeqCst)
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: SnapshotStore> SnapshotStore for FlakySnapshotStore<S> {
    async fn get(&self, session_id: SessionId) -> StoreResult<Snapshot> {
        self.inner.get(session_id).await
    }

    async fn put(&self, snapshot: &Snapshot) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            self.failed_writes.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Backend {
                reason: "injected write failure".to_string(),
            });
        }
        self.inner.put(snapshot).await
    }
}

#[async_trait]
impl<S: SnapshotStore + ?Sized> SnapshotStore for Arc<S> {
    async fn get(&self, session_id: SessionId) -> StoreResult<Snapshot> {
        (**self).get(session_id).await
    }

    async fn put(&self, snapshot: &Snapshot) -> StoreResult<()> {
        (**self).put(snapshot).await
    }
}

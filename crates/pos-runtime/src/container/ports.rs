//! Shared ports handed to every session actor and viewer.

use rl_02_snapshot_store::{InMemorySnapshotStore, SnapshotStore};
use rl_03_event_log::{EventLog, InMemoryEventLog};
use rl_04_receipt_gateway::ReceiptIssuer;
use shared_bus::{InMemorySessionChannel, SessionChannel};
use std::sync::Arc;

/// The collaborators of a session host.
#[derive(Clone)]
pub struct HostPorts {
    pub store: Arc<dyn SnapshotStore>,
    pub log: Arc<dyn EventLog>,
    pub channel: Arc<dyn SessionChannel>,
    pub issuer: Arc<dyn ReceiptIssuer>,
}

impl HostPorts {
    /// In-memory store, log and channel around the given issuer.
    pub fn in_memory(issuer: Arc<dyn ReceiptIssuer>, channel_capacity: usize) -> Self {
        Self {
            store: Arc::new(InMemorySnapshotStore::new()),
            log: Arc::new(InMemoryEventLog::new()),
            channel: Arc::new(InMemorySessionChannel::with_capacity(channel_capacity)),
            issuer,
        }
    }

    /// Replace the snapshot store.
    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = store;
        self
    }

    /// Replace the event log.
    pub fn with_log(mut self, log: Arc<dyn EventLog>) -> Self {
        self.log = log;
        self
    }
}

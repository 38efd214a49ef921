//! Driven Ports (SPI - Outbound Dependencies)

use crate::error::EventLogResult;
use async_trait::async_trait;
use serde_json::Value;
use shared_types::{Event, EventPayload, EventType, SessionId};
use tokio::sync::broadcast;

/// Durable, append-only, per-session ordered list of audit records.
///
/// Production: `RocksDbEventLog` (pos-runtime/adapters/storage, `rocksdb` feature)
/// Testing: `InMemoryEventLog`
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append a payload body under `event_type`.
    ///
    /// `null` values in the body are dropped before the write. The log
    /// assigns `id` and `created_at`.
    async fn append_raw(
        &self,
        session_id: SessionId,
        event_type: EventType,
        payload: Value,
    ) -> EventLogResult<Event>;

    /// Events of a session in insertion order, at most `limit` of them.
    async fn list(&self, session_id: SessionId, limit: Option<usize>)
        -> EventLogResult<Vec<Event>>;

    /// Live feed of events appended to a session from now on.
    fn watch(&self, session_id: SessionId) -> broadcast::Receiver<Event>;

    /// Append a typed payload.
    async fn append(&self, session_id: SessionId, payload: &EventPayload) -> EventLogResult<Event> {
        let body = payload.to_body()?;
        self.append_raw(session_id, payload.event_type(), body).await
    }
}

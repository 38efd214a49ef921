//! In-memory Event Log adapters.

use crate::adapters::notify::AppendNotifier;
use crate::error::{EventLogError, EventLogResult};
use crate::ports::EventLog;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use shared_types::{sanitize_payload, Event, EventId, EventType, SessionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Source of `created_at` timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Default)]
struct LogState {
    next_id: u64,
    sessions: HashMap<SessionId, Vec<Event>>,
}

/// Validate and sanitize an append body.
pub fn prepare_payload(event_type: EventType, payload: Value) -> EventLogResult<Value> {
    if !payload.is_object() {
        return Err(EventLogError::PayloadNotObject { event_type });
    }
    Ok(sanitize_payload(payload))
}

/// Never earlier than the last event of the same session.
pub fn monotonic_timestamp(
    now: DateTime<Utc>,
    last: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    match last {
        Some(last) if last > now => last,
        _ => now,
    }
}

/// Event log held in process memory.
pub struct InMemoryEventLog {
    state: RwLock<LogState>,
    notifier: AppendNotifier,
    clock: Clock,
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventLog {
    /// Create an empty log using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    /// Create an empty log with a custom clock.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            state: RwLock::new(LogState {
                next_id: 1,
                sessions: HashMap::new(),
            }),
            notifier: AppendNotifier::new(),
            clock,
        }
    }

    /// Total events across all sessions.
    pub fn total_events(&self) -> usize {
        self.state.read().sessions.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append_raw(
        &self,
        session_id: SessionId,
        event_type: EventType,
        payload: Value,
    ) -> EventLogResult<Event> {
        let payload = prepare_payload(event_type, payload)?;
        let event = {
            let mut state = self.state.write();
            let id = EventId(state.next_id);
            state.next_id += 1;
            let events = state.sessions.entry(session_id).or_default();
            let created_at = monotonic_timestamp((self.clock)(), events.last().map(|e| e.created_at));
            let event = Event {
                id,
                session_id,
                event_type,
                payload,
                created_at,
            };
            events.push(event.clone());
            event
        };
        trace!(session_id = %session_id, event_id = %event.id, event_type = %event_type, "Event appended");
        self.notifier.notify(&event);
        Ok(event)
    }

    async fn list(
        &self,
        session_id: SessionId,
        limit: Option<usize>,
    ) -> EventLogResult<Vec<Event>> {
        let state = self.state.read();
        let events = state.sessions.get(&session_id).map_or(&[][..], Vec::as_slice);
        let take = limit.unwrap_or(events.len());
        Ok(events.iter().take(take).cloned().collect())
    }

    fn watch(&self, session_id: SessionId) -> broadcast::Receiver<Event> {
        self.notifier.watch(session_id)
    }
}

/// Wrapper whose appends can be switched to fail.
pub struct FlakyEventLog<L> {
    inner: L,
    failing: AtomicBool,
    failed_appends: AtomicU64,
}

impl<L: EventLog> FlakyEventLog<L> {
    /// Wrap a log; appends succeed until [`Self::fail_appends`] is called.
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            failed_appends: AtomicU64::new(0),
        }
    }

    /// Switch append failures on or off.
    pub fn fail_appends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Appends rejected so far.
    pub fn failed_appends(&self) -> u64 {
        self.failed_appends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<L: EventLog> EventLog for FlakyEventLog<L> {
    async fn append_raw(
        &self,
        session_id: SessionId,
        event_type: EventType,
        payload: Value,
    ) -> EventLogResult<Event> {
        if self.failing.load(Ordering::SeqCst) {
            self.failed_appends.fetch_add(1, Ordering::SeqCst);
            return Err(EventLogError::Backend {
                reason: "injected append failure".to_string(),
            });
        }
        self.inner.append_raw(session_id, event_type, payload).await
    }

    async fn list(
        &self,
        session_id: SessionId,
        limit: Option<usize>,
    ) -> EventLogResult<Vec<Event>> {
        self.inner.list(session_id, limit).await
    }

    fn watch(&self, session_id: SessionId) -> broadcast::Receiver<Event> {
        self.inner.watch(session_id)
    }
}

#[async_trait]
impl<L: EventLog + ?Sized> EventLog for Arc<L> {
    async fn append_raw(
        &self,
        session_id: SessionId,
        event_type: EventType,
        payload: Value,
    ) -> EventLogResult<Event> {
        (**self).append_raw(session_id, event_type, payload).await
    }

    async fn list(
        &self,
        session_id: SessionId,
        limit: Option<usize>,
    ) -> EventLogResult<Vec<Event>> {
        (**self).list(session_id, limit).await
    }

    fn watch(&self, session_id: SessionId) -> broadcast::Receiver<Event> {
        (**self).watch(session_id)
    }
}

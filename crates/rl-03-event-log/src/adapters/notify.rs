//! Per-session broadcast of freshly appended events.
//!
//! Shared by every adapter so `watch` behaves the same regardless of the
//! backing store.

use parking_lot::Mutex;
use shared_types::{Event, SessionId};
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Buffered appends per watcher before it lags.
pub const WATCH_CAPACITY: usize = 256;

/// Fan-out of appended events keyed by session.
#[derive(Default)]
pub struct AppendNotifier {
    senders: Mutex<HashMap<SessionId, broadcast::Sender<Event>>>,
}

impl AppendNotifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to appends for a session.
    pub fn watch(&self, session_id: SessionId) -> broadcast::Receiver<Event> {
        self.senders
            .lock()
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(WATCH_CAPACITY).0)
            .subscribe()
    }

    /// Announce an append. Senders without receivers are pruned.
    pub fn notify(&self, event: &Event) {
        let mut senders = self.senders.lock();
        let Some(sender) = senders.get(&event.session_id) else {
            return;
        };
        if sender.send(event.clone()).is_err() {
            senders.remove(&event.session_id);
        }
    }
}

//! # Event Feed
//!
//! A consumer's merged view of history reads and live appends.
//!
//! An event can arrive twice: once in a `list` read and once through
//! `watch` if it was appended while the read was in flight. The feed keeps
//! exactly one record per `id`, ordered by `id`.

use crate::error::EventLogResult;
use crate::ports::EventLog;
use shared_types::{Event, EventId, SessionId};
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::debug;

/// De-duplicated, id-ordered list of events.
#[derive(Debug, Default, Clone)]
pub struct EventFeed {
    seen: HashSet<EventId>,
    events: Vec<Event>,
}

impl EventFeed {
    /// Empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event unless its id was already seen. Returns true if added.
    pub fn absorb(&mut self, event: Event) -> bool {
        if !self.seen.insert(event.id) {
            return false;
        }
        let at = self.events.partition_point(|e| e.id < event.id);
        self.events.insert(at, event);
        true
    }

    /// Add many events; returns how many were new.
    pub fn absorb_all(&mut self, events: impl IntoIterator<Item = Event>) -> usize {
        let mut added = 0;
        for event in events {
            if self.absorb(event) {
                added += 1;
            }
        }
        added
    }

    /// Events in id order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of distinct events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// An [`EventFeed`] kept current from a live watch.
pub struct LiveFeed {
    session_id: SessionId,
    feed: EventFeed,
    receiver: broadcast::Receiver<Event>,
    lagged: bool,
}

impl LiveFeed {
    /// Watch first, then read history, so nothing appended in between is missed.
    pub async fn open<L: EventLog + ?Sized>(
        log: &L,
        session_id: SessionId,
        limit: Option<usize>,
    ) -> EventLogResult<Self> {
        let receiver = log.watch(session_id);
        let mut feed = EventFeed::new();
        feed.absorb_all(log.list(session_id, limit).await?);
        Ok(Self {
            session_id,
            feed,
            receiver,
            lagged: false,
        })
    }

    /// Wait for the next event not already in the feed.
    ///
    /// Returns `None` once the log stops announcing appends. Events skipped
    /// by a lag are only recovered by [`LiveFeed::catch_up`].
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.feed.absorb(event.clone()) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(session_id = %self.session_id, lagged = count, "Event feed lagged");
                    self.lagged = true;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Absorb everything already announced without waiting.
    ///
    /// Announcements dropped by a lag are not recovered here; check
    /// [`LiveFeed::lagged`] or use [`LiveFeed::catch_up`].
    pub fn drain(&mut self) -> usize {
        let mut added = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.feed.absorb(event) {
                        added += 1;
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    debug!(session_id = %self.session_id, lagged = count, "Event feed lagged");
                    self.lagged = true;
                }
                Err(_) => return added,
            }
        }
    }

    /// Re-read history, e.g. after the watch lagged.
    pub async fn resync<L: EventLog + ?Sized>(&mut self, log: &L) -> EventLogResult<usize> {
        let added = self.feed.absorb_all(log.list(self.session_id, None).await?);
        self.lagged = false;
        Ok(added)
    }

    /// True when announcements were dropped since the last resync.
    pub fn lagged(&self) -> bool {
        self.lagged
    }

    /// Drain, then re-read history if the watch lagged.
    ///
    /// Returns how many events were new.
    pub async fn catch_up<L: EventLog + ?Sized>(&mut self, log: &L) -> EventLogResult<usize> {
        let mut added = self.drain();
        if self.lagged {
            added += self.resync(log).await?;
        }
        Ok(added)
    }

    /// Current merged view.
    pub fn feed(&self) -> &EventFeed {
        &self.feed
    }
}

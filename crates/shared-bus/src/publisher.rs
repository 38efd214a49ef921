//! # Channel Publisher
//!
//! Defines the publishing side of the session channel.

use crate::codec::{encode_frame, FrameError};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{ChannelEnvelope, SessionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Per-session broadcast senders.
pub(crate) type Topics = Arc<RwLock<HashMap<SessionId, broadcast::Sender<Arc<str>>>>>;

/// Counters shared between the channel and its subscriptions.
#[derive(Debug, Default)]
pub struct ChannelStats {
    published: AtomicU64,
    dropped: AtomicU64,
    lagged: AtomicU64,
}

impl ChannelStats {
    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lagged(&self, count: u64) {
        self.lagged.fetch_add(count, Ordering::Relaxed);
    }

    /// Frames published.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Frames rejected by the codec on the receiving side.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Frames a slow subscriber never saw.
    pub fn lagged(&self) -> u64 {
        self.lagged.load(Ordering::Relaxed)
    }
}

/// Publish/subscribe contract of a session channel.
///
/// Delivery is best effort and self-inclusive: a subscriber on the
/// publishing side also receives what it publishes.
#[async_trait]
pub trait SessionChannel: Send + Sync {
    /// Publish an envelope on its session topic.
    ///
    /// # Returns
    ///
    /// The number of live subscriptions the frame was handed to.
    async fn publish(&self, envelope: ChannelEnvelope) -> Result<usize, FrameError>;

    /// Subscribe to one session topic.
    fn subscribe(&self, session_id: SessionId) -> Subscription;

    /// Get the total number of frames published.
    fn messages_published(&self) -> u64;

    /// Get the total number of frames dropped by subscribers.
    fn frames_dropped(&self) -> u64;
}

/// In-memory session channel.
///
/// One `tokio::sync::broadcast` topic per session, created on first
/// subscription and removed with its last subscriber.
pub struct InMemorySessionChannel {
    topics: Topics,
    stats: Arc<ChannelStats>,
    capacity: usize,
}

impl InMemorySessionChannel {
    /// Create a channel with default per-topic capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a channel with the given per-topic capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(ChannelStats::default()),
            capacity: capacity.max(1),
        }
    }

    /// Publish a pre-encoded frame as-is.
    ///
    /// Frames from foreign publishers take this path; the codec on each
    /// subscription decides whether they are usable.
    pub fn publish_frame(&self, session_id: SessionId, frame: Arc<str>) -> usize {
        self.stats.published.fetch_add(1, Ordering::Relaxed);
        let sender = self.topics.read().get(&session_id).cloned();
        match sender.map(|s| s.send(frame)) {
            Some(Ok(receivers)) => receivers,
            _ => {
                debug!(session_id = %session_id, "Frame published with no subscribers");
                0
            }
        }
    }

    /// Live subscriptions on a session topic.
    #[must_use]
    pub fn subscriber_count(&self, session_id: SessionId) -> usize {
        self.topics
            .read()
            .get(&session_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Number of sessions with at least one subscriber.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }

    /// Get the per-topic capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shared counters.
    #[must_use]
    pub fn stats(&self) -> Arc<ChannelStats> {
        self.stats.clone()
    }
}

impl Default for InMemorySessionChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionChannel for InMemorySessionChannel {
    async fn publish(&self, envelope: ChannelEnvelope) -> Result<usize, FrameError> {
        let frame = encode_frame(&envelope)?;
        let receivers = self.publish_frame(envelope.session_id, frame);
        debug!(
            session_id = %envelope.session_id,
            message_type = %envelope.message_type(),
            receivers,
            "Channel message published"
        );
        Ok(receivers)
    }

    fn subscribe(&self, session_id: SessionId) -> Subscription {
        let receiver = {
            let mut topics = self.topics.write();
            topics
                .entry(session_id)
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };
        debug!(session_id = %session_id, "New channel subscription");
        Subscription::new(session_id, receiver, self.topics.clone(), self.stats.clone())
    }

    fn messages_published(&self) -> u64 {
        self.stats.published()
    }

    fn frames_dropped(&self) -> u64 {
        self.stats.dropped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ChannelMessage;

    fn joined(session_id: SessionId) -> ChannelEnvelope {
        ChannelEnvelope::new(
            session_id,
            None,
            ChannelMessage::CustomerJoined {
                viewer_id: "viewer-1".into(),
            },
        )
    }

    #[tokio::test]
    async fn test_publish_no_subscribers() {
        let channel = InMemorySessionChannel::new();
        let receivers = channel.publish(joined(SessionId::new())).await.unwrap();
        assert_eq!(receivers, 0);
        assert_eq!(channel.messages_published(), 1);
    }

    #[tokio::test]
    async fn test_publish_with_subscriber() {
        let channel = InMemorySessionChannel::new();
        let session_id = SessionId::new();
        let _sub = channel.subscribe(session_id);

        let receivers = channel.publish(joined(session_id)).await.unwrap();
        assert_eq!(receivers, 1);
        assert_eq!(channel.subscriber_count(session_id), 1);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let channel = InMemorySessionChannel::new();
        let a = SessionId::new();
        let b = SessionId::new();
        let _sub_a1 = channel.subscribe(a);
        let _sub_a2 = channel.subscribe(a);
        let _sub_b = channel.subscribe(b);

        assert_eq!(channel.publish(joined(a)).await.unwrap(), 2);
        assert_eq!(channel.publish(joined(b)).await.unwrap(), 1);
        assert_eq!(channel.topic_count(), 2);
    }

    #[test]
    fn test_default_channel() {
        let channel = InMemorySessionChannel::default();
        assert_eq!(channel.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(channel.topic_count(), 0);
        assert_eq!(channel.frames_dropped(), 0);
    }
}

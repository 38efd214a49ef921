//! # Channel Subscriber
//!
//! Defines the subscription side of the session channel. Every frame
//! passes through [`decode_for_topic`]; anything it rejects is dropped
//! and counted, never surfaced to the consumer.

use crate::codec::decode_for_topic;
use crate::publisher::{ChannelStats, Topics};
use shared_types::{ChannelEnvelope, SessionId};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The channel was closed.
    #[error("Session channel closed")]
    Closed,
}

/// A subscription handle for one session topic.
///
/// When dropped, the topic is removed if this was its last subscriber.
pub struct Subscription {
    session_id: SessionId,
    receiver: broadcast::Receiver<Arc<str>>,
    topics: Topics,
    stats: Arc<ChannelStats>,
}

impl Subscription {
    pub(crate) fn new(
        session_id: SessionId,
        receiver: broadcast::Receiver<Arc<str>>,
        topics: Topics,
        stats: Arc<ChannelStats>,
    ) -> Self {
        Self {
            session_id,
            receiver,
            topics,
            stats,
        }
    }

    fn route(&self, frame: &str) -> Option<ChannelEnvelope> {
        match decode_for_topic(self.session_id, frame) {
            Ok(envelope) => Some(envelope),
            Err(error) => {
                self.stats.record_dropped();
                debug!(session_id = %self.session_id, %error, "Dropped channel frame");
                None
            }
        }
    }

    /// Receive the next valid envelope.
    ///
    /// # Returns
    ///
    /// - `Some(envelope)` - The next decodable message
    /// - `None` - The topic was closed
    pub async fn recv(&mut self) -> Option<ChannelEnvelope> {
        loop {
            let frame = match self.receiver.recv().await {
                Ok(f) => f,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    self.stats.record_lagged(count);
                    debug!(lagged = count, "Subscriber lagged, some frames dropped");
                    continue;
                }
            };

            if let Some(envelope) = self.route(&frame) {
                return Some(envelope);
            }
        }
    }

    /// Try to receive the next valid envelope without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(envelope))` - A message was available
    /// - `Ok(None)` - Nothing available (would block)
    /// - `Err(SubscriptionError::Closed)` - The topic was closed
    pub fn try_recv(&mut self) -> Result<Option<ChannelEnvelope>, SubscriptionError> {
        loop {
            let frame = match self.receiver.try_recv() {
                Ok(f) => f,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    self.stats.record_lagged(count);
                    continue;
                }
            };

            if let Some(envelope) = self.route(&frame) {
                return Ok(Some(envelope));
            }
        }
    }

    /// Session this subscription listens to.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut topics = self.topics.write();
        // This receiver is still alive here, so "last" means a count of one.
        let last = topics
            .get(&self.session_id)
            .is_some_and(|sender| sender.receiver_count() <= 1);
        if last {
            topics.remove(&self.session_id);
        }
        debug!(session_id = %self.session_id, "Subscription dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::{InMemorySessionChannel, SessionChannel};
    use shared_types::{ChannelMessage, ScanOutcome};
    use std::time::Duration;
    use tokio::time::timeout;

    fn scanned(session_id: SessionId) -> ChannelEnvelope {
        ChannelEnvelope::new(
            session_id,
            None,
            ChannelMessage::CustomerScanned {
                outcome: ScanOutcome::Success,
                token_id: Some("tok_1".into()),
            },
        )
    }

    #[tokio::test]
    async fn test_subscription_recv() {
        let channel = InMemorySessionChannel::new();
        let session_id = SessionId::new();
        let mut sub = channel.subscribe(session_id);

        channel.publish(scanned(session_id)).await.unwrap();

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("envelope");
        assert_eq!(received.session_id, session_id);
        assert_eq!(received.message, scanned(session_id).message);
    }

    #[tokio::test]
    async fn test_publisher_receives_own_message() {
        let channel = InMemorySessionChannel::new();
        let session_id = SessionId::new();
        let mut host = channel.subscribe(session_id);
        let mut viewer = channel.subscribe(session_id);

        channel.publish(scanned(session_id)).await.unwrap();

        assert!(host.try_recv().unwrap().is_some());
        assert!(viewer.try_recv().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_frames_dropped_and_counted() {
        let channel = InMemorySessionChannel::new();
        let session_id = SessionId::new();
        let mut sub = channel.subscribe(session_id);

        channel.publish_frame(session_id, Arc::from("{\"type\":\"PRESENCE\"}"));
        channel.publish_frame(session_id, Arc::from("garbage"));
        channel.publish(scanned(session_id)).await.unwrap();

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("envelope");
        assert!(matches!(
            received.message,
            ChannelMessage::CustomerScanned { .. }
        ));
        assert_eq!(channel.frames_dropped(), 2);
    }

    #[tokio::test]
    async fn test_subscription_drop_cleanup() {
        let channel = InMemorySessionChannel::new();
        let session_id = SessionId::new();

        {
            let _sub1 = channel.subscribe(session_id);
            let _sub2 = channel.subscribe(session_id);
            assert_eq!(channel.subscriber_count(session_id), 2);
        }

        assert_eq!(channel.subscriber_count(session_id), 0);
        assert_eq!(channel.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let channel = InMemorySessionChannel::new();
        let mut sub = channel.subscribe(SessionId::new());
        assert!(matches!(sub.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_lagged_subscriber_continues() {
        let channel = InMemorySessionChannel::with_capacity(2);
        let session_id = SessionId::new();
        let mut sub = channel.subscribe(session_id);

        for _ in 0..5 {
            channel.publish(scanned(session_id)).await.unwrap();
        }

        let mut received = 0;
        while let Ok(Some(_)) = sub.try_recv() {
            received += 1;
        }
        assert_eq!(received, 2);
        assert_eq!(channel.stats().lagged(), 3);
    }
}

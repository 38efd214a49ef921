//! # Shared Bus - Session Channel
//!
//! Ephemeral per-session publish/subscribe used to push low-latency hints
//! between the host of a session and its customer viewers.
//!
//! ## Rules
//!
//! - **Hints only:** nothing published here is durable. The snapshot store
//!   stays authoritative and every consumer resyncs from it on (re)connect.
//! - **Self-inclusive delivery:** a publisher's own subscription receives
//!   its messages too.
//! - **Typed at the boundary:** frames are JSON on the wire and decoded once
//!   by the codec; invalid or unknown frames are dropped and counted.
//!
//! ```text
//! ┌──────────────┐   publish()   ┌──────────────────┐   recv()   ┌──────────────┐
//! │ Session Host │ ────────────▶ │ topic(session_id)│ ─────────▶ │   Viewer(s)  │
//! │              │ ◀──────────── │                  │ ◀───────── │              │
//! └──────────────┘    recv()     └──────────────────┘  publish() └──────────────┘
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod codec;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use codec::{decode_for_topic, decode_frame, encode_frame, FrameError};
pub use publisher::{ChannelStats, InMemorySessionChannel, SessionChannel};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum frames buffered per topic before slow subscribers lag.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 256);
    }
}

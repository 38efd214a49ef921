//! Consumer-side domain logic

pub mod feed;

pub use feed::{EventFeed, LiveFeed};

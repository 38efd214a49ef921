//! Event Log adapters

pub mod memory;
pub mod notify;

pub use memory::{FlakyEventLog, InMemoryEventLog};
pub use notify::AppendNotifier;

//! Ports for the Event Log

pub mod outbound;

pub use outbound::EventLog;

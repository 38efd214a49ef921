//! # Runtime Container
//!
//! Configuration and the wiring of the ports every session actor shares.

pub mod config;
pub mod ports;

pub use config::{ConfigError, RuntimeConfig, StorageConfig};
pub use ports::HostPorts;

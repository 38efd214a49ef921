//! # POS Runtime Library
//!
//! The session host of the receiptless POS demo. The main entry point is the
//! `main.rs` binary; the library is exposed for integration tests.
//!
//! ## Architecture
//!
//! ```text
//! operator intent ──→ SessionHandle ──→ session actor (one per session)
//!                                           │
//!                     ┌─────────────────────┼──────────────────────┐
//!                     ↓                     ↓                      ↓
//!              Snapshot Store          Event Log            Session Channel
//!                                                                  │
//!                                                                  ↓
//!                                                          CustomerViewer(s)
//! ```
//!
//! ## Modules
//!
//! - `container/` - Configuration and shared ports
//! - `host/` - Session arena, actors, replies, health
//! - `viewer.rs` - Customer display mirror
//! - `adapters/` - RocksDB storage (`rocksdb` feature)
//! - `demo.rs` - Scripted end-to-end sale

pub mod adapters;
pub mod container;
pub mod demo;
pub mod host;
pub mod viewer;

pub use container::{ConfigError, HostPorts, RuntimeConfig, StorageConfig};
pub use demo::{run_demo, DemoReport};
pub use host::{
    CreatedSession, HostError, HostResult, IntentReply, SessionHandle, SessionHealth, SessionHost,
};
pub use viewer::CustomerViewer;

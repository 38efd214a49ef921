//! # Production Storage Adapters
//!
//! Durable storage backends using RocksDB.
//!
//! ## Usage
//!
//! Enable the `rocksdb` feature and set `RL_DATA_DIR`:
//!
//! ```toml
//! pos-runtime = { path = "...", features = ["rocksdb"] }
//! ```
//!
//! ## Architecture
//!
//! One database holds both the Snapshot Store and the Event Log, each in its
//! own column family. Without the feature the in-memory adapters of
//! `rl-02-snapshot-store` and `rl-03-event-log` are used.

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{
    RocksDbConfig, RocksDbStorage, CF_EVENTS, CF_METADATA, CF_SNAPSHOTS, COLUMN_FAMILIES,
};

//! # RocksDB Storage Adapter
//!
//! RocksDB implementation of the `SnapshotStore` and `EventLog` ports.
//!
//! ## Features
//!
//! - Atomic batch writes (WriteBatch) for event + sequence updates
//! - Column families for store/log isolation
//! - Snappy compression
//! - Bloom filters for read optimization
//!
//! ## Column Families
//!
//! - `snapshots` - session id (16 bytes) → snapshot JSON
//! - `events` - session id (16 bytes) ++ event id (u64 BE) → event JSON
//! - `metadata` - event id sequence, last `created_at` per session
//!
//! Big-endian ids keep a session's events in insertion order under a
//! forward prefix scan.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rl_02_snapshot_store::{SnapshotStore, StoreError, StoreResult};
use rl_03_event_log::support::{monotonic_timestamp, prepare_payload};
use rl_03_event_log::{AppendNotifier, EventLog, EventLogError, EventLogResult};
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamily, ColumnFamilyDescriptor, DBCompressionType, Direction,
    IteratorMode, Options, WriteBatch, WriteOptions, DB,
};
use serde_json::Value;
use shared_types::{Event, EventId, EventType, SessionId, Snapshot};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Column family names
pub const CF_SNAPSHOTS: &str = "snapshots";
pub const CF_EVENTS: &str = "events";
pub const CF_METADATA: &str = "metadata";

/// All column families used by the runtime
pub const COLUMN_FAMILIES: &[&str] = &[CF_SNAPSHOTS, CF_EVENTS, CF_METADATA];

/// Next event id.
const SEQUENCE_KEY: &[u8] = b"seq";
/// Prefix of the per-session last `created_at`.
const LAST_TS_PREFIX: &[u8] = b"last:";

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: PathBuf,
    /// Block cache size in bytes (default: 32MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// Maximum number of write buffers (default: 3)
    pub max_write_buffer_number: i32,
    /// Enable fsync after each write (default: true for durability)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/rocksdb"),
            block_cache_size: 32 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            max_write_buffer_number: 3,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Config for the given directory with default tuning.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create config for testing (smaller buffers, no sync)
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 4 * 1024 * 1024,
            write_buffer_size: 1024 * 1024,
            max_write_buffer_number: 2,
            sync_writes: false,
        }
    }
}

/// Snapshot store and event log in one RocksDB database.
pub struct RocksDbStorage {
    db: DB,
    config: RocksDbConfig,
    /// Serializes id allocation and the batch that consumes it.
    append_lock: Mutex<()>,
    notifier: AppendNotifier,
}

impl RocksDbStorage {
    /// Open or create the database.
    pub fn open(config: RocksDbConfig) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_compression_type(DBCompressionType::Snappy);

        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors).map_err(|e| {
            StoreError::Backend {
                reason: format!("Failed to open RocksDB: {}", e),
            }
        })?;
        debug!(path = %config.path.display(), "RocksDB storage opened");

        Ok(Self {
            db,
            config,
            append_lock: Mutex::new(()),
            notifier: AppendNotifier::new(),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily, String> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| format!("missing column family {}", name))
    }

    fn write_options(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }

    fn last_ts_key(session_id: SessionId) -> Vec<u8> {
        let mut key = Vec::with_capacity(LAST_TS_PREFIX.len() + 16);
        key.extend_from_slice(LAST_TS_PREFIX);
        key.extend_from_slice(session_id.0.as_bytes());
        key
    }

    fn event_key(session_id: SessionId, id: EventId) -> Vec<u8> {
        let mut key = Vec::with_capacity(16 + 8);
        key.extend_from_slice(session_id.0.as_bytes());
        key.extend_from_slice(&id.0.to_be_bytes());
        key
    }

    fn next_event_id(&self, meta: &ColumnFamily) -> Result<u64, String> {
        match self.db.get_cf(meta, SEQUENCE_KEY).map_err(|e| e.to_string())? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| "corrupt event sequence".to_string())?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(1),
        }
    }

    fn last_created_at(
        &self,
        meta: &ColumnFamily,
        session_id: SessionId,
    ) -> EventLogResult<Option<DateTime<Utc>>> {
        let stored = self
            .db
            .get_cf(meta, Self::last_ts_key(session_id))
            .map_err(backend)?;
        match stored {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn backend(reason: impl ToString) -> EventLogError {
    EventLogError::Backend {
        reason: reason.to_string(),
    }
}

fn store_backend(reason: impl ToString) -> StoreError {
    StoreError::Backend {
        reason: reason.to_string(),
    }
}

// =============================================================================
// SNAPSHOT STORE
// =============================================================================

#[async_trait]
impl SnapshotStore for RocksDbStorage {
    async fn get(&self, session_id: SessionId) -> StoreResult<Snapshot> {
        let cf = self.cf(CF_SNAPSHOTS).map_err(store_backend)?;
        let bytes = self
            .db
            .get_cf(cf, session_id.0.as_bytes())
            .map_err(store_backend)?
            .ok_or(StoreError::NotFound { session_id })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn put(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let cf = self.cf(CF_SNAPSHOTS).map_err(store_backend)?;
        let bytes = serde_json::to_vec(snapshot)?;
        self.db
            .put_cf_opt(
                cf,
                snapshot.session_id.0.as_bytes(),
                bytes,
                &self.write_options(),
            )
            .map_err(store_backend)?;
        trace!(session_id = %snapshot.session_id, revision = snapshot.revision, "Snapshot stored");
        Ok(())
    }
}

// =============================================================================
// EVENT LOG
// =============================================================================

#[async_trait]
impl EventLog for RocksDbStorage {
    async fn append_raw(
        &self,
        session_id: SessionId,
        event_type: EventType,
        payload: Value,
    ) -> EventLogResult<Event> {
        let payload = prepare_payload(event_type, payload)?;
        let events = self.cf(CF_EVENTS).map_err(backend)?;
        let meta = self.cf(CF_METADATA).map_err(backend)?;

        let event = {
            let _guard = self.append_lock.lock();
            let id = EventId(self.next_event_id(meta).map_err(backend)?);
            let created_at = monotonic_timestamp(Utc::now(), self.last_created_at(meta, session_id)?);
            let event = Event {
                id,
                session_id,
                event_type,
                payload,
                created_at,
            };

            let mut batch = WriteBatch::default();
            batch.put_cf(events, Self::event_key(session_id, id), serde_json::to_vec(&event)?);
            batch.put_cf(meta, SEQUENCE_KEY, (id.0 + 1).to_be_bytes());
            batch.put_cf(
                meta,
                Self::last_ts_key(session_id),
                serde_json::to_vec(&created_at)?,
            );
            self.db
                .write_opt(batch, &self.write_options())
                .map_err(|e| backend(format!("RocksDB batch write failed: {}", e)))?;
            event
        };

        trace!(session_id = %session_id, event_id = %event.id, event_type = %event_type, "Event appended");
        self.notifier.notify(&event);
        Ok(event)
    }

    async fn list(
        &self,
        session_id: SessionId,
        limit: Option<usize>,
    ) -> EventLogResult<Vec<Event>> {
        let cf = self.cf(CF_EVENTS).map_err(backend)?;
        let prefix = session_id.0.as_bytes();
        let limit = limit.unwrap_or(usize::MAX);
        let mut results = Vec::new();

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            if results.len() >= limit {
                break;
            }
            let (key, value) = item.map_err(|e| backend(format!("RocksDB scan failed: {}", e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push(serde_json::from_slice(&value)?);
        }
        Ok(results)
    }

    fn watch(&self, session_id: SessionId) -> broadcast::Receiver<Event> {
        self.notifier.watch(session_id)
    }
}

//! RocksDB handle shared by the stores that keep puffs on disk.
//!
//! Values are stored as JSON.

use crate::error::{PuffError, Result};
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Tuning knobs for a local RocksDB instance.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    pub max_open_files: i32,
    pub keep_log_file_num: usize,
    /// Total WAL size in bytes before a flush is forced.
    pub max_wal_size: u64,
    pub write_buffer_size: usize,
    pub max_write_buffer_number: i32,
    pub target_file_size_base: u64,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            max_open_files: 128,
            keep_log_file_num: 2,
            max_wal_size: 32 * 1024 * 1024,
            write_buffer_size: 32 * 1024 * 1024,
            max_write_buffer_number: 2,
            target_file_size_base: 32 * 1024 * 1024,
        }
    }
}

impl RocksDbConfig {
    /// A small footprint for tests and one-shot CLI runs.
    pub fn compact() -> Self {
        Self {
            max_open_files: 32,
            keep_log_file_num: 1,
            max_wal_size: 4 * 1024 * 1024,
            write_buffer_size: 4 * 1024 * 1024,
            max_write_buffer_number: 2,
            target_file_size_base: 4 * 1024 * 1024,
        }
    }

    pub fn build_options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(self.max_open_files);
        opts.set_keep_log_file_num(self.keep_log_file_num);
        opts.set_max_total_wal_size(self.max_wal_size);
        opts.increase_parallelism(num_cpus::get() as i32);
        opts.set_write_buffer_size(self.write_buffer_size);
        opts.set_max_write_buffer_number(self.max_write_buffer_number);
        opts.set_target_file_size_base(self.target_file_size_base);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }
}

// =============================================================================
// Handle
// =============================================================================

/// An open database with a fixed set of column families.
#[derive(Clone)]
pub struct RocksDbHandle {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksDbHandle {
    /// Opens (or creates) the database at `path` with `column_families`.
    pub fn open(
        path: impl AsRef<Path>,
        config: &RocksDbConfig,
        column_families: &[&str],
    ) -> Result<Self> {
        let descriptors: Vec<_> = column_families
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(
            &config.build_options(),
            path.as_ref(),
            descriptors,
        )
        .map_err(|e| PuffError::persistence(format!("Failed to open RocksDB: {}", e)))?;

        debug!(path = ?path.as_ref(), column_families = column_families.len(), "opened RocksDB");
        Ok(Self { db: Arc::new(db) })
    }

    pub fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PuffError::persistence(format!("Column family '{}' not found", name)))
    }

    /// Serializes `value` as JSON and stores it under `key`.
    pub fn put<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)
            .map_err(|e| PuffError::serialization(format!("Failed to serialize: {}", e)))?;

        trace!(cf = cf_name, key_len = key.len(), value_bytes = bytes.len(), "db_put");

        self.db
            .put_cf(&cf, key, &bytes)
            .map_err(|e| PuffError::persistence(format!("Failed to write: {}", e)))
    }

    pub fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        let bytes = self
            .db
            .get_pinned_cf(&cf, key)
            .map_err(|e| PuffError::persistence(format!("Failed to read: {}", e)))?;

        match bytes {
            Some(bytes) => {
                trace!(cf = cf_name, key_len = key.len(), value_bytes = bytes.len(), "db_get: hit");
                let value = serde_json::from_slice(&bytes).map_err(|e| {
                    PuffError::serialization(format!("Failed to deserialize: {}", e))
                })?;
                Ok(Some(value))
            }
            None => {
                trace!(cf = cf_name, key_len = key.len(), "db_get: miss");
                Ok(None)
            }
        }
    }

    pub fn exists(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_pinned_cf(&cf, key)
            .map(|v| v.is_some())
            .map_err(|e| PuffError::persistence(format!("Failed to check key: {}", e)))
    }

    pub fn delete(&self, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;
        trace!(cf = cf_name, key_len = key.len(), "db_delete");
        self.db
            .delete_cf(&cf, key)
            .map_err(|e| PuffError::persistence(format!("Failed to delete: {}", e)))
    }

    /// Visits every entry in key order until `callback` returns false.
    pub fn iterate_all<F>(&self, cf_name: &str, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let cf = self.cf(cf_name)?;
        let mut count: usize = 0;
        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            match item {
                Ok((key, value)) => {
                    count += 1;
                    if !callback(&key, &value) {
                        break;
                    }
                }
                Err(e) => warn!("Iterator error: {}", e),
            }
        }

        debug!(cf = cf_name, records_iterated = count, "db_iterate_all");
        Ok(())
    }
}

impl fmt::Debug for RocksDbHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocksDbHandle").finish_non_exhaustive()
    }
}

//! RocksDB-backed puff store.
//!
//! One column family holds every full puff, keyed by the raw 64 sig bytes.
//! Shells are derived on read, so listings come back in sig order.

use super::puff::{Puff, Shell};
use super::store::{
    sign_locally, BackfillRequest, PuffStore, SigningMaterial, SubmitOutcome, UnsignedPuff,
};
use crate::dag::ContentHash;
use crate::error::{PuffError, Result};
use crate::storage::{RocksDbConfig, RocksDbHandle};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Directory under the data dir that holds the database.
pub const DB_DIR: &str = "puffs_db";

/// Column family of full puffs by sig.
pub const CF_PUFFS: &str = "puffs";

/// Puff store persisted in a local RocksDB instance.
///
/// There is no network behind it, so backfill requests are only logged.
#[derive(Debug)]
pub struct RocksPuffStore {
    db: RocksDbHandle,
    /// Serializes the exists-then-put step of a submission.
    write_lock: Mutex<()>,
}

impl RocksPuffStore {
    /// Opens the store in `data_dir/puffs_db`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(data_dir.as_ref().join(DB_DIR), &RocksDbConfig::default())
    }

    /// Opens the store with the database directly at `db_path`.
    pub fn open_with_config(db_path: impl AsRef<Path>, config: &RocksDbConfig) -> Result<Self> {
        let db = RocksDbHandle::open(db_path.as_ref(), config, &[CF_PUFFS])?;
        info!("Opened puff RocksDB at {:?}", db_path.as_ref());
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    /// Stores `puff`. Returns false if the sig was already known.
    pub fn insert(&self, puff: &Puff) -> Result<bool> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| PuffError::persistence(format!("failed to acquire write lock: {}", e)))?;

        let key = puff.sig().as_bytes();
        if self.db.exists(CF_PUFFS, key)? {
            return Ok(false);
        }
        self.db.put(CF_PUFFS, key, puff)?;
        Ok(true)
    }

    /// Every stored puff, in sig order.
    pub fn puffs(&self) -> Result<Vec<Puff>> {
        let mut puffs = Vec::new();
        let mut corrupt: usize = 0;
        self.db.iterate_all(CF_PUFFS, |_, value| {
            match serde_json::from_slice::<Puff>(value) {
                Ok(puff) => puffs.push(puff),
                Err(e) => {
                    corrupt += 1;
                    warn!("Skipping unreadable puff record: {}", e);
                }
            }
            true
        })?;

        if corrupt > 0 {
            warn!(skipped = corrupt, "some stored puffs could not be read");
        }
        Ok(puffs)
    }

    pub fn puff_count(&self) -> Result<usize> {
        let mut count = 0;
        self.db.iterate_all(CF_PUFFS, |_, _| {
            count += 1;
            true
        })?;
        Ok(count)
    }
}

#[async_trait]
impl PuffStore for RocksPuffStore {
    fn get_all_local_shells(&self) -> Result<Vec<Shell>> {
        Ok(self.puffs()?.iter().map(Puff::shell).collect())
    }

    fn get_puff_by_sig(&self, sig: &ContentHash) -> Result<Option<Puff>> {
        self.db.get(CF_PUFFS, sig.as_bytes())
    }

    async fn materialize_from_shell(&self, shell: &Shell) -> Result<Puff> {
        self.get_puff_by_sig(&shell.sig)?
            .ok_or_else(|| PuffError::not_found(format!("No content for puff {}", shell.sig.short())))
    }

    fn request_backfill(&self, request: BackfillRequest) {
        debug!(
            limit = ?request.limit,
            have = request.have,
            "backfill requested, no remote peers to ask"
        );
    }

    fn build_signed_puff(&self, signer: &SigningMaterial, unsigned: UnsignedPuff) -> Result<Puff> {
        sign_locally(signer, unsigned)
    }

    async fn submit_puff(&self, puff: &Puff) -> Result<SubmitOutcome> {
        if self.insert(puff)? {
            debug!(sig = %puff.sig().short(), "puff stored");
            Ok(SubmitOutcome::Stored)
        } else {
            Ok(SubmitOutcome::AlreadyExists)
        }
    }
}

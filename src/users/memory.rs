use super::{UserRecord, UserRecords};
use crate::error::{PuffError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// In-memory user record directory.
///
/// Can be told to fail the next `n` lookups, which is how tests exercise the
/// retry path of the posting pipeline.
#[derive(Debug, Default)]
pub struct MemoryUserRecords {
    records: RwLock<HashMap<String, Vec<UserRecord>>>,
    failures_remaining: AtomicUsize,
    lookups: AtomicUsize,
}

impl MemoryUserRecords {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a record, replacing any record with the same `(username, capa)`.
    pub fn publish(&self, record: UserRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|e| PuffError::persistence(format!("failed to acquire write lock: {}", e)))?;
        let generations = records.entry(record.username.clone()).or_default();
        generations.retain(|r| r.capa != record.capa);
        generations.push(record);
        generations.sort_by_key(|r| r.capa);
        Ok(())
    }

    /// Makes the next `count` lookups fail.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Total number of lookups served or failed.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserRecords for MemoryUserRecords {
    async fn get_user_record(&self, username: &str, capa: Option<u32>) -> Result<UserRecord> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let injected_failure = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected_failure {
            return Err(PuffError::identity_unavailable(format!(
                "user record lookup for {} failed",
                username
            )));
        }

        let records = self
            .records
            .read()
            .map_err(|e| PuffError::persistence(format!("failed to acquire read lock: {}", e)))?;
        let generations = records
            .get(username)
            .ok_or_else(|| PuffError::not_found(format!("No user record for {}", username)))?;

        let record = match capa {
            Some(capa) => generations.iter().find(|r| r.capa == capa),
            None => generations.last(),
        };

        record.cloned().ok_or_else(|| {
            PuffError::not_found(format!("No user record for {} at capa {:?}", username, capa))
        })
    }
}

use super::puff::{Puff, Shell};
use super::store::{
    sign_locally, BackfillRequest, PuffStore, SigningMaterial, SubmitOutcome, UnsignedPuff,
};
use crate::dag::ContentHash;
use crate::error::{PuffError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    /// Full puffs, by sig.
    puffs: HashMap<ContentHash, Puff>,
    /// Local shells in arrival order.
    shells: Vec<Shell>,
}

/// In-memory puff store.
///
/// Shells can be added without their puff to model content that
/// has not been fetched yet; materializing those fails.
#[derive(Debug, Default)]
pub struct MemoryPuffStore {
    inner: RwLock<Inner>,
    backfills: RwLock<Vec<BackfillRequest>>,
    submit_failures: AtomicUsize,
}

impl MemoryPuffStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `puffs`.
    pub fn with_puffs(puffs: impl IntoIterator<Item = Puff>) -> Result<Self> {
        let store = Self::new();
        for puff in puffs {
            store.insert(puff)?;
        }
        Ok(store)
    }

    /// Stores `puff` and its shell. Returns false if the sig was already known.
    pub fn insert(&self, puff: Puff) -> Result<bool> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| PuffError::persistence(format!("failed to acquire write lock: {}", e)))?;

        if inner.puffs.contains_key(puff.sig()) {
            return Ok(false);
        }
        if !inner.shells.iter().any(|s| s.sig == *puff.sig()) {
            inner.shells.push(puff.shell());
        }
        inner.puffs.insert(*puff.sig(), puff);
        Ok(true)
    }

    /// Adds a shell whose full puff is not available locally.
    pub fn insert_shell(&self, shell: Shell) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| PuffError::persistence(format!("failed to acquire write lock: {}", e)))?;
        if !inner.shells.iter().any(|s| s.sig == shell.sig) {
            inner.shells.push(shell);
        }
        Ok(())
    }

    /// Every full puff, in arrival order.
    pub fn puffs(&self) -> Result<Vec<Puff>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| PuffError::persistence(format!("failed to acquire read lock: {}", e)))?;
        Ok(inner
            .shells
            .iter()
            .filter_map(|s| inner.puffs.get(&s.sig).cloned())
            .collect())
    }

    pub fn puff_count(&self) -> usize {
        self.inner.read().map(|inner| inner.puffs.len()).unwrap_or(0)
    }

    /// Backfill requests received so far.
    pub fn backfill_requests(&self) -> Vec<BackfillRequest> {
        self.backfills
            .read()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Makes the next `count` submissions fail.
    pub fn fail_next_submits(&self, count: usize) {
        self.submit_failures.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl PuffStore for MemoryPuffStore {
    fn get_all_local_shells(&self) -> Result<Vec<Shell>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| PuffError::persistence(format!("failed to acquire read lock: {}", e)))?;
        Ok(inner.shells.clone())
    }

    fn get_puff_by_sig(&self, sig: &ContentHash) -> Result<Option<Puff>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| PuffError::persistence(format!("failed to acquire read lock: {}", e)))?;
        Ok(inner.puffs.get(sig).cloned())
    }

    async fn materialize_from_shell(&self, shell: &Shell) -> Result<Puff> {
        self.get_puff_by_sig(&shell.sig)?
            .ok_or_else(|| PuffError::not_found(format!("No content for puff {}", shell.sig.short())))
    }

    fn request_backfill(&self, request: BackfillRequest) {
        debug!(
            limit = ?request.limit,
            have = request.have,
            "backfill requested"
        );
        if let Ok(mut requests) = self.backfills.write() {
            requests.push(request);
        }
    }

    fn build_signed_puff(&self, signer: &SigningMaterial, unsigned: UnsignedPuff) -> Result<Puff> {
        sign_locally(signer, unsigned)
    }

    async fn submit_puff(&self, puff: &Puff) -> Result<SubmitOutcome> {
        let injected_failure = self
            .submit_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected_failure {
            return Err(PuffError::persistence("puff store rejected the submission"));
        }

        if self.insert(puff.clone())? {
            debug!(sig = %puff.sig().short(), "puff stored");
            Ok(SubmitOutcome::Stored)
        } else {
            Ok(SubmitOutcome::AlreadyExists)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::puff::Payload;

    fn create_test_unsigned(content: &str) -> UnsignedPuff {
        let mut payload = Payload::new("text", content);
        payload.time = Some(1);
        UnsignedPuff {
            payload,
            routes: vec!["local".to_string()],
            recipients: None,
            envelope_alias: None,
        }
    }

    #[tokio::test]
    async fn test_submit_and_lookup() {
        let store = MemoryPuffStore::new();
        let signer = SigningMaterial::new("alice", "key");
        let puff = store
            .build_signed_puff(&signer, create_test_unsigned("hi"))
            .unwrap();

        assert_eq!(store.submit_puff(&puff).await.unwrap(), SubmitOutcome::Stored);
        assert_eq!(
            store.submit_puff(&puff).await.unwrap(),
            SubmitOutcome::AlreadyExists
        );
        assert_eq!(store.puff_count(), 1);
        assert_eq!(store.get_all_local_shells().unwrap().len(), 1);
        assert_eq!(store.get_puff_by_sig(puff.sig()).unwrap(), Some(puff));
    }

    #[test]
    fn test_sig_depends_on_key_and_body() {
        let store = MemoryPuffStore::new();
        let a = store
            .build_signed_puff(&SigningMaterial::new("alice", "k1"), create_test_unsigned("x"))
            .unwrap();
        let b = store
            .build_signed_puff(&SigningMaterial::new("alice", "k2"), create_test_unsigned("x"))
            .unwrap();
        let c = store
            .build_signed_puff(&SigningMaterial::new("alice", "k1"), create_test_unsigned("y"))
            .unwrap();

        assert_ne!(a.sig(), b.sig());
        assert_ne!(a.sig(), c.sig());
        assert!(store
            .build_signed_puff(&SigningMaterial::new("alice", ""), create_test_unsigned("x"))
            .is_err());
    }

    #[tokio::test]
    async fn test_shell_without_content_fails_to_materialize() {
        let store = MemoryPuffStore::new();
        let puff = store
            .build_signed_puff(&SigningMaterial::new("alice", "k"), create_test_unsigned("x"))
            .unwrap();
        store.insert_shell(puff.shell()).unwrap();

        assert_eq!(store.get_all_local_shells().unwrap().len(), 1);
        assert!(store.materialize_from_shell(&puff.shell()).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_submit_failure() {
        let store = MemoryPuffStore::new();
        let puff = store
            .build_signed_puff(&SigningMaterial::new("alice", "k"), create_test_unsigned("x"))
            .unwrap();
        store.fail_next_submits(1);

        assert!(store.submit_puff(&puff).await.is_err());
        assert_eq!(store.puff_count(), 0);
        assert!(store.submit_puff(&puff).await.is_ok());
    }
}

use super::Persistence;
use crate::error::{PuffError, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default directory name for persisted state.
pub const DEFAULT_DATA_DIR: &str = "puffball_data";

/// File-backed persistence: each key is stored as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    base_dir: PathBuf,
}

impl FilePersistence {
    /// Opens (and creates if needed) a persistence directory.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();

        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).map_err(|e| {
                PuffError::persistence(format!("Failed to create storage directory: {}", e))
            })?;
            info!("Created storage directory: {:?}", base_dir);
        }

        Ok(Self { base_dir })
    }

    /// Opens the default directory under the current working directory.
    pub fn in_current_dir() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            PuffError::persistence(format!("Failed to get current directory: {}", e))
        })?;
        Self::new(current_dir.join(DEFAULT_DATA_DIR))
    }

    /// Returns the storage directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(PuffError::persistence(format!(
                "Invalid persistence key: {:?}",
                key
            )));
        }
        Ok(self.base_dir.join(format!("{}.json", key)))
    }
}

impl Persistence for FilePersistence {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.key_path(key)?;
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)
            .map_err(|e| PuffError::persistence(format!("Failed to read {:?}: {}", path, e)))?;
        let value = serde_json::from_slice(&bytes)?;
        Ok(Some(value))
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.key_path(key)?;
        let bytes = serde_json::to_vec_pretty(value)?;

        // Write to a sibling file first so a crash never leaves a torn document.
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, &bytes).map_err(|e| {
            PuffError::persistence(format!("Failed to write {:?}: {}", tmp_path, e))
        })?;
        fs::rename(&tmp_path, &path)
            .map_err(|e| PuffError::persistence(format!("Failed to replace {:?}: {}", path, e)))?;

        debug!(key = key, file_bytes = bytes.len(), "save: persisted value");
        Ok(())
    }
}

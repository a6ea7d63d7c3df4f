//! Runtime configuration.
//!
//! Everything here is read-only from the point of view of the wardrobe and
//! the forum; both take a copy at construction.

use crate::error::{PuffError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default local propagation zone appended to every new puff's routes.
pub const DEFAULT_ZONE: &str = "local";

/// Default minimum content length (in characters) accepted by `add_post`.
pub const DEFAULT_MINIMUM_PUFF_LENGTH: usize = 1;

/// Default number of attempts when resolving the author's user record.
pub const DEFAULT_RECORD_FETCH_ATTEMPTS: u32 = 3;

/// Configuration consumed by the wardrobe and the forum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PuffConfig {
    /// Local propagation zone identifier.
    pub zone: String,
    /// Minimum content length for new posts.
    pub minimum_puff_length: usize,
    /// When set, only these content types may be registered.
    pub supported_content_types: Option<Vec<String>>,
    /// Keep identities in memory only; never persist secrets.
    pub ephemeral_keychain: bool,
    /// Skip the cloud backup of identity files.
    pub disable_cloud_identity: bool,
    /// Attempts made when resolving the author's user record.
    pub record_fetch_attempts: u32,
    /// Optional upper bound on cached renders before the cache resets itself.
    pub render_cache_limit: Option<usize>,
}

impl Default for PuffConfig {
    fn default() -> Self {
        Self {
            zone: DEFAULT_ZONE.to_string(),
            minimum_puff_length: DEFAULT_MINIMUM_PUFF_LENGTH,
            supported_content_types: None,
            ephemeral_keychain: false,
            disable_cloud_identity: false,
            record_fetch_attempts: DEFAULT_RECORD_FETCH_ATTEMPTS,
            render_cache_limit: None,
        }
    }
}

impl PuffConfig {
    /// Parses a configuration from TOML text. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| PuffError::config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| {
            PuffError::config(format!(
                "Failed to read configuration {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.zone.is_empty() {
            return Err(PuffError::config("zone cannot be empty"));
        }
        if self.record_fetch_attempts == 0 {
            return Err(PuffError::config("record_fetch_attempts must be at least 1"));
        }
        Ok(())
    }

    /// Returns true if `name` passes the content-type allow-list.
    pub fn allows_content_type(&self, name: &str) -> bool {
        self.supported_content_types
            .as_ref()
            .map_or(true, |allowed| allowed.iter().any(|n| n == name))
    }
}

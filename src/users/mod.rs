//! Authoritative user records published on the network.
//!
//! The wardrobe holds private keys; the network holds the matching public
//! record for each `(username, capa)`. Fetching that record is the only
//! network round trip the posting pipeline waits on.

mod memory;

pub use memory::MemoryUserRecords;

use crate::dag::ContentHash;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Public record for one generation (capa) of a username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Username this record describes.
    pub username: String,
    /// Generation of the record; matches an alias's capa.
    pub capa: u32,
    /// Public root key.
    pub root_key: Option<String>,
    /// Public admin key.
    pub admin_key: Option<String>,
    /// Public default (posting) key.
    pub default_key: Option<String>,
    /// Sig of the most recent puff published by this user, if any.
    pub latest: Option<ContentHash>,
}

impl UserRecord {
    /// Creates a record with no keys.
    pub fn new(username: impl Into<String>, capa: u32) -> Self {
        Self {
            username: username.into(),
            capa,
            root_key: None,
            admin_key: None,
            default_key: None,
            latest: None,
        }
    }

    /// Sets the public default key.
    pub fn with_default_key(mut self, key: impl Into<String>) -> Self {
        self.default_key = Some(key.into());
        self
    }
}

/// Source of authoritative user records.
#[async_trait]
pub trait UserRecords: Send + Sync + 'static {
    /// Fetches the record for `username`. With `capa == None` the latest
    /// generation is returned.
    async fn get_user_record(&self, username: &str, capa: Option<u32>) -> Result<UserRecord>;
}

/// Strips any `:capa` style suffix from a username.
///
/// Filters compare authors by their bare username so that puffs signed by
/// different generations of the same user match together.
pub fn canonical_username(username: &str) -> &str {
    username.split(':').next().unwrap_or(username)
}

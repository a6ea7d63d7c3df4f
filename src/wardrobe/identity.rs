//! Identities and the exportable identity file.

use super::alias::Alias;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Version of the identity file format.
pub const IDENTITY_FILE_VERSION: u32 = 1;

/// A username plus every alias known for it.
///
/// The primary alias is not persisted: it is re-derived while the aliases are
/// re-added on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    #[serde(skip)]
    pub(crate) primary: Option<usize>,
    #[serde(default)]
    pub aliases: Vec<Alias>,
    #[serde(default)]
    pub preferences: Map<String, Value>,
}

impl Identity {
    /// Creates an identity with no aliases.
    pub fn new(username: impl Into<String>, preferences: Map<String, Value>) -> Self {
        Self {
            username: username.into(),
            primary: None,
            aliases: Vec::new(),
            preferences,
        }
    }

    /// Returns the primary alias, if one has been designated.
    pub fn primary(&self) -> Option<&Alias> {
        self.primary.and_then(|i| self.aliases.get(i))
    }

    /// Position of the alias with exactly this username and capa.
    pub fn find_alias(&self, username: &str, capa: u32) -> Option<usize> {
        self.aliases.iter().position(|a| a.matches(username, capa))
    }

    /// Position of the highest-capa alias for `username`.
    ///
    /// Only a strictly greater capa replaces the current pick, so the first
    /// of several equal-capa aliases wins.
    pub fn latest_alias(&self, username: &str) -> Option<usize> {
        let mut best: Option<(usize, u32)> = None;
        for (i, alias) in self.aliases.iter().enumerate() {
            if alias.username != username {
                continue;
            }
            if best.map_or(true, |(_, capa)| alias.capa > capa) {
                best = Some((i, alias.capa));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// Portable snapshot of one identity, suitable for export or cloud backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityFile {
    pub comment: String,
    pub username: String,
    pub primary: Option<Alias>,
    pub aliases: Vec<Alias>,
    pub preferences: Map<String, Value>,
    pub version: u32,
}

impl IdentityFile {
    /// Builds the export snapshot of an identity.
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            comment: format!(
                "This file contains your private passphrase. It was generated by puffball {}. \
                 Keep it secret.",
                crate::VERSION
            ),
            username: identity.username.clone(),
            primary: identity.primary().cloned(),
            aliases: identity.aliases.clone(),
            preferences: identity.preferences.clone(),
            version: IDENTITY_FILE_VERSION,
        }
    }
}

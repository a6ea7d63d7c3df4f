//! Hooks fired by the wardrobe after every mutation and before identity switches.

use super::identity::{Identity, IdentityFile};
use crate::config::PuffConfig;
use crate::error::Result;
use std::collections::HashMap;
use tracing::{debug, warn};

/// What observers see after a wardrobe mutation.
#[derive(Debug, Clone, Copy)]
pub struct IdentityUpdate<'a> {
    /// Every known identity.
    pub identities: &'a HashMap<String, Identity>,
    /// The active username, if any.
    pub current_username: Option<&'a str>,
    /// True while stored identities are being restored at startup.
    pub restoring: bool,
}

impl IdentityUpdate<'_> {
    /// The active identity, if any.
    pub fn current_identity(&self) -> Option<&Identity> {
        self.current_username
            .and_then(|username| self.identities.get(username))
    }

    /// Export snapshot of the active identity.
    pub fn identity_file(&self) -> Option<IdentityFile> {
        self.current_identity().map(IdentityFile::from_identity)
    }
}

/// Subscriber to wardrobe events.
pub trait IdentityObserver: Send + Sync {
    /// Called after every wardrobe mutation.
    fn on_identity_update(&self, _update: &IdentityUpdate<'_>) {}

    /// Called before the active identity changes.
    fn before_identity_switch(&self, _next: Option<&str>) {}
}

/// Destination for identity file backups.
pub trait SnapshotUploader: Send + Sync {
    /// Stores the identity file remotely.
    fn upload_identity_file(&self, file: &IdentityFile) -> Result<()>;
}

/// Observer that backs the active identity file up on every update.
pub struct CloudBackup<U: SnapshotUploader> {
    uploader: U,
    enabled: bool,
}

impl<U: SnapshotUploader> CloudBackup<U> {
    /// Creates a backup observer; disabled when `disable_cloud_identity` is set.
    pub fn new(uploader: U, config: &PuffConfig) -> Self {
        Self {
            uploader,
            enabled: !config.disable_cloud_identity,
        }
    }

    /// Returns the wrapped uploader.
    pub fn uploader(&self) -> &U {
        &self.uploader
    }
}

impl<U: SnapshotUploader> IdentityObserver for CloudBackup<U> {
    fn on_identity_update(&self, update: &IdentityUpdate<'_>) {
        if !self.enabled || update.restoring {
            return;
        }

        let Some(file) = update.identity_file() else {
            debug!("cloud backup: no active identity, nothing to upload");
            return;
        };

        if let Err(e) = self.uploader.upload_identity_file(&file) {
            warn!(username = %file.username, error = %e, "cloud backup: upload failed");
        }
    }
}

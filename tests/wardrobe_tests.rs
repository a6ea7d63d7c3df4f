//! Integration tests for the wardrobe over real persistence.
//!
//! These tests restart wardrobes over the same data directory and check
//! that identities, the active username and observer notifications survive
//! the round trip.

use puffball::storage::{FilePersistence, Persistence, KEY_CURRENT_USERNAME, KEY_IDENTITIES};
use puffball::wardrobe::{
    CloudBackup, IdentityFile, IdentityObserver, IdentityUpdate, NewAlias, SnapshotUploader,
    Wardrobe, IDENTITY_FILE_VERSION,
};
use puffball::{PuffConfig, Result};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct RecordingUploader {
    uploads: Mutex<Vec<IdentityFile>>,
}

impl SnapshotUploader for RecordingUploader {
    fn upload_identity_file(&self, file: &IdentityFile) -> Result<()> {
        self.uploads.lock().unwrap().push(file.clone());
        Ok(())
    }
}

#[derive(Default)]
struct ObservedUpdates {
    restoring: Mutex<Vec<bool>>,
}

impl IdentityObserver for ObservedUpdates {
    fn on_identity_update(&self, update: &IdentityUpdate<'_>) {
        self.restoring.lock().unwrap().push(update.restoring);
    }
}

fn create_test_persistence(dir: &TempDir) -> Arc<FilePersistence> {
    Arc::new(FilePersistence::new(dir.path()).unwrap())
}

fn create_test_wardrobe(dir: &TempDir, config: PuffConfig) -> Wardrobe {
    let mut wardrobe = Wardrobe::new(config, create_test_persistence(dir));
    wardrobe.init().unwrap();
    wardrobe
}

/// Populates alice (two generations plus a nickname) and bob, with alice active.
fn populate(wardrobe: &mut Wardrobe) {
    wardrobe
        .add_alias(
            "alice",
            NewAlias::new("alice")
                .with_root_key("alice-root-1")
                .with_default_key("alice-default-1"),
        )
        .unwrap();
    wardrobe
        .add_alias(
            "alice",
            NewAlias::new("alice")
                .with_capa(2)
                .with_root_key("alice-root-2")
                .with_default_key("alice-default-2")
                .with_secret("passphrase", json!("correct horse")),
        )
        .unwrap();
    wardrobe
        .add_alias("alice", NewAlias::new("ally").with_default_key("ally-default"))
        .unwrap();
    wardrobe
        .add_alias("bob", NewAlias::new("bob").with_admin_key("bob-admin"))
        .unwrap();
    wardrobe.switch_identity_to(Some("alice")).unwrap();
    wardrobe.set_preference("theme", json!("dark")).unwrap();
}

// =============================================================================
// Persistence Round Trip Tests
// =============================================================================

#[test]
fn test_identities_survive_restart() {
    let dir = TempDir::new().unwrap();
    {
        let mut wardrobe = create_test_wardrobe(&dir, PuffConfig::default());
        populate(&mut wardrobe);
    }

    let wardrobe = create_test_wardrobe(&dir, PuffConfig::default());
    assert_eq!(wardrobe.identities().len(), 2);
    assert_eq!(wardrobe.current_username(), Some("alice"));

    let alice = wardrobe.current_identity().unwrap();
    assert_eq!(alice.aliases.len(), 3);
    assert_eq!(alice.preferences.get("theme"), Some(&json!("dark")));

    // The newest own-name alias is primary again after the restore.
    let primary = alice.primary().unwrap();
    assert_eq!(primary.capa, 2);
    assert_eq!(primary.private_default_key.as_deref(), Some("alice-default-2"));
    assert_eq!(primary.secrets.get("passphrase"), Some(&json!("correct horse")));

    assert_eq!(wardrobe.identity_for_alias("ally").unwrap().username, "alice");
    assert_eq!(wardrobe.identity_for_alias("bob").unwrap().username, "bob");

    wardrobe.use_secure_info(|info| {
        assert_eq!(info.current_username, Some("alice"));
        assert_eq!(info.private_root_key, Some("alice-root-2"));
        assert_eq!(info.private_admin_key, None);
    });
}

#[test]
fn test_signed_out_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    {
        let mut wardrobe = create_test_wardrobe(&dir, PuffConfig::default());
        populate(&mut wardrobe);
        wardrobe.switch_identity_to(None).unwrap();
    }

    let persistence = create_test_persistence(&dir);
    assert_eq!(
        persistence.get(KEY_CURRENT_USERNAME).unwrap(),
        Some(Value::Null)
    );

    let wardrobe = create_test_wardrobe(&dir, PuffConfig::default());
    assert_eq!(wardrobe.identities().len(), 2);
    assert_eq!(wardrobe.current_username(), None);
    assert!(wardrobe.identity_hash().is_none());
}

#[test]
fn test_removed_identity_stays_removed() {
    let dir = TempDir::new().unwrap();
    {
        let mut wardrobe = create_test_wardrobe(&dir, PuffConfig::default());
        populate(&mut wardrobe);
        wardrobe.remove_identity("alice").unwrap();
        assert_eq!(wardrobe.current_username(), None);
    }

    let wardrobe = create_test_wardrobe(&dir, PuffConfig::default());
    assert!(wardrobe.identity("alice").is_none());
    assert!(wardrobe.identity_for_alias("ally").is_none());
    assert_eq!(wardrobe.identity_for_alias("bob").unwrap().username, "bob");
    assert_eq!(wardrobe.current_username(), None);
}

#[test]
fn test_stale_current_username_is_ignored() {
    let dir = TempDir::new().unwrap();
    let persistence = create_test_persistence(&dir);
    persistence
        .save(KEY_CURRENT_USERNAME, &json!("ghost"))
        .unwrap();

    let wardrobe = create_test_wardrobe(&dir, PuffConfig::default());
    assert!(wardrobe.identities().is_empty());
    assert_eq!(wardrobe.current_username(), None);
}

#[test]
fn test_ephemeral_keychain_writes_no_identities() {
    let dir = TempDir::new().unwrap();
    let config = PuffConfig {
        ephemeral_keychain: true,
        ..PuffConfig::default()
    };
    {
        let mut wardrobe = create_test_wardrobe(&dir, config.clone());
        populate(&mut wardrobe);
    }

    let persistence = create_test_persistence(&dir);
    assert!(persistence.get(KEY_IDENTITIES).unwrap().is_none());
    assert_eq!(
        persistence.get(KEY_CURRENT_USERNAME).unwrap(),
        Some(json!("alice"))
    );

    let wardrobe = create_test_wardrobe(&dir, config);
    assert!(wardrobe.identities().is_empty());
    assert_eq!(wardrobe.current_username(), None);
}

// =============================================================================
// Observer Tests
// =============================================================================

#[test]
fn test_restore_is_flagged_to_observers() {
    let dir = TempDir::new().unwrap();
    {
        let mut wardrobe = create_test_wardrobe(&dir, PuffConfig::default());
        populate(&mut wardrobe);
    }

    let observed = Arc::new(ObservedUpdates::default());
    let mut wardrobe = Wardrobe::new(PuffConfig::default(), create_test_persistence(&dir));
    wardrobe.subscribe(observed.clone());
    wardrobe.init().unwrap();

    // Restoring adds identities without notifying; the final switch does.
    assert_eq!(*observed.restoring.lock().unwrap(), vec![false]);
}

#[test]
fn test_cloud_backup_uploads_active_identity() {
    let dir = TempDir::new().unwrap();
    let config = PuffConfig::default();
    let backup = Arc::new(CloudBackup::new(RecordingUploader::default(), &config));

    let mut wardrobe = Wardrobe::new(config, create_test_persistence(&dir));
    wardrobe.subscribe(backup.clone());
    wardrobe.init().unwrap();
    assert!(backup.uploader().uploads.lock().unwrap().is_empty());

    populate(&mut wardrobe);
    let uploads = backup.uploader().uploads.lock().unwrap();
    let last = uploads.last().unwrap();
    assert_eq!(last.username, "alice");
    assert_eq!(last.primary.as_ref().map(|p| p.capa), Some(2));
    assert_eq!(last.preferences.get("theme"), Some(&json!("dark")));
    // Mutations before the first switch have no active identity to upload.
    assert_eq!(uploads.len(), 2);
}

#[test]
fn test_cloud_backup_disabled_by_config() {
    let dir = TempDir::new().unwrap();
    let config = PuffConfig {
        disable_cloud_identity: true,
        ..PuffConfig::default()
    };
    let backup = Arc::new(CloudBackup::new(RecordingUploader::default(), &config));

    let mut wardrobe = Wardrobe::new(config, create_test_persistence(&dir));
    wardrobe.subscribe(backup.clone());
    wardrobe.init().unwrap();
    populate(&mut wardrobe);

    assert!(backup.uploader().uploads.lock().unwrap().is_empty());
}

// =============================================================================
// Export Tests
// =============================================================================

#[test]
fn test_export_identity_file() {
    let dir = TempDir::new().unwrap();
    let mut wardrobe = create_test_wardrobe(&dir, PuffConfig::default());
    assert!(wardrobe.export_identity_file().is_err());

    populate(&mut wardrobe);
    let export = wardrobe.export_identity_file().unwrap();
    assert_eq!(export.username, "alice");
    assert_eq!(export.version, IDENTITY_FILE_VERSION);
    assert_eq!(export.aliases.len(), 3);
    assert!(export.comment.contains("private passphrase"));

    let value = serde_json::to_value(&export).unwrap();
    assert_eq!(value["primary"]["privateDefaultKey"], json!("alice-default-2"));
    assert_eq!(value["preferences"], json!({ "theme": "dark" }));

    let parsed: IdentityFile = serde_json::from_value(value).unwrap();
    assert_eq!(parsed.primary, export.primary);
}

#[test]
fn test_renaming_primary_persists() {
    let dir = TempDir::new().unwrap();
    {
        let mut wardrobe = create_test_wardrobe(&dir, PuffConfig::default());
        populate(&mut wardrobe);
        wardrobe.set_primary_alias("alice", "ally").unwrap();
        assert_eq!(wardrobe.current_username(), Some("ally"));
    }

    let wardrobe = create_test_wardrobe(&dir, PuffConfig::default());
    assert!(wardrobe.identity("alice").is_none());
    let ally = wardrobe.identity("ally").unwrap();
    assert_eq!(ally.primary().unwrap().username, "ally");
    assert_eq!(ally.aliases.len(), 3);
    assert_eq!(wardrobe.current_username(), Some("ally"));
    assert_eq!(wardrobe.identity_for_alias("alice").unwrap().username, "ally");
}

#[test]
fn test_preferences_start_empty() {
    let dir = TempDir::new().unwrap();
    let mut wardrobe = create_test_wardrobe(&dir, PuffConfig::default());
    wardrobe
        .add_identity("carol", vec![NewAlias::new("carol")], Map::new(), true)
        .unwrap();
    wardrobe.switch_identity_to(Some("carol")).unwrap();

    assert!(wardrobe.current_identity().unwrap().preferences.is_empty());
    assert!(wardrobe.identity_hash().is_some());
}

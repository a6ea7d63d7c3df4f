//! Local management of identities, aliases and private data.
//!
//! An identity is a username plus every alias known for it. An alias is a
//! username, a capa and a set of private keys; username and capa together
//! identify one alias, and capa is the version of the username's user record
//! the keys belong to. Aliases are usually previous primaries of the
//! identity or throwaway usernames created for one-off encrypted transfers.
//!
//! The [`Wardrobe`] owns all of this state. It is constructed explicitly with
//! its collaborators injected:
//!
//! - a [`Persistence`] backend for the identity map and active username
//! - any number of [`IdentityObserver`]s (cloud backup, render caches, UI)
//! - optionally a [`UserRecords`] source used to prefetch the active user's
//!   record after a switch
//!
//! ## Usage
//!
//! ```ignore
//! let mut wardrobe = Wardrobe::new(config, Arc::new(MemoryPersistence::new()));
//! wardrobe.init()?;
//! wardrobe.add_identity("alice", vec![NewAlias::new("alice").with_default_key(k)], Map::new(), true)?;
//! wardrobe.switch_identity_to(Some("alice"))?;
//! ```

mod alias;
mod identity;
mod observer;

pub use alias::{Alias, NewAlias, DEFAULT_CAPA};
pub use identity::{Identity, IdentityFile, IDENTITY_FILE_VERSION};
pub use observer::{CloudBackup, IdentityObserver, IdentityUpdate, SnapshotUploader};

use crate::config::PuffConfig;
use crate::dag::ContentHash;
use crate::error::{PuffError, Result};
use crate::storage::{Persistence, KEY_CURRENT_USERNAME, KEY_IDENTITIES};
use crate::users::UserRecords;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Private view handed to [`Wardrobe::use_secure_info`] callbacks.
#[derive(Debug, Clone, Copy)]
pub struct SecureInfo<'a> {
    /// Every known identity, so callers can list them.
    pub identities: &'a HashMap<String, Identity>,
    /// The active username.
    pub current_username: Option<&'a str>,
    /// Private root key of the active primary alias.
    pub private_root_key: Option<&'a str>,
    /// Private admin key of the active primary alias.
    pub private_admin_key: Option<&'a str>,
    /// Private default key of the active primary alias.
    pub private_default_key: Option<&'a str>,
}

/// Owner of identities, aliases and the active-identity pointer.
pub struct Wardrobe {
    identities: HashMap<String, Identity>,
    /// Alias username -> owning identity username. Last write wins.
    alias_index: HashMap<String, String>,
    current_username: Option<String>,
    identity_hash: Option<ContentHash>,
    restoring: bool,
    config: PuffConfig,
    persistence: Arc<dyn Persistence>,
    observers: Vec<Arc<dyn IdentityObserver>>,
    records: Option<Arc<dyn UserRecords>>,
}

impl Wardrobe {
    /// Creates an empty wardrobe. Call [`Wardrobe::init`] to restore stored state.
    pub fn new(config: PuffConfig, persistence: Arc<dyn Persistence>) -> Self {
        Self {
            identities: HashMap::new(),
            alias_index: HashMap::new(),
            current_username: None,
            identity_hash: None,
            restoring: false,
            config,
            persistence,
            observers: Vec::new(),
            records: None,
        }
    }

    /// Attaches the user record source used for post-switch prefetches.
    pub fn with_user_records(mut self, records: Arc<dyn UserRecords>) -> Self {
        self.records = Some(records);
        self
    }

    /// Registers an observer.
    pub fn subscribe(&mut self, observer: Arc<dyn IdentityObserver>) {
        self.observers.push(observer);
    }

    /// Restores identities and the last active username from persistence.
    ///
    /// Observers see `restoring == true` for every update caused by the
    /// restore itself, so cloud backups are not re-uploaded per identity.
    pub fn init(&mut self) -> Result<()> {
        let stored: BTreeMap<String, Identity> = match self.persistence.get(KEY_IDENTITIES)? {
            Some(value) => serde_json::from_value(value)?,
            None => BTreeMap::new(),
        };

        self.restoring = true;
        let restored = self.restore_identities(&stored);
        self.restoring = false;
        restored?;

        info!(identities = self.identities.len(), "Restored identities");

        let last_username = self
            .persistence
            .get(KEY_CURRENT_USERNAME)?
            .and_then(|v| v.as_str().map(str::to_string));

        if let Some(username) = last_username {
            if self.identities.contains_key(&username) {
                self.switch_identity_to(Some(&username))?;
            } else {
                warn!(username = %username, "Stored active username has no identity, ignoring");
            }
        }

        Ok(())
    }

    fn restore_identities(&mut self, stored: &BTreeMap<String, Identity>) -> Result<()> {
        for (username, identity) in stored {
            let aliases = identity.aliases.iter().map(NewAlias::from).collect();
            self.add_identity(username, aliases, identity.preferences.clone(), false)?;
        }
        Ok(())
    }

    /// Drops all in-memory state. Persistence is left untouched.
    pub fn reset(&mut self) {
        self.identities.clear();
        self.alias_index.clear();
        self.current_username = None;
        self.identity_hash = None;
        self.restoring = false;
    }

    /// Creates or replaces an identity and adds each supplied alias.
    ///
    /// With `persist == false` the final save and notification are skipped,
    /// which is what bulk restores want.
    pub fn add_identity(
        &mut self,
        username: &str,
        aliases: Vec<NewAlias>,
        preferences: Map<String, Value>,
        persist: bool,
    ) -> Result<()> {
        validate_username(username, "Identity")?;
        for alias in &aliases {
            validate_username(&alias.username, "Alias")?;
        }

        self.identities
            .insert(username.to_string(), Identity::new(username, preferences));
        self.alias_index.retain(|_, owner| owner != username);

        for alias in &aliases {
            self.merge_alias(username, alias);
        }

        debug!(
            username = username,
            aliases = aliases.len(),
            persist = persist,
            "add_identity"
        );

        if persist {
            self.process_updates();
        }
        Ok(())
    }

    /// Adds an alias to an identity, creating the identity if it is unknown.
    ///
    /// An existing alias with the same username and capa is merged instead of
    /// duplicated. An alias whose username is the identity's own becomes the
    /// primary.
    pub fn add_alias(&mut self, identity_username: &str, alias: NewAlias) -> Result<()> {
        validate_username(identity_username, "Identity")?;
        validate_username(&alias.username, "Alias")?;

        self.merge_alias(identity_username, &alias);
        self.process_updates();
        Ok(())
    }

    fn merge_alias(&mut self, identity_username: &str, new_alias: &NewAlias) {
        let alias = new_alias.to_alias();
        let identity = self
            .identities
            .entry(identity_username.to_string())
            .or_insert_with(|| Identity::new(identity_username, Map::new()));

        let index = match identity.find_alias(&alias.username, alias.capa) {
            Some(index) => {
                identity.aliases[index].merge_from(&alias);
                index
            }
            None => {
                identity.aliases.push(alias.clone());
                identity.aliases.len() - 1
            }
        };

        // No per-identity capa floor is tracked, so the newest own-name alias
        // always takes over as primary.
        if alias.username == identity_username {
            identity.primary = Some(index);
        }

        self.alias_index
            .insert(alias.username.clone(), identity_username.to_string());
    }

    /// Makes the highest-capa alias named `alias_username` the identity's
    /// primary, renaming the identity to that username.
    pub fn set_primary_alias(&mut self, identity_username: &str, alias_username: &str) -> Result<()> {
        let identity = self.identities.get(identity_username).ok_or_else(|| {
            PuffError::not_found("Primary alias can only be set for known identities")
        })?;

        let index = identity.latest_alias(alias_username).ok_or_else(|| {
            PuffError::not_found("That alias is not associated with that identity")
        })?;

        if alias_username != identity_username && self.identities.contains_key(alias_username) {
            return Err(PuffError::validation(format!(
                "An identity named \"{}\" already exists",
                alias_username
            )));
        }

        let mut identity = self
            .identities
            .remove(identity_username)
            .ok_or_else(|| PuffError::not_found("Identity vanished during rename"))?;
        identity.username = alias_username.to_string();
        identity.primary = Some(index);
        self.identities.insert(alias_username.to_string(), identity);

        for owner in self.alias_index.values_mut() {
            if owner == identity_username {
                *owner = alias_username.to_string();
            }
        }

        info!(
            from = identity_username,
            to = alias_username,
            "Primary alias changed"
        );

        if self.current_username.as_deref() == Some(identity_username) {
            self.switch_identity_to(Some(alias_username))
        } else {
            self.process_updates();
            Ok(())
        }
    }

    /// Sets a preference on the active identity.
    pub fn set_preference(&mut self, key: &str, value: Value) -> Result<()> {
        let identity = self
            .current_username
            .as_ref()
            .and_then(|username| self.identities.get_mut(username))
            .ok_or_else(|| {
                PuffError::not_found("Preferences can only be set for an active identity")
            })?;

        identity.preferences.insert(key.to_string(), value);
        self.process_updates();
        Ok(())
    }

    /// Makes `username` the active identity, or clears it with `None`.
    pub fn switch_identity_to(&mut self, username: Option<&str>) -> Result<()> {
        if let Some(username) = username {
            if !self.identities.contains_key(username) {
                return Err(PuffError::not_found(format!(
                    "No identity found with username \"{}\"",
                    username
                )));
            }
        }

        for observer in &self.observers {
            observer.before_identity_switch(username);
        }

        self.current_username = username.map(str::to_string);

        if self.identity_hash.is_none() {
            let snapshot = self.export_identity_file().ok();
            self.identity_hash = Some(ContentHash::compute(&snapshot)?);
        }

        self.process_updates();

        let prefetch = self
            .current_identity()
            .and_then(|identity| identity.primary().map(|p| (identity.username.clone(), p.capa)));
        if let Some((username, capa)) = prefetch {
            self.prefetch_user_record(username, capa);
        }

        info!(username = ?username, "Switched identity");
        Ok(())
    }

    fn prefetch_user_record(&self, username: String, capa: u32) {
        let Some(records) = self.records.clone() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = records.get_user_record(&username, Some(capa)).await {
                        debug!(username = %username, capa = capa, error = %e, "user record prefetch failed");
                    }
                });
            }
            Err(_) => debug!(
                username = %username,
                "no async runtime, skipping user record prefetch"
            ),
        }
    }

    /// Deletes an identity, clearing the active pointer if it was active.
    pub fn remove_identity(&mut self, username: &str) -> Result<()> {
        if self.identities.remove(username).is_none() {
            return Err(PuffError::not_found("Could not find that identity for removal"));
        }

        self.alias_index.retain(|_, owner| owner != username);

        if self.current_username.as_deref() == Some(username) {
            self.current_username = None;
        }

        info!(username = username, "Removed identity");
        self.process_updates();
        Ok(())
    }

    /// Runs `f` with every identity and the active primary's private keys.
    pub fn use_secure_info<R>(&self, f: impl FnOnce(SecureInfo<'_>) -> R) -> R {
        let primary = self.current_identity().and_then(Identity::primary);

        f(SecureInfo {
            identities: &self.identities,
            current_username: self.current_username.as_deref(),
            private_root_key: primary.and_then(|p| p.private_root_key.as_deref()),
            private_admin_key: primary.and_then(|p| p.private_admin_key.as_deref()),
            private_default_key: primary.and_then(|p| p.private_default_key.as_deref()),
        })
    }

    /// Export snapshot of the active identity.
    pub fn export_identity_file(&self) -> Result<IdentityFile> {
        self.current_identity()
            .map(IdentityFile::from_identity)
            .ok_or_else(|| PuffError::not_found("No active identity to export"))
    }

    /// Returns the identity stored under `username`.
    pub fn identity(&self, username: &str) -> Option<&Identity> {
        self.identities.get(username)
    }

    /// Returns the identity that owns the alias named `alias_username`.
    pub fn identity_for_alias(&self, alias_username: &str) -> Option<&Identity> {
        self.alias_index
            .get(alias_username)
            .and_then(|owner| self.identities.get(owner))
    }

    /// Every known identity.
    pub fn identities(&self) -> &HashMap<String, Identity> {
        &self.identities
    }

    /// The active username.
    pub fn current_username(&self) -> Option<&str> {
        self.current_username.as_deref()
    }

    /// The active identity.
    pub fn current_identity(&self) -> Option<&Identity> {
        self.current_username
            .as_ref()
            .and_then(|username| self.identities.get(username))
    }

    /// Hash of the identity snapshot taken on the first switch.
    pub fn identity_hash(&self) -> Option<&ContentHash> {
        self.identity_hash.as_ref()
    }

    /// The configuration this wardrobe was built with.
    pub fn config(&self) -> &PuffConfig {
        &self.config
    }

    /// Persists state and notifies observers. Persistence failures are logged;
    /// the in-memory change has already been committed.
    fn process_updates(&self) {
        if !self.config.ephemeral_keychain {
            match serde_json::to_value(&self.identities) {
                Ok(value) => {
                    if let Err(e) = self.persistence.save(KEY_IDENTITIES, &value) {
                        warn!(error = %e, "Failed to persist identities");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to serialize identities"),
            }
        }

        let current = self
            .current_username
            .as_ref()
            .map_or(Value::Null, |u| Value::String(u.clone()));
        if let Err(e) = self.persistence.save(KEY_CURRENT_USERNAME, &current) {
            warn!(error = %e, "Failed to persist current username");
        }

        let update = IdentityUpdate {
            identities: &self.identities,
            current_username: self.current_username.as_deref(),
            restoring: self.restoring,
        };
        for observer in &self.observers {
            observer.on_identity_update(&update);
        }
    }
}

fn validate_username(username: &str, what: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(PuffError::validation(format!(
            "{} username cannot be empty",
            what
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryPersistence;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn create_test_wardrobe() -> (Wardrobe, Arc<MemoryPersistence>) {
        let persistence = Arc::new(MemoryPersistence::new());
        let wardrobe = Wardrobe::new(PuffConfig::default(), persistence.clone());
        (wardrobe, persistence)
    }

    #[derive(Default)]
    struct CountingObserver {
        updates: AtomicUsize,
        restoring_updates: AtomicUsize,
        switches: Mutex<Vec<Option<String>>>,
    }

    impl IdentityObserver for CountingObserver {
        fn on_identity_update(&self, update: &IdentityUpdate<'_>) {
            self.updates.fetch_add(1, Ordering::SeqCst);
            if update.restoring {
                self.restoring_updates.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn before_identity_switch(&self, next: Option<&str>) {
            self.switches.lock().unwrap().push(next.map(str::to_string));
        }
    }

    #[test]
    fn test_add_alias_creates_identity_and_primary() {
        let (mut wardrobe, _) = create_test_wardrobe();

        wardrobe
            .add_alias("alice", NewAlias::new("alice").with_capa(2).with_root_key("r"))
            .unwrap();

        let identity = wardrobe.identity("alice").unwrap();
        assert_eq!(identity.aliases.len(), 1);
        assert_eq!(identity.primary().unwrap().capa, 2);
        assert_eq!(wardrobe.identity_for_alias("alice").unwrap().username, "alice");
    }

    #[test]
    fn test_add_alias_is_idempotent() {
        let (mut wardrobe, _) = create_test_wardrobe();
        let alias = NewAlias::new("alice")
            .with_capa(1)
            .with_root_key("root")
            .with_secret("passphrase", json!("pw"));

        wardrobe.add_alias("alice", alias.clone()).unwrap();
        wardrobe
            .add_alias("alice", alias.with_secret("hint", json!("pet")))
            .unwrap();

        let identity = wardrobe.identity("alice").unwrap();
        assert_eq!(identity.aliases.len(), 1);
        let stored = &identity.aliases[0];
        assert_eq!(stored.secrets.len(), 2);
        assert_eq!(stored.private_root_key.as_deref(), Some("root"));
    }

    #[test]
    fn test_foreign_alias_does_not_become_primary() {
        let (mut wardrobe, _) = create_test_wardrobe();
        wardrobe.add_alias("alice", NewAlias::new("alice")).unwrap();
        wardrobe.add_alias("alice", NewAlias::new("anon123")).unwrap();

        let identity = wardrobe.identity("alice").unwrap();
        assert_eq!(identity.aliases.len(), 2);
        assert_eq!(identity.primary().unwrap().username, "alice");
        assert_eq!(
            wardrobe.identity_for_alias("anon123").unwrap().username,
            "alice"
        );
    }

    #[test]
    fn test_newest_own_alias_is_promoted() {
        let (mut wardrobe, _) = create_test_wardrobe();
        wardrobe
            .add_alias("alice", NewAlias::new("alice").with_capa(3))
            .unwrap();
        wardrobe
            .add_alias("alice", NewAlias::new("alice").with_capa(2))
            .unwrap();

        assert_eq!(wardrobe.identity("alice").unwrap().primary().unwrap().capa, 2);
    }

    #[test]
    fn test_empty_usernames_rejected() {
        let (mut wardrobe, persistence) = create_test_wardrobe();

        assert!(wardrobe.add_alias("", NewAlias::new("alice")).is_err());
        assert!(wardrobe
            .add_identity("alice", vec![NewAlias::new(" ")], Map::new(), true)
            .is_err());

        assert!(wardrobe.identities().is_empty());
        assert!(persistence.is_empty());
    }

    #[test]
    fn test_set_primary_alias_selects_highest_capa() {
        let (mut wardrobe, _) = create_test_wardrobe();
        let aliases = [1, 3, 3, 2]
            .iter()
            .enumerate()
            .map(|(i, capa)| {
                NewAlias::new("alice2")
                    .with_capa(*capa)
                    .with_root_key(format!("key-{}", i))
            })
            .collect();
        wardrobe
            .add_identity("alice", aliases, Map::new(), true)
            .unwrap();

        wardrobe.set_primary_alias("alice", "alice2").unwrap();

        assert!(wardrobe.identity("alice").is_none());
        let identity = wardrobe.identity("alice2").unwrap();
        assert_eq!(identity.username, "alice2");
        // The two capa-3 entries merge, and the later keys win.
        assert_eq!(identity.aliases.len(), 3);
        let primary = identity.primary().unwrap();
        assert_eq!(primary.capa, 3);
        assert_eq!(primary.private_root_key.as_deref(), Some("key-2"));
        assert_eq!(
            wardrobe.identity_for_alias("alice2").unwrap().username,
            "alice2"
        );
    }

    #[test]
    fn test_replacing_identity_drops_old_aliases() {
        let (mut wardrobe, _) = create_test_wardrobe();
        wardrobe
            .add_identity(
                "alice",
                vec![NewAlias::new("alice"), NewAlias::new("anon1")],
                Map::new(),
                true,
            )
            .unwrap();
        wardrobe.add_alias("bob", NewAlias::new("bob")).unwrap();
        assert_eq!(wardrobe.identity_for_alias("anon1").unwrap().username, "alice");

        wardrobe
            .add_identity("alice", vec![NewAlias::new("alice")], Map::new(), true)
            .unwrap();

        assert!(wardrobe.identity_for_alias("anon1").is_none());
        assert_eq!(wardrobe.identity_for_alias("alice").unwrap().username, "alice");
        assert_eq!(wardrobe.identity_for_alias("bob").unwrap().username, "bob");
        assert_eq!(wardrobe.identity("alice").unwrap().aliases.len(), 1);
    }

    #[test]
    fn test_set_primary_alias_errors() {
        let (mut wardrobe, _) = create_test_wardrobe();
        wardrobe.add_alias("alice", NewAlias::new("alice")).unwrap();
        wardrobe.add_alias("bob", NewAlias::new("bob")).unwrap();
        wardrobe.add_alias("alice", NewAlias::new("bob")).unwrap();

        let err = wardrobe.set_primary_alias("carol", "alice").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);

        let err = wardrobe.set_primary_alias("alice", "zed").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);

        let err = wardrobe.set_primary_alias("alice", "bob").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        assert!(wardrobe.identity("alice").is_some());
    }

    #[test]
    fn test_rename_of_active_identity_switches() {
        let (mut wardrobe, persistence) = create_test_wardrobe();
        let observer = Arc::new(CountingObserver::default());
        wardrobe.subscribe(observer.clone());

        wardrobe.add_alias("alice", NewAlias::new("alice")).unwrap();
        wardrobe.add_alias("alice", NewAlias::new("alicia")).unwrap();
        wardrobe.switch_identity_to(Some("alice")).unwrap();
        wardrobe.set_primary_alias("alice", "alicia").unwrap();

        assert_eq!(wardrobe.current_username(), Some("alicia"));
        assert_eq!(
            persistence.get(KEY_CURRENT_USERNAME).unwrap(),
            Some(json!("alicia"))
        );
        assert_eq!(
            *observer.switches.lock().unwrap(),
            vec![Some("alice".to_string()), Some("alicia".to_string())]
        );
    }

    #[test]
    fn test_set_preference_requires_active_identity() {
        let (mut wardrobe, _) = create_test_wardrobe();
        assert!(wardrobe.set_preference("theme", json!("dark")).is_err());

        wardrobe.add_alias("alice", NewAlias::new("alice")).unwrap();
        wardrobe.switch_identity_to(Some("alice")).unwrap();
        wardrobe.set_preference("theme", json!("dark")).unwrap();

        assert_eq!(
            wardrobe.identity("alice").unwrap().preferences["theme"],
            json!("dark")
        );
    }

    #[test]
    fn test_switch_identity() {
        let (mut wardrobe, _) = create_test_wardrobe();
        assert!(wardrobe.switch_identity_to(Some("ghost")).is_err());
        assert!(wardrobe.identity_hash().is_none());

        wardrobe.add_alias("alice", NewAlias::new("alice")).unwrap();
        wardrobe.switch_identity_to(Some("alice")).unwrap();
        let first_hash = *wardrobe.identity_hash().unwrap();

        wardrobe.switch_identity_to(None).unwrap();
        assert!(wardrobe.current_username().is_none());
        assert_eq!(*wardrobe.identity_hash().unwrap(), first_hash);
    }

    #[test]
    fn test_remove_active_identity_clears_keys() {
        let (mut wardrobe, _) = create_test_wardrobe();
        wardrobe
            .add_alias("alice", NewAlias::new("alice").with_root_key("k"))
            .unwrap();
        wardrobe.switch_identity_to(Some("alice")).unwrap();

        wardrobe.remove_identity("alice").unwrap();
        assert!(wardrobe.current_username().is_none());
        assert!(wardrobe.identity_for_alias("alice").is_none());

        wardrobe.use_secure_info(|info| {
            assert!(info.current_username.is_none());
            assert!(info.private_root_key.is_none());
            assert!(info.private_admin_key.is_none());
            assert!(info.private_default_key.is_none());
        });

        assert!(wardrobe.remove_identity("alice").is_err());
    }

    #[test]
    fn test_use_secure_info_round_trip() {
        let (mut wardrobe, _) = create_test_wardrobe();
        wardrobe
            .add_identity(
                "alice",
                vec![NewAlias::new("alice").with_capa(1).with_root_key("k")],
                Map::new(),
                true,
            )
            .unwrap();
        wardrobe.switch_identity_to(Some("alice")).unwrap();

        let root_key = wardrobe.use_secure_info(|info| {
            assert_eq!(info.current_username, Some("alice"));
            assert_eq!(info.identities.len(), 1);
            info.private_root_key.map(str::to_string)
        });
        assert_eq!(root_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_init_restores_without_backup_noise() {
        let persistence = Arc::new(MemoryPersistence::new());
        {
            let mut wardrobe = Wardrobe::new(PuffConfig::default(), persistence.clone());
            wardrobe
                .add_alias("alice", NewAlias::new("alice").with_capa(2).with_admin_key("a"))
                .unwrap();
            wardrobe.add_alias("bob", NewAlias::new("bob")).unwrap();
            wardrobe.switch_identity_to(Some("alice")).unwrap();
        }

        let mut wardrobe = Wardrobe::new(PuffConfig::default(), persistence);
        let observer = Arc::new(CountingObserver::default());
        wardrobe.subscribe(observer.clone());
        wardrobe.init().unwrap();

        assert_eq!(wardrobe.identities().len(), 2);
        assert_eq!(wardrobe.current_username(), Some("alice"));
        let primary = wardrobe.identity("alice").unwrap().primary().unwrap();
        assert_eq!(primary.capa, 2);
        assert_eq!(primary.private_admin_key.as_deref(), Some("a"));

        // Only the final switch notifies, and it is not part of the restore.
        assert_eq!(observer.restoring_updates.load(Ordering::SeqCst), 0);
        assert_eq!(observer.updates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ephemeral_keychain_skips_identities() {
        let persistence = Arc::new(MemoryPersistence::new());
        let config = PuffConfig {
            ephemeral_keychain: true,
            ..PuffConfig::default()
        };
        let mut wardrobe = Wardrobe::new(config, persistence.clone());
        wardrobe
            .add_alias("alice", NewAlias::new("alice").with_root_key("k"))
            .unwrap();

        assert!(persistence.get(KEY_IDENTITIES).unwrap().is_none());
        assert_eq!(
            persistence.get(KEY_CURRENT_USERNAME).unwrap(),
            Some(Value::Null)
        );
    }

    #[test]
    fn test_reset_clears_memory_only() {
        let (mut wardrobe, persistence) = create_test_wardrobe();
        wardrobe.add_alias("alice", NewAlias::new("alice")).unwrap();
        wardrobe.reset();

        assert!(wardrobe.identities().is_empty());
        assert!(persistence.get(KEY_IDENTITIES).unwrap().is_some());
    }
}

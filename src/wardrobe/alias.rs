//! Aliases: one generation (capa) of a username and its private keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Capa assumed when none (or zero) is supplied.
pub const DEFAULT_CAPA: u32 = 1;

/// A stored alias.
///
/// Username and capa together identify an alias; the private keys match the
/// public keys of the user record with the same username and capa.
#[derive(Clone, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct Alias {
    #[zeroize(skip)]
    pub username: String,
    #[zeroize(skip)]
    pub capa: u32,
    #[serde(default)]
    pub private_root_key: Option<String>,
    #[serde(default)]
    pub private_admin_key: Option<String>,
    #[serde(default)]
    pub private_default_key: Option<String>,
    /// Open-ended private data (passphrases and the like).
    #[zeroize(skip)]
    #[serde(default)]
    pub secrets: Map<String, Value>,
}

impl fmt::Debug for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alias")
            .field("username", &self.username)
            .field("capa", &self.capa)
            .field("has_root_key", &self.private_root_key.is_some())
            .field("has_admin_key", &self.private_admin_key.is_some())
            .field("has_default_key", &self.private_default_key.is_some())
            .field("secret_names", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Alias {
    /// Returns true if this alias has the given username and capa.
    pub fn matches(&self, username: &str, capa: u32) -> bool {
        self.username == username && self.capa == capa
    }

    /// Folds a newer copy of the same alias into this one.
    ///
    /// Secrets are unioned with truthy incoming values winning; every other
    /// field is only overwritten by a truthy incoming value, so nothing
    /// already known is ever erased.
    pub(crate) fn merge_from(&mut self, incoming: &Alias) {
        for (name, value) in &incoming.secrets {
            if is_truthy(value) || !self.secrets.contains_key(name) {
                self.secrets.insert(name.clone(), value.clone());
            }
        }

        merge_key(&mut self.private_root_key, &incoming.private_root_key);
        merge_key(&mut self.private_admin_key, &incoming.private_admin_key);
        merge_key(&mut self.private_default_key, &incoming.private_default_key);
    }
}

fn merge_key(existing: &mut Option<String>, incoming: &Option<String>) {
    if let Some(key) = incoming.as_ref().filter(|k| !k.is_empty()) {
        if let Some(old) = existing.as_mut() {
            old.zeroize();
        }
        *existing = Some(key.clone());
    }
}

/// Loose truthiness over JSON values: null, false, 0 and "" are falsy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// An alias as supplied by a caller, before defaults are applied.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct NewAlias {
    #[zeroize(skip)]
    pub username: String,
    #[zeroize(skip)]
    pub capa: Option<u32>,
    pub private_root_key: Option<String>,
    pub private_admin_key: Option<String>,
    pub private_default_key: Option<String>,
    #[zeroize(skip)]
    pub secrets: Map<String, Value>,
}

impl fmt::Debug for NewAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAlias")
            .field("username", &self.username)
            .field("capa", &self.capa)
            .finish_non_exhaustive()
    }
}

impl NewAlias {
    /// Starts an alias for `username` with no keys and the default capa.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            capa: None,
            private_root_key: None,
            private_admin_key: None,
            private_default_key: None,
            secrets: Map::new(),
        }
    }

    /// Sets the capa.
    pub fn with_capa(mut self, capa: u32) -> Self {
        self.capa = Some(capa);
        self
    }

    /// Sets the private root key.
    pub fn with_root_key(mut self, key: impl Into<String>) -> Self {
        self.private_root_key = Some(key.into());
        self
    }

    /// Sets the private admin key.
    pub fn with_admin_key(mut self, key: impl Into<String>) -> Self {
        self.private_admin_key = Some(key.into());
        self
    }

    /// Sets the private default key.
    pub fn with_default_key(mut self, key: impl Into<String>) -> Self {
        self.private_default_key = Some(key.into());
        self
    }

    /// Adds one secret.
    pub fn with_secret(mut self, name: impl Into<String>, value: Value) -> Self {
        self.secrets.insert(name.into(), value);
        self
    }

    /// Applies defaults: capa 0 or unset becomes [`DEFAULT_CAPA`], empty keys become unset.
    pub(crate) fn to_alias(&self) -> Alias {
        let non_empty = |k: &Option<String>| k.as_ref().filter(|k| !k.is_empty()).cloned();
        Alias {
            username: self.username.clone(),
            capa: self.capa.filter(|c| *c > 0).unwrap_or(DEFAULT_CAPA),
            private_root_key: non_empty(&self.private_root_key),
            private_admin_key: non_empty(&self.private_admin_key),
            private_default_key: non_empty(&self.private_default_key),
            secrets: self.secrets.clone(),
        }
    }
}

impl From<&Alias> for NewAlias {
    fn from(alias: &Alias) -> Self {
        Self {
            username: alias.username.clone(),
            capa: Some(alias.capa),
            private_root_key: alias.private_root_key.clone(),
            private_admin_key: alias.private_admin_key.clone(),
            private_default_key: alias.private_default_key.clone(),
            secrets: alias.secrets.clone(),
        }
    }
}

//! Key/value persistence used by the wardrobe and the forum.
//!
//! Values are JSON documents keyed by short names (`identities`,
//! `currentUsername`, `flagged`). Two backends are bundled:
//!
//! - [`MemoryPersistence`]: in-process map, for tests and ephemeral sessions
//! - [`FilePersistence`]: one JSON file per key in a directory
//!
//! Puffs themselves are kept in RocksDB through [`RocksDbHandle`].

mod file;
mod memory;
mod rocksdb;

pub use self::rocksdb::{RocksDbConfig, RocksDbHandle};
pub use file::FilePersistence;
pub use memory::MemoryPersistence;

use crate::error::Result;
use serde_json::Value;

/// Key under which the identity map is stored.
pub const KEY_IDENTITIES: &str = "identities";

/// Key under which the active username is stored.
pub const KEY_CURRENT_USERNAME: &str = "currentUsername";

/// Key under which flagged puff sigs are stored.
pub const KEY_FLAGGED: &str = "flagged";

/// A simple key/value persistence backend.
pub trait Persistence: Send + Sync {
    /// Reads the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &Value) -> Result<()>;
}

//! Utility functions for CLI operations.

use crate::config::PuffConfig;
use crate::forum::{Forum, RocksPuffStore};
use crate::storage::FilePersistence;
use crate::users::{MemoryUserRecords, UserRecord};
use crate::wardrobe::Wardrobe;
use crate::Result;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Name of the optional config file inside the data directory.
pub const CONFIG_FILE_NAME: &str = "puffball.toml";

/// Everything a command needs, opened from the data directory.
pub struct Session {
    pub config: PuffConfig,
    pub persistence: Arc<FilePersistence>,
    pub wardrobe: Wardrobe,
}

/// Get the data directory: `$PUFFBALL_DIR`, else `~/.puffball`.
pub fn get_data_dir() -> Option<PathBuf> {
    if let Ok(dir) = env::var("PUFFBALL_DIR") {
        return Some(PathBuf::from(dir));
    }
    env::var("HOME")
        .ok()
        .map(|home| Path::new(&home).join(".puffball"))
}

/// Opens persistence, loads the config and restores the wardrobe.
pub fn open_session() -> Result<Session> {
    let persistence = match get_data_dir() {
        Some(dir) => FilePersistence::new(dir)?,
        None => FilePersistence::in_current_dir()?,
    };

    let config_path = persistence.base_dir().join(CONFIG_FILE_NAME);
    let config = if config_path.exists() {
        PuffConfig::load(&config_path)?
    } else {
        PuffConfig::default()
    };
    debug!(zone = %config.zone, dir = ?persistence.base_dir(), "opened session");

    let persistence = Arc::new(persistence);
    let mut wardrobe = Wardrobe::new(config.clone(), persistence.clone());
    wardrobe.init()?;

    Ok(Session {
        config,
        persistence,
        wardrobe,
    })
}

/// Publishes a user record for every locally known alias.
///
/// The CLI has no network, so the wardrobe is the only source of records.
pub fn local_user_records(wardrobe: &Wardrobe) -> Result<MemoryUserRecords> {
    let records = MemoryUserRecords::new();
    for identity in wardrobe.identities().values() {
        for alias in &identity.aliases {
            records.publish(UserRecord::new(alias.username.clone(), alias.capa))?;
        }
    }
    Ok(records)
}

/// Builds a forum over the puff database in the data directory.
pub fn open_forum(session: &Session) -> Result<Forum> {
    let store = Arc::new(RocksPuffStore::open(session.persistence.base_dir())?);
    let users = Arc::new(local_user_records(&session.wardrobe)?);

    let mut forum = Forum::new(store, users, session.config.clone())?
        .with_persistence(session.persistence.clone());
    forum.load_graph()?;
    Ok(forum)
}

/// Write file contents
pub fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    Ok(())
}

/// Format a millisecond timestamp for CLI display
pub fn format_timestamp_millis(timestamp: Option<u64>) -> String {
    match timestamp {
        Some(ms) => format!("{}.{:03}", ms / 1000, ms % 1000),
        None => "-".to_string(),
    }
}

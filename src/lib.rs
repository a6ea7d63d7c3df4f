//! # Puffball
//!
//! Identity keyring and forum engine for a content-addressed post network.
//!
//! ## Features
//!
//! - **Wardrobe**: identities, their aliases and private keys, with capa
//!   (key generation) semantics and merge-on-add
//! - **Forum**: immutable, content-addressed puffs linked into a parent/child
//!   DAG, filtered and paginated through declarative specs
//! - **Content types**: a registry of renderers keyed by type name, with
//!   `text` as the fallback
//! - **Pluggable collaborators**: the puff store, user records and
//!   persistence are traits with in-memory implementations bundled
//!
//! ## Examples
//!
//! ### Posting a reply
//!
//! ```rust,no_run
//! use puffball::forum::{Forum, MemoryPuffStore, PostDraft};
//! use puffball::storage::MemoryPersistence;
//! use puffball::users::{MemoryUserRecords, UserRecord};
//! use puffball::wardrobe::{NewAlias, Wardrobe};
//! use puffball::PuffConfig;
//! use std::sync::Arc;
//! # async fn run() -> puffball::Result<()> {
//! let config = PuffConfig::default();
//! let users = Arc::new(MemoryUserRecords::new());
//! users.publish(UserRecord::new("alice", 1))?;
//!
//! let mut wardrobe = Wardrobe::new(config.clone(), Arc::new(MemoryPersistence::new()));
//! wardrobe.add_alias("alice", NewAlias::new("alice").with_default_key("secret"))?;
//! wardrobe.switch_identity_to(Some("alice"))?;
//!
//! let mut forum = Forum::new(Arc::new(MemoryPuffStore::new()), users, config)?;
//! let root = forum.add_post(&wardrobe, PostDraft::new("text", "hello")).await?;
//! let reply = forum
//!     .add_post(&wardrobe, PostDraft::new("text", "hi!").with_parents(*root.sig()))
//!     .await?;
//! assert_eq!(forum.count_children(Some(root.sig())), 1);
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod dag;
pub mod error;
pub mod forum;
pub mod storage;
pub mod users;
pub mod wardrobe;

pub use config::PuffConfig;
pub use dag::ContentHash;
pub use error::{ErrorKind, PuffError, Result};

/// Crate version, stamped into exported identity files.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

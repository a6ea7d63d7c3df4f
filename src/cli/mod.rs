//! Command-line interface for Puffball.
//!
//! This module provides a small CLI over a data directory: identity
//! management through the wardrobe, plus posting, listing, rendering and
//! flagging puffs kept in that directory.

pub mod args;
pub mod commands;
pub mod utils;

use crate::Result;
use std::process;

pub use args::Command;
pub use commands::*;
pub use utils::*;

/// Main entry point for the CLI application
pub async fn run() -> Result<()> {
    // Parse command line arguments
    let command = match args::parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error parsing arguments: {}", e);
            process::exit(1);
        }
    };

    // Execute command
    let result = match command {
        Command::AddIdentity { username, keys } => commands::add_identity(&username, keys),
        Command::AddAlias {
            identity,
            alias,
            keys,
        } => commands::add_alias(&identity, &alias, keys),
        Command::ListIdentities => commands::list_identities(),
        Command::Switch { username } => commands::switch(username.as_deref()),
        Command::RemoveIdentity { username } => commands::remove_identity(&username),
        Command::SetPrimary { identity, alias } => commands::set_primary(&identity, &alias),
        Command::SetPreference { key, value } => commands::set_preference(&key, &value),
        Command::ExportIdentity { file } => commands::export_identity(file.as_deref()),
        Command::Post {
            content_type,
            content,
            parents,
            tags,
        } => commands::post(&content_type, &content, parents, tags).await,
        Command::List(options) => commands::list(options).await,
        Command::Render { sig, table } => commands::render(&sig, table),
        Command::Flag { sig } => commands::flag(&sig).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    Ok(())
}

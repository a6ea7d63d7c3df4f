//! Command implementations for the Puffball CLI.

use crate::{
    cli::args::{KeyOptions, ListOptions},
    cli::utils::{format_timestamp_millis, open_forum, open_session, write_file},
    dag::ContentHash,
    error::PuffError,
    forum::{FilterSpec, ListQuery, PostDraft, ViewMode},
    wardrobe::NewAlias,
    Result,
};
use serde_json::{json, Value};
use std::path::Path;
use tracing::info;

fn build_alias(username: &str, keys: KeyOptions) -> NewAlias {
    let mut alias = NewAlias::new(username);
    alias.capa = keys.capa;
    alias.private_root_key = keys.root_key;
    alias.private_admin_key = keys.admin_key;
    alias.private_default_key = keys.default_key;
    alias
}

/// Execute add-identity command
pub fn add_identity(username: &str, keys: KeyOptions) -> Result<()> {
    let mut session = open_session()?;
    session
        .wardrobe
        .add_identity(username, vec![build_alias(username, keys)], Default::default(), true)?;

    info!(username = username, "✅ Added identity");
    Ok(())
}

/// Execute add-alias command
pub fn add_alias(identity: &str, alias: &str, keys: KeyOptions) -> Result<()> {
    let mut session = open_session()?;
    session.wardrobe.add_alias(identity, build_alias(alias, keys))?;

    info!(identity = identity, alias = alias, "✅ Added alias");
    Ok(())
}

/// Execute list-identities command
pub fn list_identities() -> Result<()> {
    let session = open_session()?;
    let wardrobe = &session.wardrobe;

    if wardrobe.identities().is_empty() {
        info!("No identities found");
        return Ok(());
    }

    let mut usernames: Vec<&String> = wardrobe.identities().keys().collect();
    usernames.sort();

    for username in usernames {
        let Some(identity) = wardrobe.identity(username) else {
            continue;
        };
        let aliases: Vec<String> = identity
            .aliases
            .iter()
            .map(|a| format!("{}:{}", a.username, a.capa))
            .collect();
        info!(
            username = %identity.username,
            active = wardrobe.current_username() == Some(username.as_str()),
            primary_capa = ?identity.primary().map(|p| p.capa),
            aliases = ?aliases,
            "Identity"
        );
    }

    Ok(())
}

/// Execute switch command
pub fn switch(username: Option<&str>) -> Result<()> {
    let mut session = open_session()?;
    session.wardrobe.switch_identity_to(username)?;

    match username {
        Some(username) => info!(username = username, "✅ Switched identity"),
        None => info!("✅ Signed out"),
    }
    Ok(())
}

/// Execute remove-identity command
pub fn remove_identity(username: &str) -> Result<()> {
    let mut session = open_session()?;
    session.wardrobe.remove_identity(username)?;

    info!(username = username, "✅ Removed identity");
    Ok(())
}

/// Execute set-primary command
pub fn set_primary(identity: &str, alias: &str) -> Result<()> {
    let mut session = open_session()?;
    session.wardrobe.set_primary_alias(identity, alias)?;

    info!(identity = identity, alias = alias, "✅ Primary alias set");
    Ok(())
}

/// Execute set-pref command. Values that are not JSON are stored as strings.
pub fn set_preference(key: &str, value: &str) -> Result<()> {
    let mut session = open_session()?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    session.wardrobe.set_preference(key, value)?;

    info!(key = key, "✅ Preference set");
    Ok(())
}

/// Execute export-identity command
pub fn export_identity(file: Option<&Path>) -> Result<()> {
    let session = open_session()?;
    let export = session.wardrobe.export_identity_file()?;
    let text = serde_json::to_string_pretty(&export)?;

    match file {
        Some(path) => {
            write_file(path, text.as_bytes())?;
            info!(username = %export.username, file = ?path, "✅ Exported identity");
        }
        None => println!("{}", text),
    }
    Ok(())
}

/// Execute post command
pub async fn post(
    content_type: &str,
    content: &str,
    parents: Vec<ContentHash>,
    tags: Vec<String>,
) -> Result<()> {
    let session = open_session()?;
    let mut forum = open_forum(&session)?;

    let mut draft = PostDraft::new(content_type, content).with_parents(parents);
    if !tags.is_empty() {
        draft = draft.with_meta("tags", json!(tags));
    }
    let puff = forum.add_post(&session.wardrobe, draft).await?;

    info!(sig = %puff.sig(), routes = ?puff.routes(), "✅ Posted");
    Ok(())
}

/// Execute list command
pub async fn list(options: ListOptions) -> Result<()> {
    let session = open_session()?;
    let forum = open_forum(&session)?;

    let query = ListQuery {
        offset: options.offset,
        sort: options.sort,
        focus: None,
    };
    let filters = FilterSpec {
        types: options.types,
        tags: options.tags,
        users: options.users,
        roots: options.roots,
        ..FilterSpec::default()
    };

    let puffs = forum.list(&query, &filters, options.limit).await?;
    if puffs.is_empty() {
        info!("No puffs found");
        return Ok(());
    }

    for puff in &puffs {
        info!(
            sig = %puff.sig().short(),
            username = %puff.username(),
            content_type = %puff.payload().content_type,
            time = format_timestamp_millis(puff.payload().time),
            tags = ?puff.payload().tags,
            parents = forum.count_parents(Some(puff.sig())),
            children = forum.count_children(Some(puff.sig())),
            "Puff"
        );
    }
    Ok(())
}

/// Execute render command
pub fn render(sig: &ContentHash, table: bool) -> Result<()> {
    let session = open_session()?;
    let forum = open_forum(&session)?;

    let puff = forum
        .store()
        .get_puff_by_sig(sig)?
        .ok_or_else(|| PuffError::not_found(format!("No local puff {}", sig.short())))?;
    let mode = if table { ViewMode::Table } else { ViewMode::Box };

    println!("{}", forum.processed_content(&puff, mode));
    Ok(())
}

/// Execute flag command
pub async fn flag(sig: &ContentHash) -> Result<()> {
    let session = open_session()?;
    let mut forum = open_forum(&session)?;

    let puff = forum.flag_puff(&session.wardrobe, sig).await?;

    info!(flagged = %sig.short(), flag = %puff.sig().short(), "✅ Flagged puff");
    Ok(())
}

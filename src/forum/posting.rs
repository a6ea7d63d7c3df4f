//! The forum: posting, flagging and listing puffs.

use super::constants::{
    DEFAULT_CONTENT_TYPE, FLAG_CONTENT_TYPE, META_PARENTS, META_RESERVED, META_ROUTES, META_TAGS,
    META_TIME,
};
use super::content::{ContentRegistry, ViewMode};
use super::filter::{FilterSpec, ListQuery, SortOrder};
use super::graph::FamilyGraph;
use super::meta_fields::MetaFieldRegistry;
use super::puff::{Metadata, Payload, Puff, Shell};
use super::store::{
    BackfillRequest, EnvelopeAlias, PuffStore, SigningMaterial, SubmitOutcome, UnsignedPuff,
};
use crate::config::PuffConfig;
use crate::dag::{current_timestamp_millis, ContentHash};
use crate::error::{PuffError, Result};
use crate::storage::{MemoryPersistence, Persistence, KEY_FLAGGED};
use crate::users::{UserRecord, UserRecords};
use crate::wardrobe::Wardrobe;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Parent sigs of a new post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Parents {
    #[default]
    None,
    One(ContentHash),
    Many(Vec<ContentHash>),
}

impl Parents {
    pub fn into_vec(self) -> Vec<ContentHash> {
        match self {
            Parents::None => Vec::new(),
            Parents::One(sig) => vec![sig],
            Parents::Many(sigs) => sigs,
        }
    }
}

impl From<ContentHash> for Parents {
    fn from(sig: ContentHash) -> Self {
        Parents::One(sig)
    }
}

impl From<Vec<ContentHash>> for Parents {
    fn from(sigs: Vec<ContentHash>) -> Self {
        Parents::Many(sigs)
    }
}

impl From<Option<ContentHash>> for Parents {
    fn from(sig: Option<ContentHash>) -> Self {
        sig.map_or(Parents::None, Parents::One)
    }
}

/// A post waiting to be signed and submitted.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub content_type: String,
    pub content: String,
    pub parents: Parents,
    /// Becomes the payload. `routes` is lifted out into the puff's routes.
    pub metadata: Metadata,
    /// Encrypt for these users. `None` posts publicly.
    pub recipients: Option<Vec<UserRecord>>,
    pub envelope_alias: Option<EnvelopeAlias>,
}

impl PostDraft {
    pub fn new(content_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            content: content.into(),
            parents: Parents::None,
            metadata: Metadata::new(),
            recipients: None,
            envelope_alias: None,
        }
    }

    pub fn with_parents(mut self, parents: impl Into<Parents>) -> Self {
        self.parents = parents.into();
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn encrypted_for(mut self, recipients: Vec<UserRecord>) -> Self {
        self.recipients = Some(recipients);
        self
    }

    pub fn with_envelope_alias(mut self, alias: EnvelopeAlias) -> Self {
        self.envelope_alias = Some(alias);
        self
    }
}

/// Forum-style view over a puff store.
///
/// Owns the familial graph, the content registry and the metadata field
/// registry. Mutators take `&mut self`; hosts sharing a forum across tasks
/// wrap it in a single lock.
pub struct Forum {
    store: Arc<dyn PuffStore>,
    users: Arc<dyn UserRecords>,
    persistence: Arc<dyn Persistence>,
    config: PuffConfig,
    graph: FamilyGraph,
    content: ContentRegistry,
    meta_fields: MetaFieldRegistry,
    post_sequence: u64,
}

impl Forum {
    /// Creates a forum with an empty graph. Call [`Forum::load_graph`] to
    /// link the puffs already in the store.
    pub fn new(
        store: Arc<dyn PuffStore>,
        users: Arc<dyn UserRecords>,
        config: PuffConfig,
    ) -> Result<Self> {
        let content = ContentRegistry::new(&config);
        let meta_fields = MetaFieldRegistry::with_defaults(&content.names())?;

        Ok(Self {
            store,
            users,
            persistence: Arc::new(MemoryPersistence::new()),
            config,
            graph: FamilyGraph::new(),
            content,
            meta_fields,
            post_sequence: 0,
        })
    }

    /// Persistence for the flagged list. Defaults to an in-memory map.
    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = persistence;
        self
    }

    /// Links every local shell to its parents. Returns the edges added.
    pub fn load_graph(&mut self) -> Result<usize> {
        let shells = self.store.get_all_local_shells()?;
        let added = self.graph.materialize_familial_edges(&shells);
        info!(shells = shells.len(), edges = added, "Loaded familial graph");
        Ok(added)
    }

    /// Relationship hook for puffs arriving from elsewhere.
    pub fn on_puffs_added(&mut self, shells: &[Shell]) -> usize {
        self.graph.materialize_familial_edges(shells)
    }

    /// Signs and submits a new post as the active identity.
    ///
    /// Validation happens first and leaves everything untouched on failure.
    /// Dropping the returned future before it completes abandons the post;
    /// [`Forum::post_sequence`] only advances for posts that were stored.
    pub async fn add_post(&mut self, wardrobe: &Wardrobe, draft: PostDraft) -> Result<Puff> {
        let PostDraft {
            content_type,
            content,
            parents,
            mut metadata,
            recipients,
            envelope_alias,
        } = draft;

        if content.chars().count() < self.config.minimum_puff_length {
            return Err(PuffError::validation(format!(
                "Content must be at least {} characters",
                self.config.minimum_puff_length
            )));
        }

        let content_type = if content_type.is_empty() {
            DEFAULT_CONTENT_TYPE.to_string()
        } else {
            content_type
        };
        if !self.config.allows_content_type(&content_type) {
            return Err(PuffError::config(format!(
                "Unsupported content type: {}",
                content_type
            )));
        }

        let parents = self.validate_parents(parents.into_vec())?;

        let mut routes = match metadata.remove(META_ROUTES) {
            Some(value) => from_meta::<Vec<String>>(META_ROUTES, value)?,
            None => parents.iter().map(|(_, author)| author.clone()).collect(),
        };
        dedup_in_order(&mut routes);

        let parent_sigs = parents.into_iter().map(|(sig, _)| sig).collect();
        let payload = build_payload(content_type, content, metadata, parent_sigs)?;

        let (username, capa) = wardrobe
            .current_identity()
            .map(|identity| (identity.username.clone(), identity.primary().map(|p| p.capa)))
            .ok_or_else(|| PuffError::identity_unavailable("No active identity to post as"))?;
        let record = self.resolve_user_record(&username, capa).await?;
        debug!(
            username = %record.username,
            capa = record.capa,
            latest = ?record.latest.map(|sig| sig.short()),
            "resolved user record"
        );

        routes.push(self.config.zone.clone());

        let signer = wardrobe
            .use_secure_info(|info| {
                let username = info.current_username?;
                let key = info.private_default_key?;
                Some(SigningMaterial::new(username, key))
            })
            .ok_or_else(|| {
                PuffError::identity_unavailable("Active identity has no private default key")
            })?;

        let unsigned = UnsignedPuff {
            payload,
            routes,
            recipients,
            envelope_alias,
        };
        let puff = self.sign_and_submit(&signer, unsigned).await?;

        self.graph.materialize_familial_edges([&puff.shell()]);
        self.post_sequence += 1;

        info!(
            sig = %puff.sig().short(),
            username = %puff.username(),
            content_type = %puff.payload().content_type,
            parents = puff.payload().parents.len(),
            sequence = self.post_sequence,
            "Posted puff"
        );
        Ok(puff)
    }

    /// Unique parents in first-seen order, each with its author.
    fn validate_parents(&self, sigs: Vec<ContentHash>) -> Result<Vec<(ContentHash, String)>> {
        let mut resolved: Vec<(ContentHash, String)> = Vec::with_capacity(sigs.len());
        for sig in sigs {
            let parent = self.store.get_puff_by_sig(&sig)?.ok_or_else(|| {
                PuffError::bad_parents(format!("Unknown parent puff {}", sig.short()))
            })?;
            if !resolved.iter().any(|(seen, _)| *seen == sig) {
                resolved.push((sig, parent.username().to_string()));
            }
        }
        Ok(resolved)
    }

    async fn resolve_user_record(&self, username: &str, capa: Option<u32>) -> Result<UserRecord> {
        let attempts = self.config.record_fetch_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.users.get_user_record(username, capa).await {
                Ok(record) => return Ok(record),
                Err(e) => {
                    warn!(
                        username = username,
                        attempt = attempt,
                        error = %e,
                        "user record lookup failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(PuffError::identity_unavailable(format!(
            "Failed to add post: could not access a valid user record for {}: {}",
            username,
            last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string())
        )))
    }

    async fn sign_and_submit(&self, signer: &SigningMaterial, unsigned: UnsignedPuff) -> Result<Puff> {
        let puff = self
            .store
            .build_signed_puff(signer, unsigned)
            .map_err(|e| PuffError::posting_failed(format!("could not build puff: {}", e)))?;

        match self.store.submit_puff(&puff).await {
            Ok(SubmitOutcome::Stored) => Ok(puff),
            Ok(SubmitOutcome::AlreadyExists) => Err(PuffError::conflict(format!(
                "Puff {} already exists",
                puff.sig().short()
            ))),
            Err(e) => Err(PuffError::posting_failed(e)),
        }
    }

    /// Publishes a moderation flag for `sig` and remembers it locally.
    ///
    /// Flags are signed with the active primary's admin key.
    pub async fn flag_puff(&mut self, wardrobe: &Wardrobe, sig: &ContentHash) -> Result<Puff> {
        let signer = wardrobe.use_secure_info(|info| {
            let username = info.current_username.ok_or_else(|| {
                PuffError::identity_unavailable(
                    "You must first set your username before you can flag content",
                )
            })?;
            let key = info.private_admin_key.ok_or_else(|| {
                PuffError::identity_unavailable(
                    "You must first set your private admin key before you can flag content",
                )
            })?;
            Ok::<_, PuffError>(SigningMaterial::new(username, key))
        })?;

        let mut payload = Payload::new(FLAG_CONTENT_TYPE, sig.to_hex());
        payload.time = Some(current_timestamp_millis());

        let puff = self
            .sign_and_submit(
                &signer,
                UnsignedPuff {
                    payload,
                    routes: Vec::new(),
                    recipients: None,
                    envelope_alias: None,
                },
            )
            .await?;

        if let Err(e) = self.remember_flag(sig) {
            warn!(sig = %sig.short(), error = %e, "Failed to record flagged puff");
        }
        info!(sig = %sig.short(), flagger = %signer.username, "Flagged puff");
        Ok(puff)
    }

    fn remember_flag(&self, sig: &ContentHash) -> Result<()> {
        let mut flagged = self.flagged_sigs()?;
        let hex = sig.to_hex();
        if !flagged.contains(&hex) {
            flagged.push(hex);
        }
        self.persistence
            .save(KEY_FLAGGED, &serde_json::to_value(&flagged)?)
    }

    /// Hex sigs of every puff flagged from this forum.
    pub fn flagged_sigs(&self) -> Result<Vec<String>> {
        match self.persistence.get(KEY_FLAGGED)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// Lists local puffs matching `filters`, sorted and paginated.
    ///
    /// Shells that cannot be materialized are dropped. When the page comes
    /// back shorter than `limit` the store is asked to backfill. A listing
    /// without a limit is unbounded, so it always asks.
    pub async fn list(
        &self,
        query: &ListQuery,
        filters: &FilterSpec,
        limit: Option<usize>,
    ) -> Result<Vec<Puff>> {
        let mut spec = filters.clone();
        if spec.focus.is_none() {
            spec.focus = query.focus;
        }
        let filter = spec.compile(self.store.as_ref())?;

        let mut shells: Vec<Shell> = self
            .store
            .get_all_local_shells()?
            .into_iter()
            .filter(|shell| filter.matches(shell))
            .collect();
        shells.sort_by(|a, b| a.time().cmp(&b.time()).then_with(|| a.sig.cmp(&b.sig)));
        if query.sort == SortOrder::Desc {
            shells.reverse();
        }

        let page = shells
            .into_iter()
            .skip(query.offset)
            .take(limit.unwrap_or(usize::MAX));

        let mut puffs = Vec::new();
        for shell in page {
            match self.store.materialize_from_shell(&shell).await {
                Ok(puff) => puffs.push(puff),
                Err(e) => debug!(sig = %shell.sig.short(), error = %e, "dropping unmaterializable shell"),
            }
        }

        if limit.map_or(true, |limit| puffs.len() < limit) {
            self.store.request_backfill(BackfillRequest {
                limit,
                have: puffs.len(),
                query: query.clone(),
                filters: spec,
            });
        }

        Ok(puffs)
    }

    /// Renders a puff for display, through the render cache.
    pub fn processed_content(&self, puff: &Puff, mode: ViewMode) -> String {
        self.content.processed_content(puff, mode)
    }

    pub fn count_parents(&self, sig: Option<&ContentHash>) -> usize {
        self.graph.count_parents(sig)
    }

    pub fn count_children(&self, sig: Option<&ContentHash>) -> usize {
        self.graph.count_children(sig)
    }

    /// Number of posts this forum has stored.
    pub fn post_sequence(&self) -> u64 {
        self.post_sequence
    }

    pub fn graph(&self) -> &FamilyGraph {
        &self.graph
    }

    pub fn content(&self) -> &ContentRegistry {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut ContentRegistry {
        &mut self.content
    }

    pub fn meta_fields(&self) -> &MetaFieldRegistry {
        &self.meta_fields
    }

    pub fn store(&self) -> &Arc<dyn PuffStore> {
        &self.store
    }

    pub fn config(&self) -> &PuffConfig {
        &self.config
    }
}

/// Turns caller metadata into a payload. Caller-set parents win over the
/// validated list; time defaults to now and tags to none.
fn build_payload(
    content_type: String,
    content: String,
    mut metadata: Metadata,
    validated_parents: Vec<ContentHash>,
) -> Result<Payload> {
    let parents = match metadata.remove(META_PARENTS) {
        Some(Value::Null) | None => validated_parents,
        Some(value) => from_meta(META_PARENTS, value)?,
    };
    let time = match metadata.remove(META_TIME) {
        Some(Value::Null) | None => current_timestamp_millis(),
        Some(value) => from_meta(META_TIME, value)?,
    };
    let tags = match metadata.remove(META_TAGS) {
        Some(Value::Null) | None => Vec::new(),
        Some(value) => from_meta(META_TAGS, value)?,
    };
    for key in META_RESERVED {
        metadata.remove(key);
    }

    Ok(Payload {
        content_type,
        content: Some(content),
        parents,
        time: Some(time),
        tags,
        extra: metadata,
    })
}

fn from_meta<T: DeserializeOwned>(key: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| PuffError::validation(format!("Invalid metadata field {}: {}", key, e)))
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

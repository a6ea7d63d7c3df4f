//! The content-addressed store the forum sits on.
//!
//! Signing, encryption, network fetch and propagation all live behind
//! [`PuffStore`]. The forum only ever sees puffs and shells.

use super::filter::{FilterSpec, ListQuery};
use super::puff::{Envelope, Payload, Puff, Shell};
use crate::dag::ContentHash;
use crate::error::{PuffError, Result};
use crate::users::UserRecord;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Result of handing a puff to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The puff is new and has been stored.
    Stored,
    /// A puff with the same sig was already present.
    AlreadyExists,
}

/// Key material for signing a new puff.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningMaterial {
    #[zeroize(skip)]
    pub username: String,
    pub private_key: String,
}

impl SigningMaterial {
    pub fn new(username: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            private_key: private_key.into(),
        }
    }
}

impl fmt::Debug for SigningMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningMaterial")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Throwaway alias used to sign the outer envelope of an encrypted puff.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EnvelopeAlias {
    #[zeroize(skip)]
    pub username: String,
    #[zeroize(skip)]
    pub capa: u32,
    pub private_default_key: String,
}

impl fmt::Debug for EnvelopeAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeAlias")
            .field("username", &self.username)
            .field("capa", &self.capa)
            .finish_non_exhaustive()
    }
}

/// Everything needed to build a puff except the signature.
#[derive(Debug, Clone)]
pub struct UnsignedPuff {
    pub payload: Payload,
    pub routes: Vec<String>,
    /// Records of the users to encrypt for. `None` builds a public puff.
    pub recipients: Option<Vec<UserRecord>>,
    pub envelope_alias: Option<EnvelopeAlias>,
}

/// Hint to the store that a listing came up short.
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillRequest {
    /// The listing's limit, `None` for an unbounded listing.
    pub limit: Option<usize>,
    /// How many puffs the listing could materialize.
    pub have: usize,
    pub query: ListQuery,
    pub filters: FilterSpec,
}

/// Local view of the content-addressed store.
#[async_trait]
pub trait PuffStore: Send + Sync {
    /// Every shell known locally.
    fn get_all_local_shells(&self) -> Result<Vec<Shell>>;

    /// The full local puff for `sig`, if present.
    fn get_puff_by_sig(&self, sig: &ContentHash) -> Result<Option<Puff>>;

    /// Fetches the full puff a shell describes.
    async fn materialize_from_shell(&self, shell: &Shell) -> Result<Puff>;

    /// Asks the store to go looking for more puffs. Must not block.
    fn request_backfill(&self, request: BackfillRequest);

    /// Signs an unsigned puff with the given key material.
    fn build_signed_puff(&self, signer: &SigningMaterial, unsigned: UnsignedPuff) -> Result<Puff>;

    /// Adds a puff to the store.
    async fn submit_puff(&self, puff: &Puff) -> Result<SubmitOutcome>;
}

#[derive(Serialize)]
struct SignedBody<'a> {
    username: &'a str,
    routes: &'a [String],
    payload: &'a Payload,
    envelope: Option<&'a Envelope>,
}

/// Signs `unsigned` the way the local stores do.
///
/// The sig is the SHA3-512 digest of the signer's key followed by the
/// serialized puff body, which gives stable, collision-detectable addresses
/// without real signatures.
pub(crate) fn sign_locally(signer: &SigningMaterial, unsigned: UnsignedPuff) -> Result<Puff> {
    if signer.private_key.is_empty() {
        return Err(PuffError::validation("Cannot sign a puff without a private key"));
    }

    let envelope = unsigned.recipients.as_ref().map(|records| Envelope {
        recipients: records.iter().map(|r| r.username.clone()).collect(),
        envelope_username: unsigned.envelope_alias.as_ref().map(|a| a.username.clone()),
    });

    let body = serde_json::to_vec(&SignedBody {
        username: &signer.username,
        routes: &unsigned.routes,
        payload: &unsigned.payload,
        envelope: envelope.as_ref(),
    })?;

    let mut preimage = Vec::with_capacity(signer.private_key.len() + body.len());
    preimage.extend_from_slice(signer.private_key.as_bytes());
    preimage.extend_from_slice(&body);
    let sig = ContentHash::of_bytes(&preimage);

    Ok(Puff::new(
        sig,
        signer.username.clone(),
        unsigned.routes,
        unsigned.payload,
        envelope,
    ))
}

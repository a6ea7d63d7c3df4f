//! Puffs: immutable, content-addressed posts.
//!
//! A puff is identified by its sig. Its payload carries the content type,
//! the content body, the ordered parent sigs and, for forum-style puffs, a
//! millisecond timestamp. A [`Shell`] is the same data minus the content
//! body, which is what is kept locally for filtering before a full puff has
//! been materialized.

use crate::dag::ContentHash;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Caller-supplied payload fields for a new post.
pub type Metadata = Map<String, Value>;

/// The signed body of a puff.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Content type name, used to pick a renderer.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Content body. Absent on shells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Ordered parent sigs.
    #[serde(default)]
    pub parents: Vec<ContentHash>,
    /// Creation time in milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Any further caller-supplied fields (`filename`, `license`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("type", &self.content_type)
            .field("content_len", &self.content.as_ref().map(String::len))
            .field("parents", &self.parents)
            .field("time", &self.time)
            .field("tags", &self.tags)
            .field("extra_keys", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Payload {
    /// Creates a payload with no parents, time or tags.
    pub fn new(content_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            content: Some(content.into()),
            parents: Vec::new(),
            time: None,
            tags: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Reads a string-valued extra field.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// Who an encrypted puff was addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Usernames of the recipients.
    pub recipients: Vec<String>,
    /// Throwaway alias the outer envelope was signed with, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope_username: Option<String>,
}

/// Capabilities derived once from a puff's payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    forum: bool,
    encrypted: bool,
}

impl Capabilities {
    fn derive(payload: &Payload, envelope: Option<&Envelope>) -> Self {
        Self {
            forum: payload.time.is_some(),
            encrypted: envelope.is_some(),
        }
    }

    /// True if the puff carries a timestamp and so can be threaded and sorted.
    pub fn is_forum_capable(&self) -> bool {
        self.forum
    }

    /// True if the puff was built for specific recipients.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }
}

#[derive(Deserialize)]
struct StoredPuff {
    sig: ContentHash,
    username: String,
    #[serde(default)]
    routes: Vec<String>,
    payload: Payload,
    #[serde(default)]
    envelope: Option<Envelope>,
}

impl From<StoredPuff> for Puff {
    fn from(stored: StoredPuff) -> Self {
        Puff::new(
            stored.sig,
            stored.username,
            stored.routes,
            stored.payload,
            stored.envelope,
        )
    }
}

/// An immutable post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredPuff")]
pub struct Puff {
    sig: ContentHash,
    username: String,
    routes: Vec<String>,
    payload: Payload,
    #[serde(skip_serializing_if = "Option::is_none")]
    envelope: Option<Envelope>,
    #[serde(skip)]
    capabilities: Capabilities,
}

impl Puff {
    /// Assembles a puff. Signing is the store's job; this only fixes the
    /// derived capabilities.
    pub fn new(
        sig: ContentHash,
        username: impl Into<String>,
        routes: Vec<String>,
        payload: Payload,
        envelope: Option<Envelope>,
    ) -> Self {
        let capabilities = Capabilities::derive(&payload, envelope.as_ref());
        Self {
            sig,
            username: username.into(),
            routes,
            payload,
            envelope,
            capabilities,
        }
    }

    pub fn sig(&self) -> &ContentHash {
        &self.sig
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn routes(&self) -> &[String] {
        &self.routes
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// The content body, or `""` if this puff has none.
    pub fn content(&self) -> &str {
        self.payload.content.as_deref().unwrap_or("")
    }

    /// Strips the content body.
    pub fn shell(&self) -> Shell {
        let mut payload = self.payload.clone();
        payload.content = None;
        Shell {
            sig: self.sig,
            username: self.username.clone(),
            routes: self.routes.clone(),
            payload,
        }
    }
}

/// Filterable metadata of a puff, without the content body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shell {
    pub sig: ContentHash,
    pub username: String,
    #[serde(default)]
    pub routes: Vec<String>,
    pub payload: Payload,
}

impl Shell {
    /// Sort key: payload time, with untimed shells first.
    pub fn time(&self) -> u64 {
        self.payload.time.unwrap_or(0)
    }
}

//! Forum-style puffs over a content-addressed store.
//!
//! Puffs form a DAG through their payload's parent sigs. This module owns
//! everything between the caller and the store:
//! - **Posting**: identity resolution, payload construction, submission
//! - **Family graph**: parent/child edges, kept idempotent
//! - **Filtering**: declarative specs compiled to predicates over shells
//! - **Rendering**: content types by name, with a per-puff render cache
//!
//! ## Shape
//!
//! ```text
//! root puff (no parents)
//!     └── reply
//!             └── reply to reply (may list several parents)
//! ```
//!
//! The store itself (signing, network fetch, propagation) sits behind
//! [`PuffStore`]. [`MemoryPuffStore`] is the in-process implementation and
//! [`RocksPuffStore`] keeps puffs on disk.

pub mod constants;
mod content;
mod filter;
mod graph;
mod memory;
mod meta_fields;
mod posting;
mod puff;
mod rocks;
mod store;

pub use content::{escape_html, BuiltinType, ContentRegistry, ContentRenderer, RenderCache, ViewMode};
pub use filter::{FilterSpec, ListQuery, PuffFilter, SortOrder};
pub use graph::{EdgeLabel, FamilyGraph};
pub use memory::MemoryPuffStore;
pub use meta_fields::{FieldContext, MetaField, MetaFieldKind, MetaFieldRegistry};
pub use posting::{Forum, Parents, PostDraft};
pub use puff::{Capabilities, Envelope, Metadata, Payload, Puff, Shell};
pub use rocks::RocksPuffStore;
pub use store::{
    BackfillRequest, EnvelopeAlias, PuffStore, SigningMaterial, SubmitOutcome, UnsignedPuff,
};

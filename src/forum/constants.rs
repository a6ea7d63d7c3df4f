//! Shared constants for puff construction.

// =============================================================================
// Content Types
// =============================================================================

/// Content type used when a post does not name one.
pub const DEFAULT_CONTENT_TYPE: &str = "text";

/// Content type of moderation flags. The content is the flagged sig.
pub const FLAG_CONTENT_TYPE: &str = "flagPuff";

// =============================================================================
// Reserved Metadata Keys
// =============================================================================

/// Overrides the routes derived from the parents' authors.
pub const META_ROUTES: &str = "routes";

/// Overrides the validated parent list in the payload.
pub const META_PARENTS: &str = "parents";

/// Creation time in milliseconds.
pub const META_TIME: &str = "time";

pub const META_TAGS: &str = "tags";

/// Keys owned by the payload itself; stripped from caller metadata.
pub const META_RESERVED: [&str; 2] = ["type", "content"];

//! Error types for Puffball operations.

use thiserror::Error;

/// Result type alias for Puffball operations.
pub type Result<T> = std::result::Result<T, PuffError>;

/// Stable error taxonomy exposed to callers.
///
/// Several [`PuffError`] variants share a kind; callers that only need to
/// branch on the category should match on this instead of the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input rejected before any state was touched.
    Validation,
    /// An identity, alias or node referenced by name does not exist.
    NotFound,
    /// A network-dependent resource could not be reached.
    Unavailable,
    /// The node already exists in the store.
    Conflict,
    /// Unsupported or disallowed configuration.
    Config,
    /// Storage, serialization or I/O failure.
    Internal,
}

/// Main error type for Puffball operations.
#[derive(Error, Debug)]
pub enum PuffError {
    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// One or more parent sigs do not resolve to a known local puff
    #[error("Bad parents: {0}")]
    BadParents(String),

    /// Unknown identity, alias or puff
    #[error("Not found: {0}")]
    NotFound(String),

    /// The authoritative user record could not be resolved
    #[error("Identity unavailable: {0}")]
    IdentityUnavailable(String),

    /// A puff with the same sig already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Submission to the store failed
    #[error("Posting failed: {0}")]
    PostingFailed(String),

    /// Persistence backend errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PuffError {
    /// Creates a new validation error.
    pub fn validation<T: ToString>(msg: T) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Creates a new bad parents error.
    pub fn bad_parents<T: ToString>(msg: T) -> Self {
        Self::BadParents(msg.to_string())
    }

    /// Creates a new not found error.
    pub fn not_found<T: ToString>(msg: T) -> Self {
        Self::NotFound(msg.to_string())
    }

    /// Creates a new identity unavailable error.
    pub fn identity_unavailable<T: ToString>(msg: T) -> Self {
        Self::IdentityUnavailable(msg.to_string())
    }

    /// Creates a new conflict error.
    pub fn conflict<T: ToString>(msg: T) -> Self {
        Self::Conflict(msg.to_string())
    }

    /// Creates a new configuration error.
    pub fn config<T: ToString>(msg: T) -> Self {
        Self::Config(msg.to_string())
    }

    /// Creates a new posting failed error.
    pub fn posting_failed<T: ToString>(msg: T) -> Self {
        Self::PostingFailed(msg.to_string())
    }

    /// Creates a new persistence error.
    pub fn persistence<T: ToString>(msg: T) -> Self {
        Self::Persistence(msg.to_string())
    }

    /// Creates a new serialization error.
    pub fn serialization<T: ToString>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Returns the stable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PuffError::Validation(_) | PuffError::BadParents(_) => ErrorKind::Validation,
            PuffError::NotFound(_) => ErrorKind::NotFound,
            PuffError::IdentityUnavailable(_) | PuffError::PostingFailed(_) => {
                ErrorKind::Unavailable
            }
            PuffError::Conflict(_) => ErrorKind::Conflict,
            PuffError::Config(_) => ErrorKind::Config,
            PuffError::Persistence(_) | PuffError::Serialization(_) | PuffError::Io(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<serde_json::Error> for PuffError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            PuffError::bad_parents("missing").kind(),
            ErrorKind::Validation
        );
        assert_eq!(PuffError::not_found("alice").kind(), ErrorKind::NotFound);
        assert_eq!(
            PuffError::identity_unavailable("offline").kind(),
            ErrorKind::Unavailable
        );
        assert_eq!(PuffError::conflict("dup").kind(), ErrorKind::Conflict);
        assert_eq!(PuffError::config("nope").kind(), ErrorKind::Config);
    }

    #[test]
    fn test_error_display() {
        let err = PuffError::not_found("No identity found with username \"bob\"");
        assert_eq!(
            err.to_string(),
            "Not found: No identity found with username \"bob\""
        );
    }
}

use std::time::Duration;

use thiserror::Error;

use stowage_core::{AttachmentError, InvalidContentId};

/// Errors from metadata backend and index operations.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("record not found: {0}")]
    NotFound(String),

    /// A stored record is missing a field or holds a value that cannot be
    /// decoded.
    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Rebuilding the time index found no records at all. Refusing to proceed
    /// keeps a dropped connection from looking like an empty store.
    #[error("no records found under prefix {prefix:?}; refusing to rebuild an empty index")]
    EmptyEnumeration { prefix: String },

    #[error(transparent)]
    InvalidId(#[from] InvalidContentId),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl MetadataError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<MetadataError> for AttachmentError {
    fn from(e: MetadataError) -> Self {
        match e {
            MetadataError::NotFound(key) => Self::NotFound(key),
            MetadataError::InvalidId(e) => Self::Validation(e.to_string()),
            other => Self::Backend(other.to_string()),
        }
    }
}

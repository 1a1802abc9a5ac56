use std::time::Duration;

use thiserror::Error;

use stowage_core::AttachmentError;

/// Errors from content store operations.
#[derive(Debug, Error)]
pub enum ContentError {
    /// No object exists for the identifier.
    #[error("content not found: {0}")]
    NotFound(String),

    /// The backend does not implement an optional capability.
    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    /// The object is larger than the caller is willing to buffer.
    #[error("content too large: exceeds limit of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl ContentError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<ContentError> for AttachmentError {
    fn from(e: ContentError) -> Self {
        match e {
            ContentError::NotFound(id) => Self::NotFound(id),
            ContentError::TooLarge { .. } => Self::Validation(e.to_string()),
            other => Self::Backend(other.to_string()),
        }
    }
}

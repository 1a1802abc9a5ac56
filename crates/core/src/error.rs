use thiserror::Error;

use crate::id::InvalidContentId;

/// Caller-facing error taxonomy for attachment operations.
///
/// Component errors (content store, metadata index, thumbnailer) collapse
/// into one of these three classes at the service boundary.
#[derive(Debug, Error)]
pub enum AttachmentError {
    /// The identifier is absent from the metadata index or the content store.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request itself is unacceptable (bad identifier, oversized upload,
    /// malformed body).
    #[error("validation error: {0}")]
    Validation(String),

    /// Any failure inside a content, metadata, or image backend. The message
    /// is for logs; callers must not echo it to clients.
    #[error("backend error: {0}")]
    Backend(String),
}

impl AttachmentError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<InvalidContentId> for AttachmentError {
    fn from(e: InvalidContentId) -> Self {
        Self::Validation(e.to_string())
    }
}

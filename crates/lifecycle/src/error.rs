use std::time::Duration;

use thiserror::Error;

use stowage_content::ContentError;
use stowage_core::AttachmentError;
use stowage_metadata::MetadataError;
use stowage_thumbnail::ThumbnailError;

/// Errors from lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("content store error: {0}")]
    Content(#[from] ContentError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("thumbnail error: {0}")]
    Thumbnail(#[from] ThumbnailError),

    /// A backend call did not complete within its time limit.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("validation error: {0}")]
    Validation(String),

    /// The service was assembled without a required component.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<LifecycleError> for AttachmentError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::Content(inner) => inner.into(),
            LifecycleError::Metadata(inner) => inner.into(),
            LifecycleError::Thumbnail(inner) => inner.into(),
            LifecycleError::Validation(msg) => Self::Validation(msg),
            other @ (LifecycleError::Timeout { .. } | LifecycleError::Configuration(_)) => {
                Self::Backend(other.to_string())
            }
        }
    }
}

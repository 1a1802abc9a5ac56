use thiserror::Error;

use stowage_content::ContentError;
use stowage_core::AttachmentError;

/// Errors from thumbnail generation and caching.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    /// The source bytes are not a decodable image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode thumbnail: {0}")]
    Encode(String),

    /// Fetching the original from the content store failed.
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking resize task panicked or was cancelled.
    #[error("resize task failed: {0}")]
    Task(String),
}

impl From<ThumbnailError> for AttachmentError {
    fn from(e: ThumbnailError) -> Self {
        match e {
            ThumbnailError::Content(inner) => inner.into(),
            other => Self::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_original_stays_not_found() {
        let err: AttachmentError =
            ThumbnailError::Content(ContentError::NotFound("abcd".into())).into();
        assert!(err.is_not_found());
    }

    #[test]
    fn decode_failure_is_backend() {
        let err: AttachmentError = ThumbnailError::Decode("bad magic".into()).into();
        assert!(matches!(err, AttachmentError::Backend(_)));
    }
}

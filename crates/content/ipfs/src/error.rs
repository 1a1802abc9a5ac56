use reqwest::StatusCode;
use thiserror::Error;

use stowage_content::ContentError;

/// Errors specific to talking to an IPFS daemon.
///
/// Converted into [`ContentError`] at the trait boundary.
#[derive(Debug, Error)]
pub(crate) enum IpfsError {
    /// An HTTP-level transport error occurred.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The daemon answered with a non-success status.
    #[error("IPFS API error (HTTP {status}): {message}")]
    Api { status: StatusCode, message: String },
}

impl IpfsError {
    /// Whether the daemon's error message contains `needle`.
    pub(crate) fn mentions(&self, needle: &str) -> bool {
        match self {
            Self::Api { message, .. } => message.to_ascii_lowercase().contains(needle),
            Self::Http(_) => false,
        }
    }
}

impl From<IpfsError> for ContentError {
    fn from(err: IpfsError) -> Self {
        match err {
            IpfsError::Http(e) if e.is_connect() || e.is_timeout() => {
                ContentError::Connection(e.to_string())
            }
            other => ContentError::Backend(other.to_string()),
        }
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use stowage_core::AttachmentError;

/// Errors that can occur when running the stowage server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An attachment operation failed.
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    /// The request body could not be understood.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The upload exceeds the configured size limit.
    #[error("upload exceeds the size limit")]
    PayloadTooLarge,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Attachment(AttachmentError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "not found".to_owned())
            }
            Self::Attachment(AttachmentError::Validation(msg)) | Self::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            Self::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            Self::Attachment(AttachmentError::Backend(_)) | Self::Config(_) | Self::Io(_) => {
                error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

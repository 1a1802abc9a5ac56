use serde::{Deserialize, Serialize};

/// Response body of `POST /upload`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Content identifier of the stored attachment.
    pub id: String,
    /// Filename given by the client.
    pub filename: String,
    /// MIME type recorded for the attachment.
    pub mime: String,
}

/// Response body of `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub metrics: MetricsResponse,
}

/// Lifecycle counters since process start.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub uploads: u64,
    pub deletes: u64,
    pub sweeps: u64,
    pub sweep_failures: u64,
    pub attachments_expired: u64,
    pub metadata_purged: u64,
    pub deletion_failures: u64,
    pub pins_succeeded: u64,
    pub pins_failed: u64,
    pub missing_found: u64,
}

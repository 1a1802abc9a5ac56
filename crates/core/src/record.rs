use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ContentId;

/// Metadata stored for every attachment.
///
/// Created once at upload and never mutated. Removed together with its
/// time-index entry by an explicit delete or by the cleaner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    /// Content-derived identifier.
    pub id: ContentId,
    /// MIME type declared at upload (e.g. `"image/png"`).
    pub mime_type: String,
    /// Size of the stored content in bytes.
    pub size_bytes: u64,
    /// Wall-clock time of the upload.
    pub uploaded_at: DateTime<Utc>,
}

impl AttachmentRecord {
    /// Whether the record was uploaded at or before `cutoff`.
    #[must_use]
    pub fn is_expired_at(&self, cutoff: DateTime<Utc>) -> bool {
        self.uploaded_at <= cutoff
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn expiry_is_inclusive_of_cutoff() {
        let at = Utc.timestamp_millis_opt(1_000).unwrap();
        let record = AttachmentRecord {
            id: ContentId::parse("abcd").unwrap(),
            mime_type: "text/plain".into(),
            size_bytes: 3,
            uploaded_at: at,
        };
        assert!(record.is_expired_at(at));
        assert!(!record.is_expired_at(Utc.timestamp_millis_opt(999).unwrap()));
    }
}

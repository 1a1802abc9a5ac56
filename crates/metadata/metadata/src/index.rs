use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use tracing::{debug, info, warn};

use stowage_core::{AttachmentRecord, Clock, ContentId, SystemClock};

use crate::backend::MetadataBackend;
use crate::error::MetadataError;
use crate::timestamp::parse_timestamp;

const FIELD_DATETIME: &str = "datetime";
const FIELD_MIMETYPE: &str = "mimetype";
const FIELD_SIZE: &str = "size";

/// Records read concurrently while rebuilding the time index.
const REBUILD_CONCURRENCY: usize = 32;

/// Outcome of [`MetadataIndex::rebuild_time_index`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Records written into the time index.
    pub indexed: usize,
    /// Records left out because their key, identifier or timestamp could not
    /// be decoded, or because they vanished mid-scan.
    pub skipped: usize,
    /// Index members removed because no record backs them any more.
    pub pruned: usize,
}

/// Per-attachment metadata records plus a time-ordered secondary index.
///
/// Each record lives in a hash at `<prefix><id>` with the fields `datetime`
/// (epoch milliseconds), `mimetype` and `size`. The time index is a sorted set
/// named `index` whose members are identifiers scored by upload time.
///
/// The record and its index entry are written and removed as two separate
/// backend calls. A failure between them leaves one without the other; the
/// record is always written first so a half-finished upload never produces an
/// index entry with nothing behind it.
pub struct MetadataIndex {
    backend: Arc<dyn MetadataBackend>,
    prefix: String,
    index: String,
    clock: Arc<dyn Clock>,
}

impl MetadataIndex {
    /// Create an index over `backend` using the system clock.
    pub fn new(
        backend: Arc<dyn MetadataBackend>,
        prefix: impl Into<String>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            index: index.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used to stamp new records.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The record key prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The name of the time-ordered index.
    pub fn index_name(&self) -> &str {
        &self.index
    }

    fn record_key(&self, id: &ContentId) -> String {
        format!("{}{id}", self.prefix)
    }

    /// Write the record for `id` stamped with the current time, then add it to
    /// the time index.
    ///
    /// # Errors
    ///
    /// Propagates backend failures. If the index write fails the record has
    /// already been stored.
    pub async fn add_record(
        &self,
        id: &ContentId,
        mime_type: &str,
        size_bytes: u64,
    ) -> Result<AttachmentRecord, MetadataError> {
        let uploaded_at = self.clock.now();
        let millis = uploaded_at.timestamp_millis();
        let key = self.record_key(id);
        debug!(%key, "adding metadata record");

        let datetime = millis.to_string();
        let size = size_bytes.to_string();
        self.backend
            .set_fields(
                &key,
                &[
                    (FIELD_DATETIME, datetime.as_str()),
                    (FIELD_MIMETYPE, mime_type),
                    (FIELD_SIZE, size.as_str()),
                ],
            )
            .await?;
        self.backend
            .sorted_insert(&self.index, millis, id.as_str())
            .await?;

        Ok(AttachmentRecord {
            id: id.clone(),
            mime_type: mime_type.to_owned(),
            size_bytes,
            uploaded_at,
        })
    }

    /// Read the record for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::NotFound`] if there is no record and
    /// [`MetadataError::Corrupt`] if its fields cannot be decoded.
    pub async fn get_record(&self, id: &ContentId) -> Result<AttachmentRecord, MetadataError> {
        let key = self.record_key(id);
        debug!(%key, "reading metadata record");
        let fields = self
            .backend
            .get_fields(&key)
            .await?
            .ok_or_else(|| MetadataError::NotFound(key.clone()))?;
        decode_record(&key, id.clone(), &fields)
    }

    /// Remove the record for `id` and its time-index entry. Removing an
    /// absent record succeeds.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn delete_record(&self, id: &ContentId) -> Result<(), MetadataError> {
        let key = self.record_key(id);
        debug!(%key, "deleting metadata record");
        self.backend.delete_key(&key).await?;
        self.backend.sorted_remove(&self.index, id.as_str()).await?;
        Ok(())
    }

    /// Identifiers uploaded within `[from, to]`, oldest first. `None` leaves
    /// that side unbounded.
    ///
    /// Index members that are not valid identifiers are skipped with a
    /// warning.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn range_by_upload_time(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ContentId>, MetadataError> {
        let members = self
            .backend
            .sorted_range_by_score(
                &self.index,
                from.map(|t| t.timestamp_millis()),
                to.map(|t| t.timestamp_millis()),
            )
            .await?;

        Ok(members
            .into_iter()
            .filter_map(|member| match ContentId::parse(member) {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(index = %self.index, error = %e, "skipping malformed index member");
                    None
                }
            })
            .collect())
    }

    /// Every identifier that has a record, found by key-prefix enumeration
    /// rather than through the time index.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn list_ids(&self) -> Result<Vec<ContentId>, MetadataError> {
        let keys = self.record_keys().await?;
        Ok(keys.iter().filter_map(|key| self.id_from_key(key)).collect())
    }

    /// Keys under the record prefix. The index itself may share the prefix
    /// (`attachments_` and `attachments_datetime`) and is never a record.
    async fn record_keys(&self) -> Result<Vec<String>, MetadataError> {
        let mut keys = self.backend.list_keys_by_prefix(&self.prefix).await?;
        keys.retain(|key| *key != self.index);
        Ok(keys)
    }

    fn id_from_key(&self, key: &str) -> Option<ContentId> {
        let raw = key.strip_prefix(&self.prefix)?;
        match ContentId::parse(raw) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(%key, error = %e, "skipping record with malformed key");
                None
            }
        }
    }

    /// Rewrite the time index from the stored timestamp of every record.
    ///
    /// Legacy records whose `datetime` is a date string are normalized to
    /// epoch milliseconds in the index. Records that cannot be decoded are
    /// logged and skipped. Index members whose record no longer exists are
    /// removed afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::EmptyEnumeration`] if no record keys are
    /// found at all, and propagates backend failures.
    pub async fn rebuild_time_index(&self) -> Result<RebuildReport, MetadataError> {
        info!(prefix = %self.prefix, index = %self.index, "rebuilding time index");
        let keys = self.record_keys().await?;
        if keys.is_empty() {
            return Err(MetadataError::EmptyEnumeration {
                prefix: self.prefix.clone(),
            });
        }
        info!(count = keys.len(), "found attachment records");
        let known: HashSet<String> = keys
            .iter()
            .filter_map(|key| key.strip_prefix(&self.prefix))
            .map(str::to_owned)
            .collect();

        let outcomes: Vec<Result<bool, MetadataError>> = stream::iter(keys)
            .map(|key| async move { self.reindex_one(&key).await })
            .buffer_unordered(REBUILD_CONCURRENCY)
            .collect()
            .await;

        let mut report = RebuildReport::default();
        for outcome in outcomes {
            if outcome? {
                report.indexed += 1;
            } else {
                report.skipped += 1;
            }
        }
        report.pruned = self.prune_orphans(&known).await?;

        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            pruned = report.pruned,
            "time index rebuilt"
        );
        Ok(report)
    }

    /// Remove index members outside `known` whose record is really gone.
    ///
    /// The record is re-read before removal so an upload that landed after
    /// the key listing keeps its entry.
    async fn prune_orphans(&self, known: &HashSet<String>) -> Result<usize, MetadataError> {
        let members = self
            .backend
            .sorted_range_by_score(&self.index, None, None)
            .await?;
        let mut pruned = 0;
        for member in members.iter().filter(|m| !known.contains(*m)) {
            let key = format!("{}{member}", self.prefix);
            if self.backend.get_fields(&key).await?.is_some() {
                continue;
            }
            self.backend.sorted_remove(&self.index, member).await?;
            debug!(%member, "pruned stale index member");
            pruned += 1;
        }
        Ok(pruned)
    }

    /// Index one record. `Ok(false)` means the record was skipped.
    async fn reindex_one(&self, key: &str) -> Result<bool, MetadataError> {
        let Some(id) = self.id_from_key(key) else {
            return Ok(false);
        };
        let Some(fields) = self.backend.get_fields(key).await? else {
            debug!(%key, "record vanished during rebuild");
            return Ok(false);
        };
        let Some(raw) = fields.get(FIELD_DATETIME) else {
            warn!(%key, "record has no datetime field");
            return Ok(false);
        };
        let Some(uploaded_at) = parse_timestamp(raw) else {
            warn!(%key, datetime = %raw, "unparseable datetime");
            return Ok(false);
        };

        self.backend
            .sorted_insert(&self.index, uploaded_at.timestamp_millis(), id.as_str())
            .await?;
        debug!(%id, "added to time index");
        Ok(true)
    }
}

fn decode_record(
    key: &str,
    id: ContentId,
    fields: &HashMap<String, String>,
) -> Result<AttachmentRecord, MetadataError> {
    let corrupt = |reason: String| MetadataError::Corrupt {
        key: key.to_owned(),
        reason,
    };
    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| corrupt(format!("missing field {name}")))
    };

    let raw_datetime = field(FIELD_DATETIME)?;
    let uploaded_at = parse_timestamp(raw_datetime)
        .ok_or_else(|| corrupt(format!("unparseable datetime {raw_datetime:?}")))?;
    let mime_type = field(FIELD_MIMETYPE)?.clone();
    let raw_size = field(FIELD_SIZE)?;
    let size_bytes = raw_size
        .trim()
        .parse::<u64>()
        .map_err(|e| corrupt(format!("bad size {raw_size:?}: {e}")))?;

    Ok(AttachmentRecord {
        id,
        mime_type,
        size_bytes,
        uploaded_at,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn id() -> ContentId {
        ContentId::parse("QmRecord01").unwrap()
    }

    #[test]
    fn decodes_numeric_record() {
        let record = decode_record(
            "attachments_QmRecord01",
            id(),
            &fields(&[
                ("datetime", "1700000000000"),
                ("mimetype", "image/png"),
                ("size", "2048"),
            ]),
        )
        .unwrap();
        assert_eq!(record.mime_type, "image/png");
        assert_eq!(record.size_bytes, 2048);
        assert_eq!(record.uploaded_at, Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());
    }

    #[test]
    fn decodes_legacy_datetime() {
        let record = decode_record(
            "attachments_QmRecord01",
            id(),
            &fields(&[
                ("datetime", "Tue, 14 Nov 2023 22:13:20 GMT"),
                ("mimetype", "text/plain"),
                ("size", "5"),
            ]),
        )
        .unwrap();
        assert_eq!(record.uploaded_at, Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());
    }

    #[test]
    fn missing_field_is_corrupt() {
        let err = decode_record(
            "attachments_QmRecord01",
            id(),
            &fields(&[("datetime", "1700000000000"), ("size", "5")]),
        )
        .unwrap_err();
        assert!(
            matches!(err, MetadataError::Corrupt { ref reason, .. } if reason.contains("mimetype"))
        );
    }

    #[test]
    fn bad_size_is_corrupt() {
        let err = decode_record(
            "attachments_QmRecord01",
            id(),
            &fields(&[
                ("datetime", "1700000000000"),
                ("mimetype", "text/plain"),
                ("size", "-1"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, MetadataError::Corrupt { .. }));
    }
}

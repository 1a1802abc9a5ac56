use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use stowage_content::{ByteStream, ContentStore};
use stowage_core::{AttachmentError, AttachmentRecord, Clock, ContentId, SystemClock};
use stowage_metadata::{MetadataIndex, RebuildReport};
use stowage_thumbnail::{Thumbnail, ThumbnailCache};

use crate::cleaner::{Cleaner, CleanerConfig, SweepReport};
use crate::error::LifecycleError;
use crate::metrics::LifecycleMetrics;
use crate::reconciler::{ReconcileReport, Reconciler, ReconcilerConfig};
use crate::timeout::bounded;

/// MIME type recorded when an upload declares none.
const FALLBACK_MIME: &str = "application/octet-stream";

/// Configuration for the request-path operations of [`AttachmentService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: u64,
    /// Limit for each single content or metadata call.
    pub call_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// A stored attachment ready to be streamed.
pub struct Attachment {
    pub record: AttachmentRecord,
    pub stream: ByteStream,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

/// The outward surface of the attachment lifecycle: upload, fetch, delete,
/// plus the maintenance runs.
///
/// Uploads write content first and metadata second, so a crash in between
/// leaves an unreferenced object rather than a record that points nowhere.
pub struct AttachmentService {
    content: Arc<dyn ContentStore>,
    index: Arc<MetadataIndex>,
    thumbnails: Arc<ThumbnailCache>,
    cleaner: Cleaner,
    reconciler: Reconciler,
    metrics: Arc<LifecycleMetrics>,
    config: ServiceConfig,
}

impl AttachmentService {
    pub fn builder() -> AttachmentServiceBuilder {
        AttachmentServiceBuilder::new()
    }

    pub fn metrics(&self) -> &Arc<LifecycleMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn cleaner(&self) -> &Cleaner {
        &self.cleaner
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn index(&self) -> &Arc<MetadataIndex> {
        &self.index
    }

    /// Store `data` and record it under the identifier the content store
    /// assigns. Uploading identical bytes again yields the same identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::Validation`] for oversized uploads or a
    /// malformed MIME type, and [`AttachmentError::Backend`] if either store
    /// fails.
    pub async fn upload(
        &self,
        data: Bytes,
        mime_type: &str,
    ) -> Result<AttachmentRecord, AttachmentError> {
        let size = data.len() as u64;
        if size > self.config.max_upload_bytes {
            return Err(AttachmentError::Validation(format!(
                "upload of {size} bytes exceeds limit of {} bytes",
                self.config.max_upload_bytes
            )));
        }
        let mime_type = normalize_mime(mime_type)?;

        let id = bounded("content.put", self.config.call_timeout, self.content.put(data)).await?;
        let record = bounded(
            "metadata.add_record",
            self.config.call_timeout,
            self.index.add_record(&id, &mime_type, size),
        )
        .await?;

        self.metrics.increment_uploads();
        info!(%id, mime = %record.mime_type, size, "stored attachment");
        Ok(record)
    }

    /// Look up the record for `id`, then open its content.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::NotFound`] if either the record or the
    /// content is missing.
    pub async fn fetch(&self, id: &ContentId) -> Result<Attachment, AttachmentError> {
        let record = self.record(id).await?;
        let stream = bounded("content.get", self.config.call_timeout, self.content.get(id)).await?;
        debug!(%id, "serving attachment");
        Ok(Attachment { record, stream })
    }

    /// Look up the record for `id`, then serve a thumbnail near `size`.
    ///
    /// The returned [`Thumbnail::kind`] says whether the stream is a resized
    /// JPEG or the original served because resizing failed.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::NotFound`] if the record or the original
    /// is missing.
    pub async fn fetch_thumbnail(
        &self,
        id: &ContentId,
        size: u32,
    ) -> Result<(AttachmentRecord, Thumbnail), AttachmentError> {
        let record = self.record(id).await?;
        let thumbnail = bounded(
            "thumbnail.serve",
            self.config.call_timeout,
            self.thumbnails.serve(id, size),
        )
        .await?;
        Ok((record, thumbnail))
    }

    /// Remove content, metadata and cached thumbnails of `id`. Removing an
    /// absent attachment succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::Backend`] if a store fails. When the content
    /// delete fails the metadata is kept.
    pub async fn delete(&self, id: &ContentId) -> Result<(), AttachmentError> {
        self.cleaner.delete_attachment(id).await?;
        self.metrics.increment_deletes();
        info!(%id, "deleted attachment");
        Ok(())
    }

    /// Run one cleaner sweep.
    ///
    /// # Errors
    ///
    /// See [`Cleaner::sweep`].
    pub async fn run_cleanup_sweep(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SweepReport, AttachmentError> {
        Ok(self.cleaner.sweep(cancel).await?)
    }

    /// Pin every known attachment and report what is missing locally.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::reconcile`].
    pub async fn reconcile(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport, AttachmentError> {
        Ok(self.reconciler.reconcile(cancel).await?)
    }

    /// Rebuild the time index from the stored records.
    ///
    /// # Errors
    ///
    /// See [`MetadataIndex::rebuild_time_index`].
    pub async fn rebuild_time_index(&self) -> Result<RebuildReport, AttachmentError> {
        Ok(self
            .index
            .rebuild_time_index()
            .await
            .map_err(LifecycleError::from)?)
    }

    async fn record(&self, id: &ContentId) -> Result<AttachmentRecord, LifecycleError> {
        bounded(
            "metadata.get_record",
            self.config.call_timeout,
            self.index.get_record(id),
        )
        .await
    }
}

/// Check that `raw` looks like `type/subtype` (parameters allowed) and
/// return it trimmed. An empty value becomes `application/octet-stream`.
fn normalize_mime(raw: &str) -> Result<String, AttachmentError> {
    let mime = raw.trim();
    if mime.is_empty() {
        return Ok(FALLBACK_MIME.to_owned());
    }
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    let valid = essence.split_once('/').is_some_and(|(kind, sub)| {
        let token = |s: &str| {
            !s.is_empty()
                && s.bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b"!#$&^_.+-".contains(&b))
        };
        token(kind) && token(sub)
    });
    if valid && !mime.chars().any(char::is_control) {
        Ok(mime.to_owned())
    } else {
        Err(AttachmentError::Validation(format!(
            "invalid MIME type {mime:?}"
        )))
    }
}

/// Builder for [`AttachmentService`].
pub struct AttachmentServiceBuilder {
    content: Option<Arc<dyn ContentStore>>,
    index: Option<Arc<MetadataIndex>>,
    thumbnails: Option<Arc<ThumbnailCache>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<LifecycleMetrics>,
    service: ServiceConfig,
    cleaner: CleanerConfig,
    reconciler: ReconcilerConfig,
}

impl Default for AttachmentServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AttachmentServiceBuilder {
    pub fn new() -> Self {
        Self {
            content: None,
            index: None,
            thumbnails: None,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(LifecycleMetrics::default()),
            service: ServiceConfig::default(),
            cleaner: CleanerConfig::default(),
            reconciler: ReconcilerConfig::default(),
        }
    }

    #[must_use]
    pub fn content(mut self, content: Arc<dyn ContentStore>) -> Self {
        self.content = Some(content);
        self
    }

    #[must_use]
    pub fn index(mut self, index: Arc<MetadataIndex>) -> Self {
        self.index = Some(index);
        self
    }

    #[must_use]
    pub fn thumbnails(mut self, thumbnails: Arc<ThumbnailCache>) -> Self {
        self.thumbnails = Some(thumbnails);
        self
    }

    /// Clock used for expiry cutoffs. The index carries its own clock for
    /// upload stamps.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: Arc<LifecycleMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub fn service_config(mut self, config: ServiceConfig) -> Self {
        self.service = config;
        self
    }

    #[must_use]
    pub fn cleaner_config(mut self, config: CleanerConfig) -> Self {
        self.cleaner = config;
        self
    }

    #[must_use]
    pub fn reconciler_config(mut self, config: ReconcilerConfig) -> Self {
        self.reconciler = config;
        self
    }

    /// Assemble the service.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Configuration`] if the content store, index
    /// or thumbnail cache was not provided.
    pub fn build(self) -> Result<AttachmentService, LifecycleError> {
        let content = self
            .content
            .ok_or_else(|| LifecycleError::Configuration("content store is required".into()))?;
        let index = self
            .index
            .ok_or_else(|| LifecycleError::Configuration("metadata index is required".into()))?;
        let thumbnails = self
            .thumbnails
            .ok_or_else(|| LifecycleError::Configuration("thumbnail cache is required".into()))?;

        let cleaner = Cleaner::new(content.clone(), index.clone(), self.clock, self.cleaner)
            .with_thumbnails(thumbnails.clone())
            .with_metrics(self.metrics.clone());
        let reconciler = Reconciler::new(content.clone(), index.clone(), self.reconciler)
            .with_metrics(self.metrics.clone());

        info!(backend = content.name(), "attachment service ready");
        Ok(AttachmentService {
            content,
            index,
            thumbnails,
            cleaner,
            reconciler,
            metrics: self.metrics,
            config: self.service,
        })
    }
}

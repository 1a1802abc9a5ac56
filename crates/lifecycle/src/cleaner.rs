use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::{StreamExt, future, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use stowage_content::ContentStore;
use stowage_core::{Clock, ContentId};
use stowage_metadata::MetadataIndex;
use stowage_thumbnail::ThumbnailCache;

use crate::error::LifecycleError;
use crate::metrics::LifecycleMetrics;
use crate::timeout::bounded;

/// Configuration for the [`Cleaner`].
#[derive(Debug, Clone)]
pub struct CleanerConfig {
    /// Attachments uploaded at or before `now - expire` are removed.
    pub expire: Duration,
    /// Only delete content the backend reports as locally present. Expired
    /// records whose content is already gone are purged from metadata.
    pub presence_filter: bool,
    /// Maximum removals in flight at once.
    pub concurrency: usize,
    /// Limit for each single content or metadata call.
    pub call_timeout: Duration,
    /// Limit for the bulk local listing, which can be slow.
    pub listing_timeout: Duration,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            expire: Duration::from_secs(30 * 24 * 60 * 60),
            presence_filter: true,
            concurrency: 100,
            call_timeout: Duration::from_secs(30),
            listing_timeout: Duration::from_secs(600),
        }
    }
}

/// Outcome of one cleaner sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired identifiers found in the time index.
    pub candidates: usize,
    /// Attachments whose content and metadata were both removed.
    pub deleted: usize,
    /// Records removed without a content delete because the content was
    /// already absent.
    pub purged: usize,
    /// Removals that failed. Their records remain indexed and are retried on
    /// the next sweep.
    pub failed: usize,
    /// The sweep stopped early because it was cancelled.
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Deleted,
    Purged,
    Failed,
}

/// Removes attachments past their expiration window.
///
/// A sweep lists expired identifiers from the time index, optionally checks
/// them against the content backend's local listing, and removes each one:
/// content first, then metadata, then cached thumbnails. If the content
/// delete fails the metadata is left in place so the next sweep can find the
/// object again.
pub struct Cleaner {
    content: Arc<dyn ContentStore>,
    index: Arc<MetadataIndex>,
    thumbnails: Option<Arc<ThumbnailCache>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<LifecycleMetrics>,
    config: CleanerConfig,
}

impl Cleaner {
    pub fn new(
        content: Arc<dyn ContentStore>,
        index: Arc<MetadataIndex>,
        clock: Arc<dyn Clock>,
        config: CleanerConfig,
    ) -> Self {
        let days = config.expire.as_secs_f64() / 86_400.0;
        info!(expire_days = days, "cleaner configured");
        Self {
            content,
            index,
            thumbnails: None,
            clock,
            metrics: Arc::new(LifecycleMetrics::default()),
            config,
        }
    }

    /// Evict cached thumbnails of every removed attachment.
    #[must_use]
    pub fn with_thumbnails(mut self, thumbnails: Arc<ThumbnailCache>) -> Self {
        self.thumbnails = Some(thumbnails);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<LifecycleMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    /// The instant at or before which uploads count as expired.
    pub fn cutoff(&self) -> DateTime<Utc> {
        let window = TimeDelta::from_std(self.config.expire).unwrap_or(TimeDelta::MAX);
        self.clock
            .now()
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Run one sweep.
    ///
    /// Per-attachment failures are counted in the report and logged. The
    /// sweep itself fails only if the candidates or the local listing cannot
    /// be read.
    ///
    /// # Errors
    ///
    /// Returns the error from the time-index query or the local listing.
    pub async fn sweep(&self, cancel: &CancellationToken) -> Result<SweepReport, LifecycleError> {
        let result = self.sweep_inner(cancel).await;
        match &result {
            Ok(report) => {
                self.metrics.increment_sweeps();
                self.metrics.add_attachments_expired(report.deleted as u64);
                self.metrics.add_metadata_purged(report.purged as u64);
                self.metrics.add_deletion_failures(report.failed as u64);
            }
            Err(e) => {
                self.metrics.increment_sweep_failures();
                error!(error = %e, "cleaner sweep failed");
            }
        }
        result
    }

    async fn sweep_inner(&self, cancel: &CancellationToken) -> Result<SweepReport, LifecycleError> {
        let cutoff = self.cutoff();
        info!(cutoff = %cutoff.to_rfc2822(), "performing cleanup of attachments uploaded before cutoff");

        let candidates = bounded(
            "metadata.range_by_upload_time",
            self.config.call_timeout,
            self.index.range_by_upload_time(None, Some(cutoff)),
        )
        .await?;

        let mut report = SweepReport {
            candidates: candidates.len(),
            ..SweepReport::default()
        };
        if candidates.is_empty() {
            info!("nothing to clean");
            return Ok(report);
        }
        info!(count = candidates.len(), "found expired attachments");

        let present = self.locally_present().await?;
        let total = candidates.len();

        let outcomes: Vec<Outcome> = stream::iter(candidates)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|id| {
                let is_present = present.as_ref().is_none_or(|set| set.contains(&id));
                async move { self.process(&id, is_present).await }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for outcome in &outcomes {
            match outcome {
                Outcome::Deleted => report.deleted += 1,
                Outcome::Purged => report.purged += 1,
                Outcome::Failed => report.failed += 1,
            }
        }
        report.cancelled = outcomes.len() < total;

        if report.cancelled {
            warn!(
                processed = outcomes.len(),
                total, "cleaner sweep cancelled before completion"
            );
        }
        info!(
            deleted = report.deleted,
            purged = report.purged,
            failed = report.failed,
            "cleaner sweep finished"
        );
        Ok(report)
    }

    /// The set of locally present objects, or `None` when every candidate
    /// should be treated as present.
    async fn locally_present(&self) -> Result<Option<HashSet<ContentId>>, LifecycleError> {
        if !self.config.presence_filter {
            return Ok(None);
        }
        if !self.content.capabilities().local_listing {
            debug!(backend = self.content.name(), "backend cannot list local objects, skipping presence filter");
            return Ok(None);
        }
        let local = bounded(
            "content.list_local",
            self.config.listing_timeout,
            self.content.list_local(),
        )
        .await?;
        debug!(count = local.len(), "listed locally present objects");
        Ok(Some(local))
    }

    async fn process(&self, id: &ContentId, present: bool) -> Outcome {
        if present {
            match self.delete_attachment(id).await {
                Ok(()) => {
                    info!(%id, "deleted expired attachment");
                    Outcome::Deleted
                }
                Err(e) => {
                    warn!(%id, error = %e, "failed to delete expired attachment");
                    Outcome::Failed
                }
            }
        } else {
            match self.release_absent(id).await {
                Ok(()) => {
                    info!(%id, "purged record of already absent attachment");
                    Outcome::Purged
                }
                Err(e) => {
                    warn!(%id, error = %e, "failed to purge record");
                    Outcome::Failed
                }
            }
        }
    }

    /// Remove one attachment: content, then metadata, then cached thumbnails.
    ///
    /// # Errors
    ///
    /// Returns the content error without touching metadata if the content
    /// delete fails, or the metadata error if that step fails. Thumbnail
    /// eviction failures are only logged.
    pub async fn delete_attachment(&self, id: &ContentId) -> Result<(), LifecycleError> {
        bounded(
            "content.delete",
            self.config.call_timeout,
            self.content.delete(id),
        )
        .await?;
        self.purge_metadata(id).await
    }

    /// Drop the record of an object that is no longer present locally.
    ///
    /// A pinning backend may still hold a pin for it, which would keep the
    /// object alive on the network with nothing left to find it, so the pin
    /// is released first and the record survives if that fails.
    async fn release_absent(&self, id: &ContentId) -> Result<(), LifecycleError> {
        if self.content.capabilities().pinning {
            bounded(
                "content.unpin",
                self.config.call_timeout,
                self.content.unpin(id),
            )
            .await?;
        }
        self.purge_metadata(id).await
    }

    async fn purge_metadata(&self, id: &ContentId) -> Result<(), LifecycleError> {
        bounded(
            "metadata.delete_record",
            self.config.call_timeout,
            self.index.delete_record(id),
        )
        .await?;
        self.evict_thumbnails(id).await;
        Ok(())
    }

    async fn evict_thumbnails(&self, id: &ContentId) {
        if let Some(thumbnails) = &self.thumbnails {
            if let Err(e) = thumbnails.evict(id).await {
                warn!(%id, error = %e, "failed to evict cached thumbnails");
            }
        }
    }
}

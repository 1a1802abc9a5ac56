use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::{StreamExt, future, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use stowage_content::ContentStore;
use stowage_core::ContentId;
use stowage_metadata::MetadataIndex;

use crate::error::LifecycleError;
use crate::metrics::LifecycleMetrics;
use crate::timeout::bounded;

/// Configuration for the [`Reconciler`].
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Maximum pin calls in flight at once.
    pub concurrency: usize,
    /// Limit for each single pin call or metadata enumeration.
    pub call_timeout: Duration,
    /// Limit for the bulk local listing.
    pub listing_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            concurrency: 100,
            call_timeout: Duration::from_secs(30),
            listing_timeout: Duration::from_secs(600),
        }
    }
}

/// One identifier that could not be pinned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinFailure {
    pub id: ContentId,
    pub error: String,
}

/// Outcome of [`Reconciler::pin_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinReport {
    /// Size of the desired set.
    pub total: usize,
    pub pinned: usize,
    pub failed: Vec<PinFailure>,
    /// Pinning stopped early because it was cancelled.
    pub cancelled: bool,
}

/// Outcome of [`Reconciler::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub pins: PinReport,
    /// Identifiers with metadata but no local object. Empty when the backend
    /// cannot list local objects.
    pub missing: HashSet<ContentId>,
}

/// Aligns what the content store retains with what the metadata index
/// expects to exist.
pub struct Reconciler {
    content: Arc<dyn ContentStore>,
    index: Arc<MetadataIndex>,
    metrics: Arc<LifecycleMetrics>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        content: Arc<dyn ContentStore>,
        index: Arc<MetadataIndex>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            content,
            index,
            metrics: Arc::new(LifecycleMetrics::default()),
            config,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<LifecycleMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Every identifier with a metadata record, found by key enumeration so
    /// that records missing from the time index are included.
    ///
    /// # Errors
    ///
    /// Propagates metadata failures and timeouts.
    pub async fn compute_desired_set(&self) -> Result<HashSet<ContentId>, LifecycleError> {
        let ids = bounded(
            "metadata.list_ids",
            self.config.listing_timeout,
            self.index.list_ids(),
        )
        .await?;
        Ok(ids.into_iter().collect())
    }

    /// Pin every identifier in the desired set, at most
    /// `concurrency` at a time.
    ///
    /// A failed pin is recorded in the report and does not stop the batch.
    ///
    /// # Errors
    ///
    /// Fails only if the desired set cannot be computed.
    pub async fn pin_all(&self, cancel: &CancellationToken) -> Result<PinReport, LifecycleError> {
        info!("pinning all attachments known to the metadata index");
        let desired = self.compute_desired_set().await?;
        let total = desired.len();
        info!(count = total, "found attachments");

        let done = AtomicUsize::new(0);
        let results: Vec<(ContentId, Result<(), LifecycleError>)> = stream::iter(desired)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|id| {
                let done = &done;
                async move {
                    let result =
                        bounded("content.pin", self.config.call_timeout, self.content.pin(&id))
                            .await;
                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    match &result {
                        Ok(()) => debug!(%id, progress = n, total, "pinned"),
                        Err(e) => warn!(%id, progress = n, total, error = %e, "failed to pin"),
                    }
                    (id, result)
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut report = PinReport {
            total,
            cancelled: results.len() < total,
            ..PinReport::default()
        };
        for (id, result) in results {
            match result {
                Ok(()) => report.pinned += 1,
                Err(e) => report.failed.push(PinFailure {
                    id,
                    error: e.to_string(),
                }),
            }
        }

        self.metrics.add_pins_succeeded(report.pinned as u64);
        self.metrics.add_pins_failed(report.failed.len() as u64);
        info!(
            pinned = report.pinned,
            failed = report.failed.len(),
            total,
            cancelled = report.cancelled,
            "pinning finished"
        );
        Ok(report)
    }

    /// Identifiers in the desired set that the backend does not hold locally.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Unsupported`](stowage_content::ContentError::Unsupported)
    /// (wrapped) if the backend cannot list local objects, and propagates
    /// listing failures.
    pub async fn check_missing(&self) -> Result<HashSet<ContentId>, LifecycleError> {
        info!("checking that all attachments are stored locally");
        let desired = self.compute_desired_set().await?;
        let local = bounded(
            "content.list_local",
            self.config.listing_timeout,
            self.content.list_local(),
        )
        .await?;
        info!(
            attachments = desired.len(),
            local_objects = local.len(),
            "comparing metadata with local objects"
        );

        let missing: HashSet<ContentId> = desired.difference(&local).cloned().collect();
        self.metrics.add_missing_found(missing.len() as u64);
        if missing.is_empty() {
            info!("all attachments are stored locally");
        } else {
            warn!(count = missing.len(), "attachments missing from local storage");
        }
        Ok(missing)
    }

    /// Pin everything, then report what is still missing locally.
    ///
    /// # Errors
    ///
    /// Propagates failures of [`pin_all`](Self::pin_all) and
    /// [`check_missing`](Self::check_missing).
    pub async fn reconcile(&self, cancel: &CancellationToken) -> Result<ReconcileReport, LifecycleError> {
        let pins = self.pin_all(cancel).await?;
        let missing = if pins.cancelled {
            HashSet::new()
        } else if self.content.capabilities().local_listing {
            self.check_missing().await?
        } else {
            debug!(backend = self.content.name(), "backend cannot list local objects, skipping check");
            HashSet::new()
        };
        Ok(ReconcileReport { pins, missing })
    }
}

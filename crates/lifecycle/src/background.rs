use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::service::AttachmentService;

/// Configuration for the background processor.
#[derive(Debug, Clone)]
pub struct BackgroundConfig {
    /// Run cleaner sweeps.
    pub enable_cleaner: bool,
    /// Time between cleaner sweeps. The first sweep runs one interval after
    /// start.
    pub cleaner_interval: Duration,
    /// Rebuild the time index once before the first sweep.
    pub rebuild_index_on_start: bool,
    /// Run reconciliation.
    pub enable_reconciler: bool,
    /// Time between reconciliation runs.
    pub reconciler_interval: Duration,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            enable_cleaner: true,
            cleaner_interval: Duration::from_secs(24 * 60 * 60),
            rebuild_index_on_start: false,
            enable_reconciler: false,
            reconciler_interval: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// Runs cleaner sweeps and reconciliation on fixed intervals, independent of
/// request traffic.
///
/// A failed run is logged and the next interval tries again.
pub struct BackgroundProcessor {
    service: Arc<AttachmentService>,
    config: BackgroundConfig,
    shutdown_rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
}

impl BackgroundProcessor {
    /// Token cancelled when the processor stops. Cancelling it from outside
    /// interrupts an in-flight sweep or reconciliation.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the background processor until shutdown is signaled.
    pub async fn run(&mut self) {
        info!(
            cleaner = self.config.enable_cleaner,
            reconciler = self.config.enable_reconciler,
            "background processor starting"
        );

        if self.config.enable_cleaner && self.config.rebuild_index_on_start {
            match self.service.rebuild_time_index().await {
                Ok(report) => info!(
                    indexed = report.indexed,
                    skipped = report.skipped,
                    pruned = report.pruned,
                    "startup index rebuild finished"
                ),
                Err(e) => error!(error = %e, "startup index rebuild failed"),
            }
        }

        let mut cleaner_interval = delayed_interval(self.config.cleaner_interval);
        let mut reconciler_interval = delayed_interval(self.config.reconciler_interval);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("background processor received shutdown signal");
                    break;
                }
                () = self.cancel.cancelled() => {
                    info!("background processor cancelled");
                    break;
                }
                _ = cleaner_interval.tick(), if self.config.enable_cleaner => {
                    if let Err(e) = self.service.run_cleanup_sweep(&self.cancel).await {
                        error!(error = %e, "error running cleaner sweep");
                    }
                }
                _ = reconciler_interval.tick(), if self.config.enable_reconciler => {
                    match self.service.reconcile(&self.cancel).await {
                        Ok(report) if !report.missing.is_empty() => warn!(
                            missing = report.missing.len(),
                            "reconciliation found attachments missing locally"
                        ),
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "error running reconciliation"),
                    }
                }
            }
        }

        self.cancel.cancel();
        info!("background processor stopped");
    }
}

/// An interval whose first tick is one period from now. Disabled branches
/// may carry a zero period, which `interval_at` rejects.
fn delayed_interval(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Builder for [`BackgroundProcessor`].
#[derive(Default)]
pub struct BackgroundProcessorBuilder {
    service: Option<Arc<AttachmentService>>,
    config: BackgroundConfig,
    cancel: Option<CancellationToken>,
}

impl BackgroundProcessorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn service(mut self, service: Arc<AttachmentService>) -> Self {
        self.service = Some(service);
        self
    }

    #[must_use]
    pub fn config(mut self, config: BackgroundConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a parent cancellation token, e.g. one tied to process shutdown.
    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Build the processor.
    ///
    /// Returns the processor and a shutdown sender.
    ///
    /// # Errors
    ///
    /// Fails if no service was provided or an enabled interval is zero.
    pub fn build(self) -> Result<(BackgroundProcessor, mpsc::Sender<()>), &'static str> {
        let service = self.service.ok_or("service is required")?;
        if (self.config.enable_cleaner && self.config.cleaner_interval.is_zero())
            || (self.config.enable_reconciler && self.config.reconciler_interval.is_zero())
        {
            return Err("background intervals must be non-zero");
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let processor = BackgroundProcessor {
            service,
            config: self.config,
            shutdown_rx,
            cancel: self.cancel.map(|t| t.child_token()).unwrap_or_default(),
        };
        Ok((processor, shutdown_tx))
    }
}

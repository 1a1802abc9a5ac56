use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters tracking attachment lifecycle outcomes.
///
/// For a consistent point-in-time view, call [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct LifecycleMetrics {
    /// Attachments stored.
    pub uploads: AtomicU64,
    /// Attachments removed on request.
    pub deletes: AtomicU64,
    /// Cleaner sweeps completed.
    pub sweeps: AtomicU64,
    /// Cleaner sweeps that aborted with an error.
    pub sweep_failures: AtomicU64,
    /// Expired attachments whose content and metadata were both removed.
    pub attachments_expired: AtomicU64,
    /// Expired records purged because their content was already gone.
    pub metadata_purged: AtomicU64,
    /// Per-attachment removals that failed during a sweep.
    pub deletion_failures: AtomicU64,
    /// Successful pin calls.
    pub pins_succeeded: AtomicU64,
    /// Failed pin calls.
    pub pins_failed: AtomicU64,
    /// Identifiers found in metadata but not physically present.
    pub missing_found: AtomicU64,
}

impl LifecycleMetrics {
    pub fn increment_uploads(&self) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deletes(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_sweeps(&self) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_sweep_failures(&self) {
        self.sweep_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_attachments_expired(&self, n: u64) {
        self.attachments_expired.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_metadata_purged(&self, n: u64) {
        self.metadata_purged.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_deletion_failures(&self, n: u64) {
        self.deletion_failures.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_pins_succeeded(&self, n: u64) {
        self.pins_succeeded.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_pins_failed(&self, n: u64) {
        self.pins_failed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_missing_found(&self, n: u64) {
        self.missing_found.fetch_add(n, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uploads: self.uploads.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            sweep_failures: self.sweep_failures.load(Ordering::Relaxed),
            attachments_expired: self.attachments_expired.load(Ordering::Relaxed),
            metadata_purged: self.metadata_purged.load(Ordering::Relaxed),
            deletion_failures: self.deletion_failures.load(Ordering::Relaxed),
            pins_succeeded: self.pins_succeeded.load(Ordering::Relaxed),
            pins_failed: self.pins_failed.load(Ordering::Relaxed),
            missing_found: self.missing_found.load(Ordering::Relaxed),
        }
    }
}

/// A plain data snapshot of [`LifecycleMetrics`] at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let metrics = LifecycleMetrics::default();
        metrics.increment_uploads();
        metrics.increment_uploads();
        metrics.increment_sweeps();
        metrics.add_attachments_expired(5);
        metrics.add_pins_failed(2);

        let snap = metrics.snapshot();
        assert_eq!(snap.uploads, 2);
        assert_eq!(snap.sweeps, 1);
        assert_eq!(snap.attachments_expired, 5);
        assert_eq!(snap.pins_failed, 2);
        assert_eq!(snap.deletes, 0);
    }
}

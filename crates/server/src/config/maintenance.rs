use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use stowage_lifecycle::{BackgroundConfig, CleanerConfig, ReconcilerConfig};
use stowage_thumbnail::{DEFAULT_THUMBNAIL_SIZE, ThumbnailConfig};

/// Thumbnail configuration.
#[derive(Debug, Deserialize)]
pub struct ThumbnailsConfig {
    /// Persist generated thumbnails on disk.
    #[serde(default)]
    pub cache: bool,
    /// Root of the thumbnail cache.
    #[serde(default = "default_thumbnail_path")]
    pub path: PathBuf,
    /// Supported edge lengths. Other requests get `default_size`.
    #[serde(default = "default_sizes")]
    pub sizes: Vec<u32>,
    /// Edge length used for unlisted sizes.
    #[serde(default = "default_size")]
    pub default_size: u32,
    /// Originals larger than this are not resized.
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: u64,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            cache: false,
            path: default_thumbnail_path(),
            sizes: default_sizes(),
            default_size: default_size(),
            max_source_bytes: default_max_source_bytes(),
        }
    }
}

impl ThumbnailsConfig {
    pub fn to_thumbnail_config(&self) -> ThumbnailConfig {
        ThumbnailConfig {
            cache: self.cache,
            path: self.path.clone(),
            sizes: self.sizes.clone(),
            default_size: self.default_size,
            max_source_bytes: self.max_source_bytes,
        }
    }
}

fn default_thumbnail_path() -> PathBuf {
    PathBuf::from("data/thumbnails")
}

fn default_sizes() -> Vec<u32> {
    vec![64, DEFAULT_THUMBNAIL_SIZE, 256]
}

fn default_size() -> u32 {
    DEFAULT_THUMBNAIL_SIZE
}

fn default_max_source_bytes() -> u64 {
    20 * 1024 * 1024
}

/// `[cleaner]` section.
#[derive(Debug, Deserialize)]
pub struct CleanerSection {
    /// Run sweeps in the background while serving.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Age after which attachments are removed.
    #[serde(default = "default_expire")]
    pub expire_seconds: u64,
    /// Seconds between sweeps.
    #[serde(default = "default_cleaner_interval")]
    pub interval_seconds: u64,
    /// Rebuild the upload-time index once at startup.
    #[serde(default)]
    pub rebuild_index_on_start: bool,
    /// Only delete content the backend reports as present.
    #[serde(default = "default_true")]
    pub presence_filter: bool,
    /// Maximum removals in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for CleanerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            expire_seconds: default_expire(),
            interval_seconds: default_cleaner_interval(),
            rebuild_index_on_start: false,
            presence_filter: true,
            concurrency: default_concurrency(),
        }
    }
}

impl CleanerSection {
    pub fn to_cleaner_config(&self) -> CleanerConfig {
        CleanerConfig {
            expire: Duration::from_secs(self.expire_seconds),
            presence_filter: self.presence_filter,
            concurrency: self.concurrency.max(1),
            ..CleanerConfig::default()
        }
    }
}

fn default_expire() -> u64 {
    30 * 24 * 60 * 60
}

fn default_cleaner_interval() -> u64 {
    24 * 60 * 60
}

/// `[reconciler]` section.
#[derive(Debug, Deserialize)]
pub struct ReconcilerSection {
    /// Run reconciliation in the background while serving.
    #[serde(default)]
    pub enabled: bool,
    /// Seconds between runs.
    #[serde(default = "default_reconciler_interval")]
    pub interval_seconds: u64,
    /// Maximum pin calls in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ReconcilerSection {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: default_reconciler_interval(),
            concurrency: default_concurrency(),
        }
    }
}

impl ReconcilerSection {
    pub fn to_reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            concurrency: self.concurrency.max(1),
            ..ReconcilerConfig::default()
        }
    }
}

fn default_reconciler_interval() -> u64 {
    6 * 60 * 60
}

fn default_concurrency() -> usize {
    100
}

fn default_true() -> bool {
    true
}

/// Combine the cleaner and reconciler sections into the scheduler config.
pub fn background_config(cleaner: &CleanerSection, reconciler: &ReconcilerSection) -> BackgroundConfig {
    BackgroundConfig {
        enable_cleaner: cleaner.enabled,
        cleaner_interval: Duration::from_secs(cleaner.interval_seconds),
        rebuild_index_on_start: cleaner.rebuild_index_on_start,
        enable_reconciler: reconciler.enabled,
        reconciler_interval: Duration::from_secs(reconciler.interval_seconds),
    }
}

use std::path::PathBuf;

/// Edge length used when a requested size cannot be matched to a configured one.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 128;

/// Configuration for [`ThumbnailCache`](crate::ThumbnailCache).
#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    /// Persist generated thumbnails under `path`.
    pub cache: bool,

    /// Root of the on-disk cache.
    pub path: PathBuf,

    /// Supported square edge lengths in pixels.
    pub sizes: Vec<u32>,

    /// Edge length used for any size not listed in `sizes`.
    pub default_size: u32,

    /// Originals larger than this are served as-is rather than buffered for
    /// resizing.
    pub max_source_bytes: u64,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            cache: false,
            path: PathBuf::from("thumbnails"),
            sizes: vec![64, DEFAULT_THUMBNAIL_SIZE, 256],
            default_size: DEFAULT_THUMBNAIL_SIZE,
            max_source_bytes: 20 * 1024 * 1024,
        }
    }
}

impl ThumbnailConfig {
    /// Map a requested edge length onto a supported one.
    ///
    /// A configured size is kept as-is. Anything else, including 0, yields
    /// `default_size`.
    #[must_use]
    pub fn snap_size(&self, requested: u32) -> u32 {
        if self.sizes.contains(&requested) {
            requested
        } else {
            self.default_size
        }
    }

    /// Every size that may have a cache directory.
    pub(crate) fn all_sizes(&self) -> Vec<u32> {
        let mut sizes = self.sizes.clone();
        sizes.push(self.default_size);
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }
}

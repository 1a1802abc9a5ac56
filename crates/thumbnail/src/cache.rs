use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use stowage_content::{ByteStream, ContentError, ContentStore, collect_bytes, once};
use stowage_core::ContentId;

use crate::config::ThumbnailConfig;
use crate::error::ThumbnailError;
use crate::resizer::Resizer;

/// What a [`Thumbnail`] stream actually contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailKind {
    /// A JPEG of the snapped size.
    Resized,
    /// The untouched original, served because resizing was impossible.
    Original,
}

/// A thumbnail ready to be streamed.
pub struct Thumbnail {
    pub kind: ThumbnailKind,
    /// The snapped edge length that was requested of the resizer.
    pub size: u32,
    pub stream: ByteStream,
}

impl std::fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thumbnail")
            .field("kind", &self.kind)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Serves square thumbnails, optionally through an on-disk cache.
///
/// Cached files live at `<path>/<size>/<id[0..2]>/<id[2..4]>/<id>`. Only a
/// complete resize result is ever written there; when resizing fails the
/// original is served and nothing is cached, so a cache file always holds a
/// JPEG of the size its path names.
pub struct ThumbnailCache {
    config: ThumbnailConfig,
    store: Arc<dyn ContentStore>,
    resizer: Arc<dyn Resizer>,
}

impl ThumbnailCache {
    pub fn new(
        config: ThumbnailConfig,
        store: Arc<dyn ContentStore>,
        resizer: Arc<dyn Resizer>,
    ) -> Self {
        if config.cache {
            info!(path = %config.path.display(), "thumbnail cache enabled");
        } else {
            info!("thumbnail cache disabled");
        }
        Self {
            config,
            store,
            resizer,
        }
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Path of the cache file for `id` at `size`.
    #[must_use]
    pub fn cache_path(&self, id: &ContentId, size: u32) -> PathBuf {
        Self::path_under(&self.config.path.join(size.to_string()), id)
    }

    fn path_under(size_dir: &Path, id: &ContentId) -> PathBuf {
        let (first, second) = id.shards();
        size_dir.join(first).join(second).join(id.as_str())
    }

    /// Serve a thumbnail of `id` at the supported size nearest `requested`.
    ///
    /// # Errors
    ///
    /// Fails only when the original cannot be fetched from the content store.
    /// Resize failures degrade to the original.
    pub async fn serve(&self, id: &ContentId, requested: u32) -> Result<Thumbnail, ThumbnailError> {
        let size = self.config.snap_size(requested);

        if self.config.cache {
            let path = self.cache_path(id, size);
            match fs::File::open(&path).await {
                Ok(file) => {
                    debug!(%id, size, "serving thumbnail from cache");
                    return Ok(Thumbnail {
                        kind: ThumbnailKind::Resized,
                        size,
                        stream: ReaderStream::new(file).map_err(ContentError::from).boxed(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(%id, size, "thumbnail not cached");
                }
                Err(e) => warn!(%id, size, error = %e, "unreadable cached thumbnail, regenerating"),
            }
        }

        self.generate(id, size).await
    }

    /// Fetch the original and resize it, caching a successful result.
    async fn generate(&self, id: &ContentId, size: u32) -> Result<Thumbnail, ThumbnailError> {
        debug!(%id, "fetching original image");
        let original = self.store.get(id).await?;

        let source = match collect_bytes(original, self.config.max_source_bytes).await {
            Ok(bytes) => bytes,
            Err(ContentError::TooLarge { limit }) => {
                debug!(%id, limit, "original too large to resize, serving as-is");
                return Ok(Thumbnail {
                    kind: ThumbnailKind::Original,
                    size,
                    stream: self.store.get(id).await?,
                });
            }
            Err(e) => return Err(e.into()),
        };

        match self.resizer.resize(source.clone(), size).await {
            Ok(jpeg) => {
                debug!(%id, size, "created thumbnail");
                if self.config.cache {
                    self.write_cache(id, size, &jpeg).await;
                }
                Ok(Thumbnail {
                    kind: ThumbnailKind::Resized,
                    size,
                    stream: once(jpeg),
                })
            }
            Err(e) => {
                debug!(%id, size, error = %e, "failed to create thumbnail, serving original");
                Ok(Thumbnail {
                    kind: ThumbnailKind::Original,
                    size,
                    stream: once(source),
                })
            }
        }
    }

    /// Persist a finished thumbnail. Failures are logged, never surfaced.
    async fn write_cache(&self, id: &ContentId, size: u32, jpeg: &Bytes) {
        let path = self.cache_path(id, size);
        if let Err(e) = write_atomically(&path, jpeg).await {
            warn!(%id, size, path = %path.display(), error = %e, "failed to cache thumbnail");
        } else {
            debug!(%id, size, "cached thumbnail");
        }
    }

    /// Remove every cached thumbnail of `id`, at any size directory present
    /// under the cache root. Returns the number of files removed.
    ///
    /// # Errors
    ///
    /// Returns I/O errors other than a missing file or directory.
    pub async fn evict(&self, id: &ContentId) -> Result<usize, ThumbnailError> {
        let mut size_dirs: Vec<PathBuf> = self
            .config
            .all_sizes()
            .into_iter()
            .map(|s| self.config.path.join(s.to_string()))
            .collect();

        match fs::read_dir(&self.config.path).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await? {
                    let path = entry.path();
                    if !size_dirs.contains(&path) {
                        size_dirs.push(path);
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        }

        let mut removed = 0;
        for dir in size_dirs {
            match fs::remove_file(Self::path_under(&dir, id)).await {
                Ok(()) => removed += 1,
                Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {}
                Err(e) => return Err(e.into()),
            }
        }
        if removed > 0 {
            debug!(%id, removed, "evicted cached thumbnails");
        }
        Ok(removed)
    }
}

async fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "cache path has no parent"))?;
    fs::create_dir_all(dir).await?;
    let tmp = dir.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
    fs::write(&tmp, data).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

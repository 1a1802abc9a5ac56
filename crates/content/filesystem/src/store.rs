use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::debug;

use stowage_content::{ByteStream, Capabilities, ContentError, ContentStore};
use stowage_core::ContentId;

/// Marker prefix for in-flight writes. Never a valid identifier because
/// identifiers are alphanumeric.
const TMP_PREFIX: &str = ".tmp-";

/// Content store that keeps each object as a file under a root directory.
///
/// The identifier is the lowercase hex SHA-256 of the content. Objects live
/// at `<root>/<id[0..2]>/<id[2..]>`. Retention is file existence: there is
/// no pinning, but the directory tree can be enumerated.
#[derive(Debug, Clone)]
pub struct FilesystemContentStore {
    root: PathBuf,
}

impl FilesystemContentStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn compute_id(data: &[u8]) -> Result<ContentId, ContentError> {
        let digest = Sha256::digest(data);
        ContentId::parse(hex::encode(digest)).map_err(|e| ContentError::Backend(e.to_string()))
    }

    fn object_path(&self, id: &ContentId) -> PathBuf {
        let s = id.as_str();
        self.root.join(&s[..2]).join(&s[2..])
    }
}

#[async_trait]
impl ContentStore for FilesystemContentStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            pinning: false,
            local_listing: true,
        }
    }

    async fn put(&self, data: Bytes) -> Result<ContentId, ContentError> {
        let id = Self::compute_id(&data)?;
        let path = self.object_path(&id);

        if fs::try_exists(&path).await? {
            debug!(%id, "content already stored");
            return Ok(id);
        }

        let dir = path
            .parent()
            .ok_or_else(|| ContentError::Backend(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(dir).await?;

        // Write beside the target and rename so a crash never leaves a
        // truncated file under a valid identifier.
        let tmp = dir.join(format!("{TMP_PREFIX}{}", uuid::Uuid::new_v4()));
        fs::write(&tmp, &data).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(%id, bytes = data.len(), "stored content on filesystem");
        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> Result<ByteStream, ContentError> {
        let path = self.object_path(id);
        let file = match fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ContentError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        debug!(%id, "serving content from filesystem");
        Ok(ReaderStream::new(file).map_err(ContentError::from).boxed())
    }

    async fn delete(&self, id: &ContentId) -> Result<(), ContentError> {
        let path = self.object_path(id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%id, "deleted content from filesystem");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Files cannot be pinned; pinning only confirms the object is present.
    async fn pin(&self, id: &ContentId) -> Result<(), ContentError> {
        if fs::try_exists(self.object_path(id)).await? {
            Ok(())
        } else {
            Err(ContentError::NotFound(id.to_string()))
        }
    }

    async fn unpin(&self, id: &ContentId) -> Result<(), ContentError> {
        self.delete(id).await
    }

    async fn list_retained(&self) -> Result<HashSet<ContentId>, ContentError> {
        self.list_local().await
    }

    async fn list_local(&self) -> Result<HashSet<ContentId>, ContentError> {
        let mut ids = HashSet::new();
        let mut shards = match fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };

        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let shard_name = shard.file_name().to_string_lossy().into_owned();
            let mut files = fs::read_dir(shard.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let file_name = file.file_name().to_string_lossy().into_owned();
                if file_name.starts_with(TMP_PREFIX) {
                    continue;
                }
                // Stray files that do not form an identifier are ignored.
                if let Ok(id) = ContentId::parse(format!("{shard_name}{file_name}")) {
                    ids.insert(id);
                }
            }
        }

        Ok(ids)
    }
}

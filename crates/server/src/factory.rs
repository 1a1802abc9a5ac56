//! Construction of backends and the attachment service from configuration.

use std::sync::Arc;
use std::time::Duration;

use stowage_content::ContentStore;
use stowage_content_fs::FilesystemContentStore;
#[cfg(feature = "ipfs")]
use stowage_content_ipfs::{IpfsConfig, IpfsContentStore};
use stowage_content_memory::MemoryContentStore;
use stowage_lifecycle::{AttachmentService, ServiceConfig};
use stowage_metadata::{MetadataBackend, MetadataIndex};
use stowage_metadata_memory::MemoryMetadataBackend;
#[cfg(feature = "redis")]
use stowage_metadata_redis::{RedisConfig, RedisMetadataBackend};
use stowage_thumbnail::{ImageResizer, ThumbnailCache};
use tracing::info;

use crate::config::{ContentConfig, MetadataConfig, StowageConfig};
use crate::error::ServerError;

/// Create a content store from the given configuration.
pub fn create_content_store(config: &ContentConfig) -> Result<Arc<dyn ContentStore>, ServerError> {
    let store: Arc<dyn ContentStore> = match config.backend.as_str() {
        "filesystem" => Arc::new(FilesystemContentStore::new(&config.path)),
        "memory" => Arc::new(MemoryContentStore::new()),
        #[cfg(feature = "ipfs")]
        "ipfs" => {
            let ipfs_config = IpfsConfig {
                url: config.url.clone(),
                request_timeout: Duration::from_secs(config.timeout_seconds),
                ..IpfsConfig::default()
            };
            let store = IpfsContentStore::new(ipfs_config)
                .map_err(|e| ServerError::Config(format!("content ipfs: {e}")))?;
            Arc::new(store)
        }
        other => {
            return Err(ServerError::Config(format!(
                "unknown content backend: {other}"
            )));
        }
    };
    info!(backend = %config.backend, "content store initialized");
    Ok(store)
}

/// Create a metadata backend from the given configuration.
pub fn create_metadata_backend(
    config: &MetadataConfig,
) -> Result<Arc<dyn MetadataBackend>, ServerError> {
    let backend: Arc<dyn MetadataBackend> = match config.backend.as_str() {
        "memory" => Arc::new(MemoryMetadataBackend::new()),
        #[cfg(feature = "redis")]
        "redis" => {
            let redis_config = RedisConfig {
                url: config.url.clone(),
                pool_size: config.pool_size,
                ..RedisConfig::default()
            };
            let backend = RedisMetadataBackend::new(&redis_config)
                .map_err(|e| ServerError::Config(format!("metadata redis: {e}")))?;
            Arc::new(backend)
        }
        other => {
            return Err(ServerError::Config(format!(
                "unknown metadata backend: {other}"
            )));
        }
    };
    info!(backend = %config.backend, "metadata backend initialized");
    Ok(backend)
}

/// Wire the configured backends into an [`AttachmentService`].
pub fn build_service(config: &StowageConfig) -> Result<AttachmentService, ServerError> {
    let content = create_content_store(&config.content)?;
    let backend = create_metadata_backend(&config.metadata)?;
    let index = Arc::new(MetadataIndex::new(
        backend,
        config.metadata.prefix.clone(),
        config.metadata.index.clone(),
    ));
    let thumbnails = Arc::new(ThumbnailCache::new(
        config.thumbnails.to_thumbnail_config(),
        Arc::clone(&content),
        Arc::new(ImageResizer::new()),
    ));

    AttachmentService::builder()
        .content(content)
        .index(index)
        .thumbnails(thumbnails)
        .service_config(ServiceConfig {
            max_upload_bytes: config.server.max_upload_bytes,
            call_timeout: Duration::from_secs(config.server.call_timeout_seconds),
        })
        .cleaner_config(config.cleaner.to_cleaner_config())
        .reconciler_config(config.reconciler.to_reconciler_config())
        .build()
        .map_err(|e| ServerError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backends_build_a_service() {
        let config = StowageConfig::parse(
            "[content]\nbackend = \"memory\"\n[metadata]\nbackend = \"memory\"\n",
        )
        .unwrap();
        let service = build_service(&config).unwrap();
        assert_eq!(service.index().prefix(), "attachments_");
        assert_eq!(service.config().max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn unknown_content_backend_is_rejected() {
        let config = StowageConfig::parse("[content]\nbackend = \"s3\"\n").unwrap();
        let err = create_content_store(&config.content).err().unwrap();
        assert_eq!(err.to_string(), "configuration error: unknown content backend: s3");
    }

    #[test]
    fn unknown_metadata_backend_is_rejected() {
        let config = StowageConfig::parse("[metadata]\nbackend = \"sqlite\"\n").unwrap();
        assert!(matches!(
            create_metadata_backend(&config.metadata),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn filesystem_store_uses_configured_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = ContentConfig {
            path: dir.path().to_path_buf(),
            ..ContentConfig::default()
        };
        let store = create_content_store(&config).unwrap();
        assert_eq!(store.name(), "filesystem");
    }
}

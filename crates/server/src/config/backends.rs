use std::path::PathBuf;

use serde::Deserialize;

/// Content backend configuration.
#[derive(Debug, Deserialize)]
pub struct ContentConfig {
    /// Which backend to use: `"filesystem"`, `"ipfs"` or `"memory"`.
    #[serde(default = "default_content_backend")]
    pub backend: String,
    /// Root directory for the filesystem backend.
    #[serde(default = "default_content_path")]
    pub path: PathBuf,
    /// Daemon API URL for the IPFS backend.
    #[serde(default = "default_ipfs_url")]
    pub url: String,
    /// Request timeout for the IPFS backend.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            backend: default_content_backend(),
            path: default_content_path(),
            url: default_ipfs_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_content_backend() -> String {
    "filesystem".to_owned()
}

fn default_content_path() -> PathBuf {
    PathBuf::from("data/attachments")
}

fn default_ipfs_url() -> String {
    "http://127.0.0.1:5001".to_owned()
}

fn default_timeout() -> u64 {
    30
}

/// Metadata backend configuration.
#[derive(Debug, Deserialize)]
pub struct MetadataConfig {
    /// Which backend to use: `"memory"` or `"redis"`.
    #[serde(default = "default_metadata_backend")]
    pub backend: String,
    /// Connection URL for the Redis backend.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Prefix of every record key.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Name of the upload-time index.
    #[serde(default = "default_index")]
    pub index: String,
    /// Redis connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: default_metadata_backend(),
            url: default_redis_url(),
            prefix: default_prefix(),
            index: default_index(),
            pool_size: default_pool_size(),
        }
    }
}

fn default_metadata_backend() -> String {
    "memory".to_owned()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_owned()
}

fn default_prefix() -> String {
    "attachments_".to_owned()
}

fn default_index() -> String {
    "attachments_datetime".to_owned()
}

fn default_pool_size() -> usize {
    10
}

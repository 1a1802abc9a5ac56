use std::time::Duration;

/// Configuration for the Redis metadata backend.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g. `redis://127.0.0.1:6379`).
    pub url: String,

    /// Prepended to every key and sorted-set name. Empty by default so that
    /// records keep the plain `<prefix><id>` layout.
    pub namespace: String,

    /// Number of connections in the `deadpool-redis` pool.
    pub pool_size: usize,

    /// Timeout for acquiring a pooled connection.
    pub connection_timeout: Duration,

    /// `COUNT` hint passed to each `SCAN` step.
    pub scan_batch: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::from("redis://127.0.0.1:6379"),
            namespace: String::new(),
            pool_size: 10,
            connection_timeout: Duration::from_secs(5),
            scan_batch: 500,
        }
    }
}

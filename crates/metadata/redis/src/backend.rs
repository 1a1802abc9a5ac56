use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use tracing::debug;

use stowage_metadata::{MetadataBackend, MetadataError};

use crate::config::RedisConfig;
use crate::pattern::{prefix_pattern, score_bound};

/// Redis-backed implementation of [`MetadataBackend`].
///
/// Records are Redis hashes (`HSET`/`HGETALL`/`DEL`), enumeration uses
/// incremental `SCAN`, and sorted sets map directly onto `ZADD`/`ZREM`/
/// `ZRANGEBYSCORE`. Members with equal scores come back in lexicographic
/// order, as Redis orders them.
pub struct RedisMetadataBackend {
    pool: Pool,
    namespace: String,
    scan_batch: usize,
}

impl RedisMetadataBackend {
    /// Create a new `RedisMetadataBackend` from the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Connection`] if the pool cannot be created.
    pub fn new(config: &RedisConfig) -> Result<Self, MetadataError> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .builder()
            .map(|b| {
                b.max_size(config.pool_size)
                    .wait_timeout(Some(config.connection_timeout))
                    .runtime(Runtime::Tokio1)
                    .build()
            })
            .map_err(|e| MetadataError::Connection(e.to_string()))?
            .map_err(|e| MetadataError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            namespace: config.namespace.clone(),
            scan_batch: config.scan_batch.max(1),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.namespace)
    }

    /// Obtain a connection from the pool.
    async fn conn(&self) -> Result<deadpool_redis::Connection, MetadataError> {
        self.pool
            .get()
            .await
            .map_err(|e| MetadataError::Connection(e.to_string()))
    }
}

fn backend_err(e: &redis::RedisError) -> MetadataError {
    if e.is_connection_dropped() || e.is_connection_refusal() || e.is_io_error() {
        MetadataError::Connection(e.to_string())
    } else {
        MetadataError::Backend(e.to_string())
    }
}

#[async_trait]
impl MetadataBackend for RedisMetadataBackend {
    async fn set_fields(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), MetadataError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;

        // HSET key field value [field value ...]
        let mut cmd = redis::cmd("HSET");
        cmd.arg(self.key(key));
        for (name, value) in fields {
            cmd.arg(*name).arg(*value);
        }
        cmd.query_async::<i64>(&mut conn)
            .await
            .map_err(|e| backend_err(&e))?;
        Ok(())
    }

    async fn get_fields(&self, key: &str) -> Result<Option<HashMap<String, String>>, MetadataError> {
        let mut conn = self.conn().await?;
        let fields: HashMap<String, String> = conn
            .hgetall(self.key(key))
            .await
            .map_err(|e| backend_err(&e))?;

        // HGETALL on a missing key returns an empty hash.
        Ok((!fields.is_empty()).then_some(fields))
    }

    async fn delete_key(&self, key: &str) -> Result<bool, MetadataError> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.del(self.key(key)).await.map_err(|e| backend_err(&e))?;
        Ok(removed > 0)
    }

    async fn list_keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>, MetadataError> {
        let pattern = prefix_pattern(&self.key(prefix));
        let mut conn = self.conn().await?;
        let mut results = Vec::new();
        let mut cursor = 0u64;

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.scan_batch)
                // The time index may share the record prefix.
                .arg("TYPE")
                .arg("hash")
                .query_async(&mut conn)
                .await
                .map_err(|e| backend_err(&e))?;

            results.extend(
                keys.into_iter()
                    .filter_map(|k| k.strip_prefix(&self.namespace).map(str::to_owned)),
            );

            cursor = new_cursor;
            if cursor == 0 {
                break;
            }
        }

        // SCAN may return a key more than once.
        results.sort_unstable();
        results.dedup();
        debug!(%pattern, count = results.len(), "scanned keys");
        Ok(results)
    }

    async fn sorted_insert(&self, set: &str, score: i64, member: &str) -> Result<(), MetadataError> {
        let mut conn = self.conn().await?;

        // ZADD set <score> <member>
        redis::cmd("ZADD")
            .arg(self.key(set))
            .arg(score)
            .arg(member)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| backend_err(&e))?;
        Ok(())
    }

    async fn sorted_remove(&self, set: &str, member: &str) -> Result<bool, MetadataError> {
        let mut conn = self.conn().await?;

        // ZREM set <member>
        let removed: i64 = redis::cmd("ZREM")
            .arg(self.key(set))
            .arg(member)
            .query_async(&mut conn)
            .await
            .map_err(|e| backend_err(&e))?;
        Ok(removed > 0)
    }

    async fn sorted_range_by_score(
        &self,
        set: &str,
        min: Option<i64>,
        max: Option<i64>,
    ) -> Result<Vec<String>, MetadataError> {
        let mut conn = self.conn().await?;

        // ZRANGEBYSCORE set <min|-inf> <max|+inf>
        redis::cmd("ZRANGEBYSCORE")
            .arg(self.key(set))
            .arg(score_bound(min, "-inf"))
            .arg(score_bound(max, "+inf"))
            .query_async(&mut conn)
            .await
            .map_err(|e| backend_err(&e))
    }
}


#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use std::sync::Arc;

    use stowage_metadata::MetadataIndex;

    use super::*;

    fn test_config() -> RedisConfig {
        RedisConfig {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            namespace: format!("stowage-test-{}:", uuid::Uuid::new_v4()),
            ..RedisConfig::default()
        }
    }

    #[tokio::test]
    async fn backend_conformance() {
        let backend = RedisMetadataBackend::new(&test_config()).expect("pool creation should succeed");
        stowage_metadata::testing::run_backend_conformance_tests(&backend)
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test]
    async fn legacy_records_are_reindexed() {
        let backend = Arc::new(
            RedisMetadataBackend::new(&test_config()).expect("pool creation should succeed"),
        );
        backend
            .set_fields(
                "attachments_QmLegacy1",
                &[
                    ("datetime", "Tue, 14 Nov 2023 22:13:20 GMT"),
                    ("mimetype", "text/plain"),
                    ("size", "3"),
                ],
            )
            .await
            .unwrap();

        let index = MetadataIndex::new(backend.clone(), "attachments_", "attachments_datetime");
        let report = index.rebuild_time_index().await.unwrap();
        assert_eq!(report.indexed, 1);

        let members = backend
            .sorted_range_by_score("attachments_datetime", None, Some(1_700_000_000_000))
            .await
            .unwrap();
        assert_eq!(members, vec!["QmLegacy1"]);
    }

    #[tokio::test]
    async fn index_key_under_the_record_prefix_is_not_listed() {
        let backend = Arc::new(
            RedisMetadataBackend::new(&test_config()).expect("pool creation should succeed"),
        );
        let index = MetadataIndex::new(backend.clone(), "attachments_", "attachments_datetime");
        backend
            .set_fields(
                "attachments_QmIndexed1",
                &[("datetime", "1700000000000"), ("mimetype", "text/plain"), ("size", "1")],
            )
            .await
            .unwrap();
        backend
            .sorted_insert("attachments_datetime", 1_700_000_000_000, "QmIndexed1")
            .await
            .unwrap();

        let keys = backend.list_keys_by_prefix("attachments_").await.unwrap();
        assert!(!keys.iter().any(|k| k == "attachments_datetime"));
        assert!(!index.list_ids().await.unwrap().iter().any(|i| i.as_str() == "datetime"));

        // A second rebuild sees the index written by the first.
        index.rebuild_time_index().await.unwrap();
        let report = index.rebuild_time_index().await.unwrap();
        assert_eq!(report.skipped, 0);
    }
}

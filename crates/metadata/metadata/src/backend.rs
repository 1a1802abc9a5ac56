use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::MetadataError;

/// Key-value plus sorted-set storage used to persist attachment metadata.
///
/// Records are flat string hashes addressed by key. Sorted sets hold string
/// members ordered by an integer score; re-inserting an existing member
/// replaces its score. Implementations must be `Send + Sync` and safe for
/// concurrent access.
#[async_trait]
pub trait MetadataBackend: Send + Sync {
    /// Write `fields` into the hash at `key`, creating it if needed.
    /// Fields not named are left untouched.
    async fn set_fields(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), MetadataError>;

    /// Read every field of the hash at `key`. Returns `None` if the key does
    /// not exist.
    async fn get_fields(&self, key: &str) -> Result<Option<HashMap<String, String>>, MetadataError>;

    /// Delete the hash at `key`. Returns `true` if it existed.
    async fn delete_key(&self, key: &str) -> Result<bool, MetadataError>;

    /// Enumerate every hash key starting with `prefix`, in no particular order.
    async fn list_keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>, MetadataError>;

    /// Insert `member` into sorted set `set` with `score`.
    async fn sorted_insert(&self, set: &str, score: i64, member: &str) -> Result<(), MetadataError>;

    /// Remove `member` from sorted set `set`. Returns `true` if it was present.
    async fn sorted_remove(&self, set: &str, member: &str) -> Result<bool, MetadataError>;

    /// Members of `set` with `min <= score <= max`, ascending by score.
    /// `None` bounds are unbounded.
    async fn sorted_range_by_score(
        &self,
        set: &str,
        min: Option<i64>,
        max: Option<i64>,
    ) -> Result<Vec<String>, MetadataError>;
}

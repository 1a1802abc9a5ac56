use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use stowage_metadata::{MetadataBackend, MetadataError};

/// One sorted set. Members are ordered by score, then by the order in which
/// they were (last) inserted.
#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, (i64, u64)>,
    ordered: BTreeSet<(i64, u64, String)>,
}

impl SortedSet {
    fn insert(&mut self, score: i64, seq: u64, member: &str) {
        if let Some(&(old_score, old_seq)) = self.scores.get(member) {
            if old_score == score {
                return;
            }
            self.ordered.remove(&(old_score, old_seq, member.to_owned()));
        }
        self.scores.insert(member.to_owned(), (score, seq));
        self.ordered.insert((score, seq, member.to_owned()));
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some((score, seq)) => {
                self.ordered.remove(&(score, seq, member.to_owned()));
                true
            }
            None => false,
        }
    }

    fn range(&self, min: Option<i64>, max: Option<i64>) -> Vec<String> {
        let lo = min.unwrap_or(i64::MIN);
        let hi = max.unwrap_or(i64::MAX);
        if lo > hi {
            return Vec::new();
        }
        self.ordered
            .range((lo, 0, String::new())..)
            .take_while(|(score, _, _)| *score <= hi)
            .map(|(_, _, member)| member.clone())
            .collect()
    }
}

/// In-memory [`MetadataBackend`] backed by [`DashMap`]s.
///
/// Ties in a sorted set are broken by insertion order. The backend can be
/// switched to fail every call, or to fail deletes of specific keys, to
/// exercise error paths in callers.
#[derive(Debug, Default)]
pub struct MemoryMetadataBackend {
    hashes: DashMap<String, HashMap<String, String>>,
    sets: DashMap<String, SortedSet>,
    seq: AtomicU64,
    unavailable: AtomicBool,
    failing_deletes: DashSet<String>,
}

impl MemoryMetadataBackend {
    /// Create a new, empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a connection error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every future `delete_key` of `key` fail.
    pub fn fail_deletes_for(&self, key: &str) {
        self.failing_deletes.insert(key.to_owned());
    }

    /// Clear injected failures.
    pub fn clear_failures(&self) {
        self.unavailable.store(false, Ordering::SeqCst);
        self.failing_deletes.clear();
    }

    /// Number of hash keys stored.
    pub fn key_count(&self) -> usize {
        self.hashes.len()
    }

    /// Number of members in sorted set `set`.
    pub fn set_len(&self, set: &str) -> usize {
        self.sets.get(set).map_or(0, |s| s.scores.len())
    }

    fn check_available(&self) -> Result<(), MetadataError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MetadataError::Connection(
                "memory backend marked unavailable".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataBackend for MemoryMetadataBackend {
    async fn set_fields(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), MetadataError> {
        self.check_available()?;
        let mut entry = self.hashes.entry(key.to_owned()).or_default();
        for (name, value) in fields {
            entry.insert((*name).to_owned(), (*value).to_owned());
        }
        Ok(())
    }

    async fn get_fields(&self, key: &str) -> Result<Option<HashMap<String, String>>, MetadataError> {
        self.check_available()?;
        Ok(self.hashes.get(key).map(|entry| entry.value().clone()))
    }

    async fn delete_key(&self, key: &str) -> Result<bool, MetadataError> {
        self.check_available()?;
        if self.failing_deletes.contains(key) {
            return Err(MetadataError::Backend(format!(
                "injected delete failure for {key}"
            )));
        }
        Ok(self.hashes.remove(key).is_some())
    }

    async fn list_keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>, MetadataError> {
        self.check_available()?;
        Ok(self
            .hashes
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn sorted_insert(&self, set: &str, score: i64, member: &str) -> Result<(), MetadataError> {
        self.check_available()?;
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.sets
            .entry(set.to_owned())
            .or_default()
            .insert(score, seq, member);
        Ok(())
    }

    async fn sorted_remove(&self, set: &str, member: &str) -> Result<bool, MetadataError> {
        self.check_available()?;
        Ok(self
            .sets
            .get_mut(set)
            .is_some_and(|mut s| s.remove(member)))
    }

    async fn sorted_range_by_score(
        &self,
        set: &str,
        min: Option<i64>,
        max: Option<i64>,
    ) -> Result<Vec<String>, MetadataError> {
        self.check_available()?;
        Ok(self
            .sets
            .get(set)
            .map(|s| s.range(min, max))
            .unwrap_or_default())
    }
}

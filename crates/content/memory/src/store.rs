use std::collections::HashSet;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use sha2::{Digest, Sha256};

use stowage_content::{ByteStream, Capabilities, ContentError, ContentStore, once};
use stowage_core::ContentId;

/// In-memory [`ContentStore`] backed by a [`DashMap`].
///
/// By default it behaves like local disk: presence is retention. Built with
/// [`with_pinning`](Self::with_pinning) it mimics a content network instead,
/// where `put` pins, `delete` unpins and collects, and local presence can
/// drift from the pin set via [`forget_local`](Self::forget_local).
///
/// Individual identifiers can be made to fail `delete` or `pin`, which lets
/// callers exercise partial-failure paths.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    objects: DashMap<ContentId, Bytes>,
    pinned: DashSet<ContentId>,
    pinning: bool,
    failing_deletes: DashSet<ContentId>,
    failing_pins: DashSet<ContentId>,
}

impl MemoryContentStore {
    /// Create a new, empty store without pin semantics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new, empty store with explicit pin semantics.
    pub fn with_pinning() -> Self {
        Self {
            pinning: true,
            ..Self::default()
        }
    }

    /// Drop the local copy of an object while leaving any pin in place.
    pub fn forget_local(&self, id: &ContentId) {
        self.objects.remove(id);
    }

    /// Whether `id` is currently pinned.
    pub fn is_pinned(&self, id: &ContentId) -> bool {
        self.pinned.contains(id)
    }

    /// Whether `id` is physically present.
    pub fn contains(&self, id: &ContentId) -> bool {
        self.objects.contains_key(id)
    }

    /// Number of objects physically present.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Make every future `delete` of `id` fail with a backend error. In
    /// pinning mode `unpin` fails too, since both release retention.
    pub fn fail_deletes_for(&self, id: &ContentId) {
        self.failing_deletes.insert(id.clone());
    }

    /// Make every future `pin` of `id` fail with a backend error.
    pub fn fail_pins_for(&self, id: &ContentId) {
        self.failing_pins.insert(id.clone());
    }

    /// Clear all injected failures.
    pub fn clear_failures(&self) {
        self.failing_deletes.clear();
        self.failing_pins.clear();
    }

    fn compute_id(data: &[u8]) -> Result<ContentId, ContentError> {
        ContentId::parse(hex::encode(Sha256::digest(data)))
            .map_err(|e| ContentError::Backend(e.to_string()))
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            pinning: self.pinning,
            local_listing: true,
        }
    }

    async fn put(&self, data: Bytes) -> Result<ContentId, ContentError> {
        let id = Self::compute_id(&data)?;
        self.objects.insert(id.clone(), data);
        if self.pinning {
            self.pinned.insert(id.clone());
        }
        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> Result<ByteStream, ContentError> {
        let data = self
            .objects
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ContentError::NotFound(id.to_string()))?;
        Ok(once(data))
    }

    async fn delete(&self, id: &ContentId) -> Result<(), ContentError> {
        if self.failing_deletes.contains(id) {
            return Err(ContentError::Backend(format!("injected delete failure for {id}")));
        }
        self.pinned.remove(id);
        self.objects.remove(id);
        Ok(())
    }

    async fn pin(&self, id: &ContentId) -> Result<(), ContentError> {
        if self.failing_pins.contains(id) {
            return Err(ContentError::Backend(format!("injected pin failure for {id}")));
        }
        if !self.objects.contains_key(id) {
            return Err(ContentError::NotFound(id.to_string()));
        }
        if self.pinning {
            self.pinned.insert(id.clone());
        }
        Ok(())
    }

    async fn unpin(&self, id: &ContentId) -> Result<(), ContentError> {
        if self.pinning {
            if self.failing_deletes.contains(id) {
                return Err(ContentError::Backend(format!("injected unpin failure for {id}")));
            }
            self.pinned.remove(id);
            Ok(())
        } else {
            self.delete(id).await
        }
    }

    async fn list_retained(&self) -> Result<HashSet<ContentId>, ContentError> {
        if self.pinning {
            Ok(self.pinned.iter().map(|id| id.key().clone()).collect())
        } else {
            self.list_local().await
        }
    }

    async fn list_local(&self) -> Result<HashSet<ContentId>, ContentError> {
        Ok(self.objects.iter().map(|entry| entry.key().clone()).collect())
    }
}

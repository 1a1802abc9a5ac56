use std::collections::HashSet;

use async_trait::async_trait;
use bytes::Bytes;

use stowage_core::ContentId;

use crate::error::ContentError;
use crate::stream::ByteStream;

/// Optional capabilities a backend may advertise.
///
/// Callers that need retention semantics check these flags instead of
/// assuming every backend can pin or enumerate its objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Retention is explicit (pin/unpin). Unpinned objects may disappear.
    pub pinning: bool,
    /// [`ContentStore::list_local`] and [`ContentStore::list_retained`] are
    /// implemented.
    pub local_listing: bool,
}

/// Pluggable content-addressable object backend.
///
/// The identifier returned by [`put`](Self::put) is derived from the bytes,
/// so storing identical content twice yields the same identifier.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Short backend name for logs (e.g. `"filesystem"`).
    fn name(&self) -> &str;

    /// Capabilities supported by this backend.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Store `data` and return its content-derived identifier.
    async fn put(&self, data: Bytes) -> Result<ContentId, ContentError>;

    /// Open a stream over the object's bytes.
    ///
    /// Fails with [`ContentError::NotFound`] when the object is absent.
    async fn get(&self, id: &ContentId) -> Result<ByteStream, ContentError>;

    /// Remove (or release retention of) an object. Removing an absent
    /// object succeeds.
    async fn delete(&self, id: &ContentId) -> Result<(), ContentError>;

    /// Mark an object as must-keep. Backends without pinning treat this as
    /// a no-op.
    async fn pin(&self, id: &ContentId) -> Result<(), ContentError> {
        let _ = id;
        Ok(())
    }

    /// Release a pin. Backends without pinning treat this as a no-op.
    async fn unpin(&self, id: &ContentId) -> Result<(), ContentError> {
        let _ = id;
        Ok(())
    }

    /// Identifiers the backend has committed to keep.
    async fn list_retained(&self) -> Result<HashSet<ContentId>, ContentError> {
        Err(ContentError::Unsupported("list_retained"))
    }

    /// Identifiers physically present on this node. May be slow.
    async fn list_local(&self) -> Result<HashSet<ContentId>, ContentError> {
        Err(ContentError::Unsupported("list_local"))
    }
}

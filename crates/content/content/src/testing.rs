use bytes::Bytes;

use stowage_core::ContentId;

use crate::error::ContentError;
use crate::store::ContentStore;
use crate::stream::collect_bytes;

const READ_LIMIT: u64 = 16 * 1024 * 1024;

/// Run the full content store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if a backend call fails unexpectedly.
pub async fn run_store_conformance_tests(store: &dyn ContentStore) -> Result<(), ContentError> {
    test_put_and_get(store).await?;
    test_put_is_deterministic(store).await?;
    test_distinct_content_distinct_ids(store).await?;
    test_get_missing(store).await?;
    test_delete_is_idempotent(store).await?;
    if store.capabilities().local_listing {
        test_list_local_tracks_presence(store).await?;
    }
    Ok(())
}

async fn read_all(store: &dyn ContentStore, id: &ContentId) -> Result<Bytes, ContentError> {
    let stream = store.get(id).await?;
    collect_bytes(stream, READ_LIMIT).await
}

async fn test_put_and_get(store: &dyn ContentStore) -> Result<(), ContentError> {
    let data = Bytes::from_static(b"conformance: put and get");
    let id = store.put(data.clone()).await?;
    let back = read_all(store, &id).await?;
    assert_eq!(back, data, "get should return the stored bytes");
    Ok(())
}

async fn test_put_is_deterministic(store: &dyn ContentStore) -> Result<(), ContentError> {
    let data = Bytes::from_static(b"conformance: same bytes twice");
    let first = store.put(data.clone()).await?;
    let second = store.put(data).await?;
    assert_eq!(first, second, "identical content should yield the same id");
    Ok(())
}

async fn test_distinct_content_distinct_ids(store: &dyn ContentStore) -> Result<(), ContentError> {
    let a = store.put(Bytes::from_static(b"conformance: a")).await?;
    let b = store.put(Bytes::from_static(b"conformance: b")).await?;
    assert_ne!(a, b, "different content should yield different ids");
    Ok(())
}

async fn test_get_missing(store: &dyn ContentStore) -> Result<(), ContentError> {
    let id = store.put(Bytes::from_static(b"conformance: soon gone")).await?;
    store.delete(&id).await?;
    match store.get(&id).await {
        Err(ContentError::NotFound(_)) => Ok(()),
        Err(e) => Err(e),
        Ok(_) => panic!("get after delete should fail with NotFound"),
    }
}

async fn test_delete_is_idempotent(store: &dyn ContentStore) -> Result<(), ContentError> {
    let id = store.put(Bytes::from_static(b"conformance: delete twice")).await?;
    store.delete(&id).await?;
    store.delete(&id).await?;
    Ok(())
}

async fn test_list_local_tracks_presence(store: &dyn ContentStore) -> Result<(), ContentError> {
    let id = store.put(Bytes::from_static(b"conformance: listed")).await?;
    let local = store.list_local().await?;
    assert!(local.contains(&id), "list_local should include stored object");

    store.delete(&id).await?;
    let local = store.list_local().await?;
    assert!(!local.contains(&id), "list_local should drop deleted object");
    Ok(())
}

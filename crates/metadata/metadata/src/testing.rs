use crate::backend::MetadataBackend;
use crate::error::MetadataError;

/// Run the metadata backend conformance test suite.
///
/// Call this from your backend's test module with a fresh backend instance.
/// Keys and set names used here start with `conformance_`.
///
/// # Errors
///
/// Returns an error if a backend call fails. Behavioral mismatches panic.
pub async fn run_backend_conformance_tests(
    backend: &dyn MetadataBackend,
) -> Result<(), MetadataError> {
    test_get_missing(backend).await?;
    test_set_and_get(backend).await?;
    test_set_merges_fields(backend).await?;
    test_delete(backend).await?;
    test_list_by_prefix(backend).await?;
    test_list_by_prefix_skips_sorted_sets(backend).await?;
    test_sorted_range(backend).await?;
    test_sorted_reinsert_moves_member(backend).await?;
    test_sorted_remove(backend).await?;
    Ok(())
}

async fn test_get_missing(backend: &dyn MetadataBackend) -> Result<(), MetadataError> {
    let fields = backend.get_fields("conformance_missing").await?;
    assert!(fields.is_none(), "get_fields on a missing key should return None");
    Ok(())
}

async fn test_set_and_get(backend: &dyn MetadataBackend) -> Result<(), MetadataError> {
    backend
        .set_fields("conformance_rec", &[("mimetype", "image/png"), ("size", "10")])
        .await?;
    let fields = backend
        .get_fields("conformance_rec")
        .await?
        .expect("record should exist after set_fields");
    assert_eq!(fields.get("mimetype").map(String::as_str), Some("image/png"));
    assert_eq!(fields.get("size").map(String::as_str), Some("10"));
    assert_eq!(fields.len(), 2);
    Ok(())
}

async fn test_set_merges_fields(backend: &dyn MetadataBackend) -> Result<(), MetadataError> {
    backend
        .set_fields("conformance_merge", &[("a", "1"), ("b", "2")])
        .await?;
    backend.set_fields("conformance_merge", &[("b", "3")]).await?;
    let fields = backend
        .get_fields("conformance_merge")
        .await?
        .expect("record should exist");
    assert_eq!(fields.get("a").map(String::as_str), Some("1"));
    assert_eq!(fields.get("b").map(String::as_str), Some("3"));
    Ok(())
}

async fn test_delete(backend: &dyn MetadataBackend) -> Result<(), MetadataError> {
    backend.set_fields("conformance_del", &[("k", "v")]).await?;
    assert!(backend.delete_key("conformance_del").await?);
    assert!(backend.get_fields("conformance_del").await?.is_none());
    assert!(
        !backend.delete_key("conformance_del").await?,
        "deleting an absent key should report false"
    );
    Ok(())
}

async fn test_list_by_prefix(backend: &dyn MetadataBackend) -> Result<(), MetadataError> {
    backend.set_fields("conformance_lp_one", &[("k", "v")]).await?;
    backend.set_fields("conformance_lp_two", &[("k", "v")]).await?;
    backend.set_fields("conformance_other", &[("k", "v")]).await?;

    let mut keys = backend.list_keys_by_prefix("conformance_lp_").await?;
    keys.sort();
    assert_eq!(keys, vec!["conformance_lp_one", "conformance_lp_two"]);

    let none = backend.list_keys_by_prefix("conformance_nothing_").await?;
    assert!(none.is_empty());
    Ok(())
}

async fn test_list_by_prefix_skips_sorted_sets(backend: &dyn MetadataBackend) -> Result<(), MetadataError> {
    backend.set_fields("conformance_ls_record", &[("k", "v")]).await?;
    backend.sorted_insert("conformance_ls_index", 1, "record").await?;

    let keys = backend.list_keys_by_prefix("conformance_ls_").await?;
    assert_eq!(keys, vec!["conformance_ls_record"], "sorted sets are not hash keys");
    Ok(())
}

async fn test_sorted_range(backend: &dyn MetadataBackend) -> Result<(), MetadataError> {
    let set = "conformance_range";
    backend.sorted_insert(set, 300, "c").await?;
    backend.sorted_insert(set, 100, "a").await?;
    backend.sorted_insert(set, 200, "b").await?;

    let all = backend.sorted_range_by_score(set, None, None).await?;
    assert_eq!(all, vec!["a", "b", "c"], "members should ascend by score");

    let upto = backend.sorted_range_by_score(set, None, Some(200)).await?;
    assert_eq!(upto, vec!["a", "b"], "max bound should be inclusive");

    let from = backend.sorted_range_by_score(set, Some(200), None).await?;
    assert_eq!(from, vec!["b", "c"], "min bound should be inclusive");

    let empty = backend.sorted_range_by_score(set, Some(201), Some(299)).await?;
    assert!(empty.is_empty());

    let missing = backend
        .sorted_range_by_score("conformance_no_such_set", None, None)
        .await?;
    assert!(missing.is_empty());
    Ok(())
}

async fn test_sorted_reinsert_moves_member(
    backend: &dyn MetadataBackend,
) -> Result<(), MetadataError> {
    let set = "conformance_reinsert";
    backend.sorted_insert(set, 10, "x").await?;
    backend.sorted_insert(set, 20, "y").await?;
    backend.sorted_insert(set, 30, "x").await?;

    let all = backend.sorted_range_by_score(set, None, None).await?;
    assert_eq!(all, vec!["y", "x"], "re-insert should replace the score");
    Ok(())
}

async fn test_sorted_remove(backend: &dyn MetadataBackend) -> Result<(), MetadataError> {
    let set = "conformance_remove";
    backend.sorted_insert(set, 1, "gone").await?;
    backend.sorted_insert(set, 2, "kept").await?;

    assert!(backend.sorted_remove(set, "gone").await?);
    assert!(!backend.sorted_remove(set, "gone").await?);

    let all = backend.sorted_range_by_score(set, None, None).await?;
    assert_eq!(all, vec!["kept"]);
    Ok(())
}

//! Tests for the blob store backends.

use tempfile::TempDir;
use vignette_interface::BlobStore;
use vignette_storage::{FileSystemBlobStore, InMemoryBlobStore};

#[tokio::test]
async fn filesystem_store_and_retrieve() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemBlobStore::new(temp_dir.path()).unwrap();

    let data = b"page bytes";
    let locator = store.put(data, "jobs/j1/page-1.png").await.unwrap();

    assert_eq!(locator.backend, "filesystem");
    assert_eq!(locator.key, "jobs/j1/page-1.png");
    assert_eq!(store.get(&locator).await.unwrap(), data);
    assert_eq!(store.get_key("jobs/j1/page-1.png").await.unwrap(), data);
}

#[tokio::test]
async fn filesystem_put_overwrites_in_place() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemBlobStore::new(temp_dir.path()).unwrap();

    let key = "jobs/j1/lookbook/char_a/portrait.png";
    store.put(b"v1", key).await.unwrap();
    store.put(b"v2", key).await.unwrap();

    assert_eq!(store.get_key(key).await.unwrap(), b"v2");
    let keys = store.list("jobs/j1").await.unwrap();
    assert_eq!(keys, vec![key.to_string()]);
}

#[tokio::test]
async fn filesystem_rejects_escaping_keys() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemBlobStore::new(temp_dir.path()).unwrap();

    assert!(store.put(b"x", "../outside").await.is_err());
    assert!(store.put(b"x", "/etc/passwd").await.is_err());
    assert!(store.put(b"x", "").await.is_err());
}

#[tokio::test]
async fn filesystem_delete_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemBlobStore::new(temp_dir.path()).unwrap();

    store.put(b"x", "jobs/j1/a.png").await.unwrap();
    store.delete("jobs/j1/a.png").await.unwrap();
    store.delete("jobs/j1/a.png").await.unwrap();
    assert!(!store.exists("jobs/j1/a.png").await.unwrap());
}

#[tokio::test]
async fn filesystem_list_walks_subdirectories() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemBlobStore::new(temp_dir.path()).unwrap();

    store.put(b"a", "jobs/j1/lookbook/char_a/portrait.png").await.unwrap();
    store.put(b"b", "jobs/j1/lookbook/char_a/turnaround.png").await.unwrap();
    store.put(b"c", "jobs/j2/page-1.png").await.unwrap();

    let keys = store.list("jobs/j1").await.unwrap();
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().all(|k| k.starts_with("jobs/j1/lookbook")));
}

#[tokio::test]
async fn memory_store_mirrors_filesystem_semantics() {
    let store = InMemoryBlobStore::new();

    let locator = store.put(b"v1", "jobs/j1/a.png").await.unwrap();
    store.put(b"v2", "jobs/j1/a.png").await.unwrap();

    assert_eq!(store.get(&locator).await.unwrap(), b"v2");
    assert_eq!(store.len().await, 1);
    assert!(store.get_key("jobs/j1/missing.png").await.is_err());

    store.delete("jobs/j1/a.png").await.unwrap();
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn signed_urls_echo_stable_uri() {
    let store = InMemoryBlobStore::new();
    let locator = store.put(b"x", "jobs/j1/a.png").await.unwrap();
    let url = store
        .signed_url(&locator, std::time::Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(url.as_deref(), Some("mem://jobs/j1/a.png"));
}

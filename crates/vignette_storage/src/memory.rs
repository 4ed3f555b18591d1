//! In-memory blob storage for tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;
use vignette_error::{StorageError, StorageErrorKind, VignetteResult};
use vignette_interface::{BlobLocator, BlobStore};

/// In-memory storage backend with the same overwrite-by-key semantics as the
/// filesystem backend. Intended for tests.
#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    fn locator(key: &str) -> BlobLocator {
        BlobLocator {
            backend: "memory".to_string(),
            key: key.to_string(),
            uri: format!("mem://{key}"),
        }
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, data: &[u8], key: &str) -> VignetteResult<BlobLocator> {
        if key.is_empty() {
            return Err(StorageError::new(StorageErrorKind::InvalidKey(key.to_string())).into());
        }
        self.objects
            .write()
            .await
            .insert(key.to_string(), data.to_vec());
        Ok(Self::locator(key))
    }

    async fn get(&self, locator: &BlobLocator) -> VignetteResult<Vec<u8>> {
        self.get_key(&locator.key).await
    }

    async fn get_key(&self, key: &str) -> VignetteResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::new(StorageErrorKind::NotFound(key.to_string())).into())
    }

    async fn signed_url(
        &self,
        locator: &BlobLocator,
        _expires_in: Duration,
    ) -> VignetteResult<Option<String>> {
        Ok(Some(locator.uri.clone()))
    }

    async fn delete(&self, key: &str) -> VignetteResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> VignetteResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn list(&self, prefix: &str) -> VignetteResult<Vec<String>> {
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

//! Durable blob storage capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vignette_error::VignetteResult;

/// A stable reference to a stored object.
///
/// The `key` is deterministic (`jobs/{job_id}/...`) so re-puts overwrite in
/// place; `uri` is the backend's own stable form of the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[display("{}", uri)]
pub struct BlobLocator {
    /// Backend name ("filesystem", "memory", ...)
    pub backend: String,
    /// Deterministic object key
    pub key: String,
    /// Backend-native stable URI
    pub uri: String,
}

/// Trait for pluggable durable storage backends.
///
/// Keys used by the pipeline are deterministic, so storing twice under the
/// same key replaces the object rather than creating a sibling.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Durably store bytes under a key, overwriting any existing object.
    async fn put(&self, data: &[u8], key: &str) -> VignetteResult<BlobLocator>;

    /// Retrieve an object's bytes by locator.
    async fn get(&self, locator: &BlobLocator) -> VignetteResult<Vec<u8>>;

    /// Retrieve an object's bytes by key.
    async fn get_key(&self, key: &str) -> VignetteResult<Vec<u8>>;

    /// Produce a time-limited URL for direct access, if the backend supports
    /// it.
    async fn signed_url(
        &self,
        locator: &BlobLocator,
        expires_in: Duration,
    ) -> VignetteResult<Option<String>>;

    /// Delete an object by key. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> VignetteResult<()>;

    /// Whether an object exists under the key.
    async fn exists(&self, key: &str) -> VignetteResult<bool>;

    /// Keys under a prefix, in lexicographic order.
    async fn list(&self, prefix: &str) -> VignetteResult<Vec<String>>;
}

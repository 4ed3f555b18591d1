//! Filesystem-based blob storage.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use vignette_error::{StorageError, StorageErrorKind, VignetteResult};
use vignette_interface::{BlobLocator, BlobStore};

/// Filesystem storage backend.
///
/// Objects live at `{base_path}/{key}` where keys are the pipeline's
/// deterministic paths (`jobs/{job_id}/...`). Re-putting a key overwrites the
/// object in place, which is what gives reference-asset regeneration its
/// replace-not-accumulate behavior.
///
/// Writes go to a temp file first and are renamed into place, so a reader
/// never observes a partial object.
pub struct FileSystemBlobStore {
    base_path: PathBuf,
}

impl FileSystemBlobStore {
    /// Create a new filesystem backend rooted at `base_path`, creating the
    /// directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    #[tracing::instrument(skip(base_path))]
    pub fn new(base_path: impl Into<PathBuf>) -> VignetteResult<Self> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                base_path.display(),
                e
            )))
        })?;

        tracing::info!(path = %base_path.display(), "Opened filesystem blob store");
        Ok(Self { base_path })
    }

    /// Reject keys that would escape the base directory.
    fn checked_path(&self, key: &str) -> VignetteResult<PathBuf> {
        let rel = Path::new(key);
        if key.is_empty()
            || rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::RootDir))
        {
            return Err(StorageError::new(StorageErrorKind::InvalidKey(key.to_string())).into());
        }
        Ok(self.base_path.join(rel))
    }

    fn locator(&self, key: &str, path: &Path) -> BlobLocator {
        BlobLocator {
            backend: "filesystem".to_string(),
            key: key.to_string(),
            uri: format!("file://{}", path.display()),
        }
    }
}

#[async_trait]
impl BlobStore for FileSystemBlobStore {
    #[tracing::instrument(skip(self, data), fields(size = data.len(), key = %key))]
    async fn put(&self, data: &[u8], key: &str) -> VignetteResult<BlobLocator> {
        let path = self.checked_path(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, data).await.map_err(|e| {
            StorageError::new(StorageErrorKind::Write(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;

        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::Write(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
        })?;

        tracing::debug!(key = %key, size = data.len(), "Stored blob");
        Ok(self.locator(key, &path))
    }

    async fn get(&self, locator: &BlobLocator) -> VignetteResult<Vec<u8>> {
        self.get_key(&locator.key).await
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    async fn get_key(&self, key: &str) -> VignetteResult<Vec<u8>> {
        let path = self.checked_path(key)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::new(StorageErrorKind::NotFound(key.to_string())).into()
            } else {
                StorageError::new(StorageErrorKind::Read(format!("{}: {}", path.display(), e)))
                    .into()
            }
        })
    }

    async fn signed_url(
        &self,
        locator: &BlobLocator,
        _expires_in: Duration,
    ) -> VignetteResult<Option<String>> {
        // Local files need no signing; the stable URI doubles as the URL.
        Ok(Some(locator.uri.clone()))
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &str) -> VignetteResult<()> {
        let path = self.checked_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key = %key, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::new(StorageErrorKind::Delete(format!(
                "{}: {}",
                path.display(),
                e
            )))
            .into()),
        }
    }

    async fn exists(&self, key: &str) -> VignetteResult<bool> {
        let path = self.checked_path(key)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn list(&self, prefix: &str) -> VignetteResult<Vec<String>> {
        let root = self.checked_path(prefix)?;
        let mut keys = Vec::new();
        let mut stack = vec![root];
        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StorageError::new(StorageErrorKind::Read(format!(
                        "{}: {}",
                        dir.display(),
                        e
                    )))
                    .into());
                }
            };
            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                StorageError::new(StorageErrorKind::Read(format!("{}: {}", dir.display(), e)))
            })? {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.base_path) {
                    keys.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

//! Load/save for the per-job lookbook document.
//!
//! The document of record is `lookbook.json` in the job's working directory.
//! Every save also mirrors the document to the blob store under
//! `jobs/{job_id}/lookbook.json`, best-effort, so a job can be restored on a
//! fresh host.

use std::path::PathBuf;
use std::sync::Arc;
use vignette_core::{JobPaths, LookbookDoc, VignetteConfig};
use vignette_error::{LookbookError, LookbookErrorKind, VignetteResult};
use vignette_interface::BlobStore;

/// Persistence layer for lookbook documents.
pub struct LookbookStore {
    data_dir: PathBuf,
    blobs: Arc<dyn BlobStore>,
}

impl LookbookStore {
    /// Create a store rooted at the configured data directory.
    pub fn new(config: &VignetteConfig, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            data_dir: config.data_dir().clone(),
            blobs,
        }
    }

    /// Path layout for a job.
    pub fn paths(&self, job_id: &str) -> JobPaths {
        JobPaths::new(&self.data_dir, job_id)
    }

    /// The blob store this lookbook mirrors into.
    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Load the document for create-or-merge flows.
    ///
    /// A missing document yields a fresh one; a corrupt local document is
    /// logged and replaced with a fresh one rather than failing the job. The
    /// blob mirror is consulted before giving up, so a restored job picks up
    /// where it left off.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, job_id: &str) -> LookbookDoc {
        match self.try_load(job_id).await {
            Some(doc) => doc,
            None => LookbookDoc::new(),
        }
    }

    /// Load the document for flows that require a seeded registry.
    ///
    /// # Errors
    ///
    /// Returns `LookbookErrorKind::NotSeeded` when neither the local file nor
    /// the blob mirror holds a parseable document.
    #[tracing::instrument(skip(self))]
    pub async fn load_required(&self, job_id: &str) -> VignetteResult<LookbookDoc> {
        self.try_load(job_id)
            .await
            .ok_or_else(|| LookbookError::new(LookbookErrorKind::NotSeeded(job_id.to_string())).into())
    }

    async fn try_load(&self, job_id: &str) -> Option<LookbookDoc> {
        let paths = self.paths(job_id);
        if let Ok(bytes) = tokio::fs::read(paths.lookbook_file()).await {
            match serde_json::from_slice(&bytes) {
                Ok(doc) => return Some(doc),
                Err(e) => {
                    tracing::warn!(job_id, error = %e, "Local lookbook.json invalid, ignoring");
                }
            }
        }
        match self.blobs.get_key(&paths.lookbook_blob_key()).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(doc) => {
                    tracing::info!(job_id, "Restored lookbook from blob mirror");
                    Some(doc)
                }
                Err(e) => {
                    tracing::warn!(job_id, error = %e, "Mirrored lookbook invalid, ignoring");
                    None
                }
            },
            Err(_) => None,
        }
    }

    /// Persist the document locally, then mirror it to the blob store.
    ///
    /// The local write is atomic (temp file + rename). The mirror is
    /// best-effort: a failure is logged but does not fail the save, since the
    /// local file remains the document of record for a running job.
    ///
    /// # Errors
    ///
    /// Returns `LookbookErrorKind::Save` when the local write fails.
    #[tracing::instrument(skip(self, doc))]
    pub async fn save(&self, job_id: &str, doc: &LookbookDoc) -> VignetteResult<()> {
        let paths = self.paths(job_id);
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| LookbookError::new(LookbookErrorKind::Save(e.to_string())))?;

        let target = paths.lookbook_file();
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                LookbookError::new(LookbookErrorKind::Save(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }
        let temp = target.with_extension("json.tmp");
        tokio::fs::write(&temp, &bytes).await.map_err(|e| {
            LookbookError::new(LookbookErrorKind::Save(format!("{}: {}", temp.display(), e)))
        })?;
        tokio::fs::rename(&temp, &target).await.map_err(|e| {
            LookbookError::new(LookbookErrorKind::Save(format!(
                "rename {} to {}: {}",
                temp.display(),
                target.display(),
                e
            )))
        })?;

        if let Err(e) = self.blobs.put(&bytes, &paths.lookbook_blob_key()).await {
            tracing::warn!(job_id, error = %e, "Lookbook blob mirror failed");
        }
        tracing::debug!(job_id, entities = doc.entities().count(), "Saved lookbook");
        Ok(())
    }
}

//! Persistence for the job manifest.
//!
//! The manifest is the only mutable state shared between concurrent task
//! deliveries for a job, so every mutation goes through a full
//! load-modify-save of the persisted form. A corrupt manifest is fatal for
//! the job — unlike the lookbook there is no sane fresh-start, because a job
//! with no manifest cannot resume meaningfully.

use std::path::PathBuf;
use std::sync::Arc;
use vignette_core::{JobManifest, JobPaths, VignetteConfig};
use vignette_error::{RenderError, RenderErrorKind, VignetteResult};
use vignette_interface::BlobStore;

/// Load/save layer for job manifests, with a durable blob mirror.
pub struct ManifestStore {
    data_dir: PathBuf,
    blobs: Arc<dyn BlobStore>,
}

impl ManifestStore {
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

    fn blob_key(&self, job_id: &str) -> String {
        format!("jobs/{job_id}/manifest.json")
    }

    /// Load a manifest if one exists locally or in the blob mirror.
    ///
    /// # Errors
    ///
    /// A present-but-unparseable manifest is `ManifestCorrupt`, a fatal
    /// condition: callers must re-create the job.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, job_id: &str) -> VignetteResult<Option<JobManifest>> {
        let local = self.paths(job_id).manifest_file();
        match tokio::fs::read(&local).await {
            Ok(bytes) => {
                let manifest = serde_json::from_slice(&bytes).map_err(|e| {
                    RenderError::new(RenderErrorKind::ManifestCorrupt {
                        job_id: job_id.to_string(),
                        message: e.to_string(),
                    })
                })?;
                return Ok(Some(manifest));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(RenderError::new(RenderErrorKind::ManifestCorrupt {
                    job_id: job_id.to_string(),
                    message: e.to_string(),
                })
                .into());
            }
        }
        match self.blobs.get_key(&self.blob_key(job_id)).await {
            Ok(bytes) => {
                let manifest: JobManifest = serde_json::from_slice(&bytes).map_err(|e| {
                    RenderError::new(RenderErrorKind::ManifestCorrupt {
                        job_id: job_id.to_string(),
                        message: format!("mirror: {e}"),
                    })
                })?;
                tracing::info!(job_id, "Restored manifest from blob mirror");
                // Re-establish the local copy for subsequent mutations.
                self.save(job_id, &manifest).await?;
                Ok(Some(manifest))
            }
            Err(_) => Ok(None),
        }
    }

    /// Load a manifest that must exist.
    ///
    /// # Errors
    ///
    /// `UnknownJob` when no manifest exists anywhere; `ManifestCorrupt` when
    /// one exists but cannot be parsed.
    pub async fn load_required(&self, job_id: &str) -> VignetteResult<JobManifest> {
        self.load(job_id)
            .await?
            .ok_or_else(|| RenderError::new(RenderErrorKind::UnknownJob(job_id.to_string())).into())
    }

    /// Persist a manifest atomically and mirror it to the blob store.
    ///
    /// # Errors
    ///
    /// Fails when the local write fails; the mirror is best-effort.
    #[tracing::instrument(skip(self, manifest))]
    pub async fn save(&self, job_id: &str, manifest: &JobManifest) -> VignetteResult<()> {
        let target = self.paths(job_id).manifest_file();
        let bytes = serde_json::to_vec_pretty(manifest).map_err(|e| {
            RenderError::new(RenderErrorKind::ManifestCorrupt {
                job_id: job_id.to_string(),
                message: e.to_string(),
            })
        })?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                RenderError::new(RenderErrorKind::ManifestCorrupt {
                    job_id: job_id.to_string(),
                    message: format!("{}: {}", parent.display(), e),
                })
            })?;
        }
        let temp = target.with_extension("json.tmp");
        tokio::fs::write(&temp, &bytes).await.map_err(|e| {
            RenderError::new(RenderErrorKind::ManifestCorrupt {
                job_id: job_id.to_string(),
                message: format!("{}: {}", temp.display(), e),
            })
        })?;
        tokio::fs::rename(&temp, &target).await.map_err(|e| {
            RenderError::new(RenderErrorKind::ManifestCorrupt {
                job_id: job_id.to_string(),
                message: format!("{}: {}", target.display(), e),
            })
        })?;

        if let Err(e) = self.blobs.put(&bytes, &self.blob_key(job_id)).await {
            tracing::warn!(job_id, error = %e, "Manifest blob mirror failed");
        }
        Ok(())
    }

    /// Read-modify-write helper: load the persisted manifest, apply `mutate`,
    /// save the result.
    ///
    /// # Errors
    ///
    /// Propagates load failures, the mutation's own error, and save failures.
    pub async fn mutate<R, F>(&self, job_id: &str, mutate: F) -> VignetteResult<R>
    where
        F: FnOnce(&mut JobManifest) -> VignetteResult<R>,
    {
        let mut manifest = self.load_required(job_id).await?;
        let result = mutate(&mut manifest)?;
        self.save(job_id, &manifest).await?;
        Ok(result)
    }
}

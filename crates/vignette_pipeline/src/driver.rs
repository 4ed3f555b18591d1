//! The resumable job driver.
//!
//! The driver is what a task-queue delivery invokes. It is written for
//! at-least-once delivery: job state is restored from durable storage when
//! the local working directory is empty (the worker may be a fresh
//! instance), the render loop skips pages already done, and finalization is
//! guarded so it runs exactly once.

use crate::manifest_store::ManifestStore;
use crate::renderer::{write_atomic, ChainOutcome, PageRenderer};
use crate::retry::RetryPolicy;
use std::sync::Arc;
use uuid::Uuid;
use vignette_core::{
    ComicRequest, FinalArtifact, JobManifest, JobPaths, VignetteConfig,
};
use vignette_error::{
    RenderError, RenderErrorKind, StorageError, StorageErrorKind, VignetteResult,
};
use vignette_interface::{ArtifactFormat, BlobStore, ImageDriver, Packager, TaskHandle, TaskQueue};

/// Queue target for render deliveries.
const RENDER_TARGET: &str = "render";

/// Orchestrates a job's lifecycle: creation, delivery, resume, cancel, and
/// finalization.
pub struct JobDriver {
    config: VignetteConfig,
    blobs: Arc<dyn BlobStore>,
    queue: Arc<dyn TaskQueue>,
    packager: Arc<dyn Packager>,
    renderer: PageRenderer,
    manifests: ManifestStore,
    retry: RetryPolicy,
}

impl JobDriver {
    /// Build a driver over the full capability set.
    pub fn new(
        config: &VignetteConfig,
        blobs: Arc<dyn BlobStore>,
        images: Arc<dyn ImageDriver>,
        queue: Arc<dyn TaskQueue>,
        packager: Arc<dyn Packager>,
    ) -> Self {
        Self {
            config: config.clone(),
            blobs: blobs.clone(),
            queue,
            packager,
            renderer: PageRenderer::new(config, blobs.clone(), images),
            manifests: ManifestStore::new(config, blobs),
            retry: RetryPolicy::from_config(config),
        }
    }

    fn paths(&self, job_id: &str) -> JobPaths {
        self.manifests.paths(job_id)
    }

    /// Create a job: validate and persist the request, seed the manifest,
    /// and enqueue the first delivery. Returns the new job id.
    ///
    /// # Errors
    ///
    /// Validation errors surface immediately and leave no state behind.
    #[tracing::instrument(skip(self, request), fields(pages = request.pages.len()))]
    pub async fn create_job(&self, request: &ComicRequest) -> VignetteResult<String> {
        request.validate()?;
        let job_id = Uuid::new_v4().simple().to_string();
        let paths = self.paths(&job_id);

        self.persist_request(&paths, request).await?;
        self.manifests
            .save(&job_id, &JobManifest::seeded(request.page_count()))
            .await?;

        let handle = self.enqueue_delivery(&job_id).await?;
        tracing::info!(job_id, pages = request.page_count(), "Created job");
        self.manifests
            .mutate(&job_id, |m| {
                m.task_name = Some(handle.0.clone());
                Ok(())
            })
            .await?;
        Ok(job_id)
    }

    /// Handle one task-queue delivery. Safe to call more than once for the
    /// same job: already-done pages are skipped and a cancelled job is
    /// acknowledged without work.
    ///
    /// # Errors
    ///
    /// Fails on unknown jobs and corrupt manifests; render-level blocked and
    /// failed conditions come back as a [`ChainOutcome`].
    #[tracing::instrument(skip(self))]
    pub async fn deliver(&self, job_id: &str) -> VignetteResult<ChainOutcome> {
        let request = self.load_request(job_id).await?;
        let manifest = self.manifests.load_required(job_id).await?;
        if manifest.cancelled {
            tracing::info!(job_id, "Delivery for cancelled job, acknowledging");
            return Ok(ChainOutcome::Cancelled {
                next_page: manifest.first_unfinished().unwrap_or(0),
            });
        }

        let outcome = self.renderer.render_chain(job_id, &request).await?;

        if outcome == ChainOutcome::Completed {
            let manifest = self.manifests.load_required(job_id).await?;
            if manifest.all_done() && manifest.final_artifact.is_none() {
                self.finalize(job_id, &request).await?;
            }
        }
        Ok(outcome)
    }

    /// Current manifest snapshot. Always coherent: callers distinguish
    /// running, blocked, failed, and done purely from its content.
    pub async fn status(&self, job_id: &str) -> VignetteResult<JobManifest> {
        self.manifests.load_required(job_id).await
    }

    /// Re-trigger delivery for a job. Safe to call repeatedly; the render
    /// loop re-enters failed and blocked pages and skips done ones.
    ///
    /// # Errors
    ///
    /// Fails when the job is unknown or the enqueue fails.
    #[tracing::instrument(skip(self))]
    pub async fn resume(&self, job_id: &str) -> VignetteResult<TaskHandle> {
        // Existence check; resume of an unknown job is a caller error.
        let _ = self.manifests.load_required(job_id).await?;
        let handle = self.enqueue_delivery(job_id).await?;
        self.manifests
            .mutate(job_id, |m| {
                m.task_name = Some(handle.0.clone());
                Ok(())
            })
            .await?;
        tracing::info!(job_id, handle = %handle, "Resume enqueued");
        Ok(handle)
    }

    /// Set the cooperative cancellation latch and best-effort remove any
    /// queued delivery. The latch is authoritative; queue removal is an
    /// optimization and its failure is tolerated.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, job_id: &str) -> VignetteResult<()> {
        let task_name = self
            .manifests
            .mutate(job_id, |m| {
                m.cancel();
                Ok(m.task_name.clone())
            })
            .await?;
        if let Some(name) = task_name {
            match self.queue.cancel(&TaskHandle(name.clone())).await {
                Ok(removed) => {
                    tracing::info!(job_id, removed, "Cancelled job");
                }
                Err(e) => {
                    tracing::warn!(job_id, error = %e, "Queued delivery removal failed");
                }
            }
        }
        Ok(())
    }

    async fn enqueue_delivery(&self, job_id: &str) -> VignetteResult<TaskHandle> {
        let payload = serde_json::json!({
            "job_id": job_id,
            "state_prefix": self.paths(job_id).blob_prefix(),
        });
        self.queue.enqueue(RENDER_TARGET, &payload, None).await
    }

    /// Persist the request locally and mirror it durably, so any delivery
    /// can replay the job on a fresh worker.
    async fn persist_request(
        &self,
        paths: &JobPaths,
        request: &ComicRequest,
    ) -> VignetteResult<()> {
        let bytes = serde_json::to_vec_pretty(request)
            .map_err(|e| StorageError::new(StorageErrorKind::Write(e.to_string())))?;
        write_atomic(&paths.request_file(), &bytes).await?;
        if let Err(e) = self.blobs.put(&bytes, &paths.request_blob_key()).await {
            tracing::warn!(error = %e, "Request blob mirror failed");
        }
        Ok(())
    }

    /// Load the job's request, restoring the local copy from durable storage
    /// when the worker has no local state.
    async fn load_request(&self, job_id: &str) -> VignetteResult<ComicRequest> {
        let paths = self.paths(job_id);
        let local = paths.request_file();
        let bytes = match tokio::fs::read(&local).await {
            Ok(bytes) => bytes,
            Err(_) => {
                let bytes = self
                    .blobs
                    .get_key(&paths.request_blob_key())
                    .await
                    .map_err(|_| {
                        RenderError::new(RenderErrorKind::UnknownJob(job_id.to_string()))
                    })?;
                write_atomic(&local, &bytes).await?;
                tracing::info!(job_id, "Restored request from blob mirror");
                bytes
            }
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            RenderError::new(RenderErrorKind::ManifestCorrupt {
                job_id: job_id.to_string(),
                message: format!("request.json: {e}"),
            })
            .into()
        })
    }

    /// Package and upload the final artifact. Runs exactly once per job:
    /// `final` transitions from `None` to populated even when packaging or
    /// upload fails, so callers retry retrieval rather than regeneration.
    #[tracing::instrument(skip(self, request))]
    async fn finalize(&self, job_id: &str, request: &ComicRequest) -> VignetteResult<()> {
        let paths = self.paths(job_id);
        let format = if request.return_pdf {
            ArtifactFormat::Pdf
        } else {
            ArtifactFormat::Zip
        };

        // A fresh worker may hold the manifest but not the page files.
        let mut page_files = Vec::new();
        for number in 1..=request.page_count() {
            let local = paths.page_file(number);
            if !tokio::fs::try_exists(&local).await.unwrap_or(false) {
                let bytes = self.blobs.get_key(&paths.page_blob_key(number)).await?;
                write_atomic(&local, &bytes).await?;
            }
            page_files.push(local);
        }

        let out_path = paths.workdir().join(format.file_name());
        let artifact = match self.packager.package(&page_files, format, &out_path).await {
            Ok(()) => self.upload_artifact(&paths, format, &out_path).await,
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Packaging failed");
                // The attempted path points callers at the workdir that still
                // holds the rendered pages.
                FinalArtifact {
                    mime: format.mime().to_string(),
                    locator: None,
                    local: Some(out_path.display().to_string()),
                    upload_error: Some(
                        RenderError::new(RenderErrorKind::Packaging(e.to_string())).to_string(),
                    ),
                }
            }
        };
        let uploaded = artifact.locator.is_some();

        self.manifests
            .mutate(job_id, |m| {
                if m.final_artifact.is_none() {
                    m.final_artifact = Some(artifact);
                }
                Ok(())
            })
            .await?;
        tracing::info!(job_id, uploaded, "Finalized job");

        if *self.config.prune_pages_after_final() {
            for file in &page_files {
                if let Err(e) = tokio::fs::remove_file(file).await {
                    tracing::debug!(path = %file.display(), error = %e, "Page prune failed");
                }
            }
        }
        if uploaded && *self.config.prune_artifact_after_upload() {
            if let Err(e) = tokio::fs::remove_file(&out_path).await {
                tracing::debug!(path = %out_path.display(), error = %e, "Artifact prune failed");
            }
        }
        Ok(())
    }

    async fn upload_artifact(
        &self,
        paths: &JobPaths,
        format: ArtifactFormat,
        out_path: &std::path::Path,
    ) -> FinalArtifact {
        let mime = format.mime().to_string();
        let local = Some(out_path.display().to_string());
        let bytes = match tokio::fs::read(out_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return FinalArtifact {
                    mime,
                    locator: None,
                    local,
                    upload_error: Some(format!("{}: {}", out_path.display(), e)),
                };
            }
        };
        let key = paths.final_blob_key(format.file_name());
        let uploaded = self
            .retry
            .run(|| {
                let blobs = self.blobs.clone();
                let key = key.clone();
                let bytes = bytes.clone();
                async move { blobs.put(&bytes, &key).await }
            })
            .await;
        match uploaded {
            Ok(locator) => FinalArtifact {
                mime,
                locator: Some(locator.key),
                local,
                upload_error: None,
            },
            Err(e) => FinalArtifact {
                mime,
                locator: None,
                local,
                upload_error: Some(e.to_string()),
            },
        }
    }
}

//! The chained page renderer.
//!
//! Pages render strictly sequentially: each page's reference set includes
//! the previous page's rendered output, which is what carries staging and
//! likeness continuity across a chain the image model has no native
//! continuity primitive for. A page that cannot resolve its entity
//! references blocks the whole chain rather than being skipped — a skipped
//! page would silently chain the next page off the wrong predecessor.

use crate::manifest_store::ManifestStore;
use crate::prompt::compose_page_prompt;
use crate::refs::{BoundReference, ReferenceResolver, ReferenceSet};
use crate::retry::RetryPolicy;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use vignette_core::{
    ComicRequest, JobPaths, LookbookDoc, Page, PageState, PageStatus, VignetteConfig,
};
use vignette_error::{
    RenderError, RenderErrorKind, StorageError, StorageErrorKind, VignetteResult,
};
use vignette_interface::{BlobStore, ImageDriver, ImageParams, ImageSource};
use vignette_lookbook::{LookbookStore, RefAssetGenerator};

/// How one render pass over a job's pages ended.
///
/// Callers must handle the blocked case distinctly from failure: blocked
/// pages are fixed by seeding or generating the missing entities and
/// resuming, not by retrying.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome {
    /// Every page was carried as far as it can go this pass
    Completed,
    /// A page's entity references could not be resolved; the chain stopped
    Blocked {
        /// The blocked page
        page: u32,
        /// Unresolvable ids with reasons
        missing: BTreeMap<String, String>,
    },
    /// A page exhausted its retry budget; the chain stopped
    Failed {
        /// The failed page
        page: u32,
        /// Last error message
        error: String,
    },
    /// The cancellation latch was observed before this page started
    Cancelled {
        /// First page left untouched
        next_page: u32,
    },
}

/// Renders a job's pages in order against the entity registry.
pub struct PageRenderer {
    config: VignetteConfig,
    blobs: Arc<dyn BlobStore>,
    images: Arc<dyn ImageDriver>,
    assets: RefAssetGenerator,
    resolver: ReferenceResolver,
    manifests: ManifestStore,
    retry: RetryPolicy,
}

impl PageRenderer {
    /// Build a renderer over the storage and generation capabilities.
    pub fn new(
        config: &VignetteConfig,
        blobs: Arc<dyn BlobStore>,
        images: Arc<dyn ImageDriver>,
    ) -> Self {
        let store = LookbookStore::new(config, blobs.clone());
        Self {
            config: config.clone(),
            blobs: blobs.clone(),
            images: images.clone(),
            assets: RefAssetGenerator::new(config, store, images),
            resolver: ReferenceResolver::new(config, blobs.clone()),
            manifests: ManifestStore::new(config, blobs),
            retry: RetryPolicy::from_config(config),
        }
    }

    /// The manifest store this renderer mutates.
    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    /// Render the job's pages from wherever the manifest says it left off.
    ///
    /// Pages already `done` are skipped structurally; the chain reference is
    /// re-pointed at each done page's artifact as the loop passes it.
    ///
    /// # Errors
    ///
    /// Fails on fatal conditions only: unknown job, corrupt manifest,
    /// unresolvable chain artifact, unwritable local output. Per-page
    /// blocked/failed conditions are recorded in the manifest and returned
    /// as a [`ChainOutcome`] instead.
    #[tracing::instrument(skip(self, request), fields(pages = request.pages.len()))]
    pub async fn render_chain(
        &self,
        job_id: &str,
        request: &ComicRequest,
    ) -> VignetteResult<ChainOutcome> {
        let paths = self.manifests.paths(job_id);
        let mut chain_ref = self.root_reference(request).await?;

        for page in &request.pages {
            let number = page.page_number;
            let manifest = self.manifests.load_required(job_id).await?;
            if manifest.cancelled {
                tracing::info!(job_id, next_page = number, "Cancellation observed, stopping chain");
                return Ok(ChainOutcome::Cancelled { next_page: number });
            }
            match manifest.page_status(number) {
                PageStatus::Done => {
                    chain_ref = Some(self.chained_reference(&paths, number).await?);
                    continue;
                }
                PageStatus::Rendered => {
                    // Render already succeeded; only the upload needs another
                    // attempt. Regenerating here would discard a good page.
                    self.retry_upload(job_id, &paths, number).await?;
                    chain_ref = Some(self.chained_reference(&paths, number).await?);
                    continue;
                }
                _ => {}
            }

            match self
                .render_page(job_id, &paths, request, page, chain_ref.take())
                .await?
            {
                PageOutcome::Rendered(reference) => {
                    chain_ref = Some(reference);
                }
                PageOutcome::Blocked(missing) => {
                    return Ok(ChainOutcome::Blocked {
                        page: number,
                        missing,
                    });
                }
                PageOutcome::Failed(error) => {
                    return Ok(ChainOutcome::Failed {
                        page: number,
                        error,
                    });
                }
            }
        }
        tracing::info!(job_id, "Chain pass complete");
        Ok(ChainOutcome::Completed)
    }

    async fn render_page(
        &self,
        job_id: &str,
        paths: &JobPaths,
        request: &ComicRequest,
        page: &Page,
        chain_ref: Option<BoundReference>,
    ) -> VignetteResult<PageOutcome> {
        let number = page.page_number;
        let ids = page.referenced_ids();
        let ids_used: Vec<String> = ids.iter().cloned().collect();
        let prev_label = chain_ref.as_ref().map(|r| r.label.clone());

        self.manifests
            .mutate(job_id, |m| {
                m.advance(
                    number,
                    PageStatus::Running,
                    PageState {
                        ids_used: ids_used.clone(),
                        prev_reference: prev_label.clone(),
                        ..PageState::default()
                    },
                )
            })
            .await?;

        // Resolve entities, generating any missing default assets.
        let doc: LookbookDoc;
        if ids.is_empty() {
            doc = self.assets.store().load(job_id).await;
        } else {
            let ensured = self.assets.ensure_assets(job_id, &ids_used, false).await?;
            if !ensured.missing.is_empty() {
                if *self.config.allow_missing_refs() {
                    tracing::warn!(
                        job_id,
                        page = number,
                        missing = ?ensured.missing,
                        "Continuing without references (allow_missing_refs)"
                    );
                } else {
                    self.manifests
                        .mutate(job_id, |m| {
                            m.advance(
                                number,
                                PageStatus::BlockedMissingRefs,
                                PageState {
                                    missing: Some(ensured.missing.clone()),
                                    ..PageState::default()
                                },
                            )
                        })
                        .await?;
                    return Ok(PageOutcome::Blocked(ensured.missing));
                }
            }
            doc = self.assets.store().load_required(job_id).await?;
        }

        let references = self.resolver.resolve(paths, &doc, &ids, chain_ref).await;
        let prompt = compose_page_prompt(
            request,
            page,
            &doc,
            &ids,
            &references.binding_block(),
            prev_label.is_some(),
        );

        let attempts = AtomicU32::new(0);
        match self.generate(&prompt, &references, &attempts).await {
            Ok(bytes) => {
                let local = paths.page_file(number);
                write_atomic(&local, &bytes).await?;
                self.manifests
                    .mutate(job_id, |m| {
                        m.advance(
                            number,
                            PageStatus::Rendered,
                            PageState {
                                attempts: Some(attempts.load(Ordering::Relaxed)),
                                local: Some(local.display().to_string()),
                                ..PageState::default()
                            },
                        )
                    })
                    .await?;
                self.upload_page(job_id, paths, number, &bytes).await?;
                Ok(PageOutcome::Rendered(BoundReference {
                    label: format!("previous page ({number})"),
                    source: ImageSource::Path(local),
                }))
            }
            Err(e) => {
                let error = RenderError::new(RenderErrorKind::PageExhausted {
                    page: number,
                    attempts: self.retry.attempts(),
                    last_error: e.to_string(),
                })
                .to_string();
                self.manifests
                    .mutate(job_id, |m| {
                        m.advance(
                            number,
                            PageStatus::Failed,
                            PageState {
                                attempts: Some(attempts.load(Ordering::Relaxed)),
                                last_error: Some(error.clone()),
                                ..PageState::default()
                            },
                        )
                    })
                    .await?;
                Ok(PageOutcome::Failed(error))
            }
        }
    }

    async fn generate(
        &self,
        prompt: &str,
        references: &ReferenceSet,
        attempts: &AtomicU32,
    ) -> VignetteResult<Vec<u8>> {
        let sources = references.sources();
        let params = ImageParams::new(self.config.image_model(), self.config.image_size());
        self.retry
            .run(|| {
                attempts.fetch_add(1, Ordering::Relaxed);
                let images = self.images.clone();
                let prompt = prompt.to_string();
                let sources = sources.clone();
                let params = params.clone();
                async move { images.generate_image(&prompt, &sources, &params).await }
            })
            .await
    }

    /// Best-effort durable upload. Success advances the page to `done`;
    /// failure keeps it `rendered` with the error recorded, and the chain
    /// carries on — the local bytes are retained for a later upload retry.
    async fn upload_page(
        &self,
        job_id: &str,
        paths: &JobPaths,
        number: u32,
        bytes: &[u8],
    ) -> VignetteResult<()> {
        let key = paths.page_blob_key(number);
        let uploaded = self
            .retry
            .run(|| {
                let blobs = self.blobs.clone();
                let key = key.clone();
                let bytes = bytes.to_vec();
                async move { blobs.put(&bytes, &key).await }
            })
            .await;
        match uploaded {
            Ok(locator) => {
                self.manifests
                    .mutate(job_id, |m| {
                        m.advance(
                            number,
                            PageStatus::Done,
                            PageState {
                                remote: Some(locator.key.clone()),
                                uploaded: Some(true),
                                ..PageState::default()
                            },
                        )
                    })
                    .await
            }
            Err(e) => {
                tracing::warn!(job_id, page = number, error = %e, "Page upload failed, keeping rendered");
                self.manifests
                    .mutate(job_id, |m| {
                        m.advance(
                            number,
                            PageStatus::Rendered,
                            PageState {
                                uploaded: Some(false),
                                upload_error: Some(e.to_string()),
                                ..PageState::default()
                            },
                        )
                    })
                    .await
            }
        }
    }

    /// Re-attempt the upload of an already-rendered page from its local file.
    async fn retry_upload(&self, job_id: &str, paths: &JobPaths, number: u32) -> VignetteResult<()> {
        let local = paths.page_file(number);
        let bytes = tokio::fs::read(&local).await.map_err(|e| {
            StorageError::new(StorageErrorKind::Read(format!("{}: {}", local.display(), e)))
        })?;
        self.upload_page(job_id, paths, number, &bytes).await
    }

    /// Local artifact of a done/rendered page, restoring it from durable
    /// storage when the worker is a fresh instance.
    ///
    /// # Errors
    ///
    /// Fails when the artifact exists neither locally nor durably; the
    /// chain cannot continue past a hole.
    async fn chained_reference(
        &self,
        paths: &JobPaths,
        number: u32,
    ) -> VignetteResult<BoundReference> {
        let local = paths.page_file(number);
        if !tokio::fs::try_exists(&local).await.unwrap_or(false) {
            let bytes = self
                .blobs
                .get_key(&paths.page_blob_key(number))
                .await
                .map_err(|e| {
                    RenderError::new(RenderErrorKind::MissingRootReference(format!(
                        "page {number} artifact unavailable for chaining: {e}"
                    )))
                })?;
            write_atomic(&local, &bytes).await?;
        }
        Ok(BoundReference {
            label: format!("previous page ({number})"),
            source: ImageSource::Path(local),
        })
    }

    /// Resolve the job's root reference image, if the request names one.
    async fn root_reference(&self, request: &ComicRequest) -> VignetteResult<Option<BoundReference>> {
        let Some(image_ref) = request.image_ref.as_deref().filter(|r| !r.is_empty()) else {
            return Ok(None);
        };
        let source = if let Some(path) = image_ref.strip_prefix("file://") {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                RenderError::new(RenderErrorKind::MissingRootReference(format!("{path}: {e}")))
            })?;
            ImageSource::Bytes(bytes)
        } else {
            let bytes = self.blobs.get_key(image_ref).await.map_err(|e| {
                RenderError::new(RenderErrorKind::MissingRootReference(format!(
                    "{image_ref}: {e}"
                )))
            })?;
            ImageSource::Bytes(bytes)
        };
        Ok(Some(BoundReference {
            label: "cover (root reference)".to_string(),
            source,
        }))
    }
}

enum PageOutcome {
    Rendered(BoundReference),
    Blocked(BTreeMap<String, String>),
    Failed(String),
}

/// Write bytes to a temp path and rename into place, so a crash mid-write
/// never leaves a partial page a reader could mistake for the artifact.
pub(crate) async fn write_atomic(target: &Path, bytes: &[u8]) -> VignetteResult<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                parent.display(),
                e
            )))
        })?;
    }
    let temp = target.with_extension("part");
    tokio::fs::write(&temp, bytes).await.map_err(|e| {
        StorageError::new(StorageErrorKind::Write(format!("{}: {}", temp.display(), e)))
    })?;
    tokio::fs::rename(&temp, target).await.map_err(|e| {
        StorageError::new(StorageErrorKind::Write(format!(
            "rename {} to {}: {}",
            temp.display(),
            target.display(),
            e
        )))
    })?;
    Ok(())
}

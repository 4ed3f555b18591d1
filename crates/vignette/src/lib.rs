//! Umbrella crate for the Vignette comic pipeline.
//!
//! Re-exports the public surface of the workspace: error types, the domain
//! model, capability traits, storage backends, lookbook services, and the
//! render pipeline.
//!
//! # Overview
//!
//! A job turns a validated [`ComicRequest`] into a sequence of page images
//! with consistent character, location, and prop likeness. The
//! [`LookbookStore`] holds each job's entity registry, the
//! [`RefAssetGenerator`] fills in reference assets, and the [`JobDriver`]
//! runs the chained, resumable render loop recorded in the [`JobManifest`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use vignette::{FileSystemBlobStore, JobDriver, VignetteConfig};
//! # use vignette::{ImageDriver, Packager, TaskQueue};
//!
//! # async fn demo(
//! #     images: Arc<dyn ImageDriver>,
//! #     queue: Arc<dyn TaskQueue>,
//! #     packager: Arc<dyn Packager>,
//! # ) -> vignette::VignetteResult<()> {
//! let config = VignetteConfig::from_env()?;
//! let blobs = Arc::new(FileSystemBlobStore::new(config.data_dir())?);
//! let driver = JobDriver::new(&config, blobs, images, queue, packager);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub use vignette_core::{
    display_name_from_id, ComicRequest, Entity, EntityKind, EntityStub, FinalArtifact,
    JobManifest, JobPaths, LookbookDoc, Page, PageState, PageStatus, Panel, ReferenceAsset,
    ReturnMode, ScriptDelta, UsageThresholds, VignetteConfig, VignetteConfigBuilder, VisualCanon,
    LOOKBOOK_VERSION,
};
pub use vignette_error::{VignetteError, VignetteErrorKind, VignetteResult};
pub use vignette_interface::{
    ArtifactFormat, BlobLocator, BlobStore, ImageDriver, ImageParams, ImageSource, Packager,
    ScriptDriver, TaskHandle, TaskQueue,
};
pub use vignette_lookbook::{
    merge_delta, repair_pages, unknown_ids, AssetReport, CleanOutcome, CleanRequest,
    EnsureOutcome, LookbookStore, RefAssetGenerator, SeedOutcome, SeedRequest, UsageAudit,
};
pub use vignette_pipeline::{
    sweep_expired_jobs, BoundReference, ChainOutcome, JobDriver, ManifestStore, PageRenderer,
    ReferenceResolver, ReferenceSet, RetryPolicy,
};
pub use vignette_storage::{FileSystemBlobStore, InMemoryBlobStore};

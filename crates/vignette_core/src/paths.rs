//! Per-job filesystem layout and deterministic blob keys.
//!
//! Everything a job persists lives under one directory and one blob-key
//! prefix, both derived from the job id:
//!
//! ```text
//! {data_dir}/jobs/{job_id}/
//! ├── request.json
//! ├── manifest.json
//! ├── lookbook.json
//! ├── page-1.png ...
//! ├── _ref_cache/          # resolved reference image cache
//! └── lookbook/{entity_id}/{type}.png
//! ```

use std::path::{Path, PathBuf};

/// Path and key layout for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    job_id: String,
    workdir: PathBuf,
}

impl JobPaths {
    /// Layout for `job_id` under the configured data directory.
    pub fn new(data_dir: &Path, job_id: impl Into<String>) -> Self {
        let job_id = job_id.into();
        let workdir = data_dir.join("jobs").join(&job_id);
        Self { job_id, workdir }
    }

    /// The job id.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// The job's working directory.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// `request.json` — the replayable job request.
    pub fn request_file(&self) -> PathBuf {
        self.workdir.join("request.json")
    }

    /// `manifest.json` — the job manifest.
    pub fn manifest_file(&self) -> PathBuf {
        self.workdir.join("manifest.json")
    }

    /// `lookbook.json` — the entity registry.
    pub fn lookbook_file(&self) -> PathBuf {
        self.workdir.join("lookbook.json")
    }

    /// Rendered page image for a 1-based page number.
    pub fn page_file(&self, page: u32) -> PathBuf {
        self.workdir.join(format!("page-{page}.png"))
    }

    /// Cache directory for resolved reference images.
    pub fn ref_cache_dir(&self) -> PathBuf {
        self.workdir.join("_ref_cache")
    }

    /// Local reference asset file for an entity and asset type.
    pub fn asset_file(&self, entity_id: &str, asset_type: &str) -> PathBuf {
        self.workdir
            .join("lookbook")
            .join(entity_id)
            .join(format!("{asset_type}.png"))
    }

    /// Local directory holding an entity's reference assets.
    pub fn asset_dir(&self, entity_id: &str) -> PathBuf {
        self.workdir.join("lookbook").join(entity_id)
    }

    /// Blob key prefix for everything this job stores durably.
    pub fn blob_prefix(&self) -> String {
        format!("jobs/{}", self.job_id)
    }

    /// Blob key of the mirrored lookbook document.
    pub fn lookbook_blob_key(&self) -> String {
        format!("jobs/{}/lookbook.json", self.job_id)
    }

    /// Blob key of the mirrored request document.
    pub fn request_blob_key(&self) -> String {
        format!("jobs/{}/request.json", self.job_id)
    }

    /// Blob key of a reference asset. Stable and deterministic, so
    /// regeneration overwrites in place.
    pub fn asset_blob_key(&self, entity_id: &str, asset_type: &str) -> String {
        format!("jobs/{}/lookbook/{}/{}.png", self.job_id, entity_id, asset_type)
    }

    /// Blob key of an uploaded page image.
    pub fn page_blob_key(&self, page: u32) -> String {
        format!("jobs/{}/pages/page-{page}.png", self.job_id)
    }

    /// Blob key of the packaged final artifact.
    pub fn final_blob_key(&self, file_name: &str) -> String {
        format!("jobs/{}/{}", self.job_id, file_name)
    }
}

//! End-to-end pipeline scenarios with scripted capability fakes.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use vignette_core::{
    ComicRequest, Page, PageStatus, Panel, ReturnMode, VignetteConfig, VignetteConfigBuilder,
};
use vignette_error::{GenerationError, GenerationErrorKind, VignetteResult};
use vignette_interface::{
    ArtifactFormat, BlobLocator, BlobStore, ImageDriver, ImageParams, ImageSource, Packager,
    TaskHandle, TaskQueue,
};
use vignette_lookbook::{LookbookStore, SeedRequest};
use vignette_pipeline::{sweep_expired_jobs, ChainOutcome, JobDriver};
use vignette_storage::InMemoryBlobStore;

/// Image driver recording every call; can fail chosen pages and can flip a
/// job's cancellation latch while a page is in flight.
#[derive(Default)]
struct FakeImageDriver {
    calls: Mutex<Vec<(String, usize)>>,
    sizes: Mutex<Vec<String>>,
    /// page number -> remaining failures to inject
    fail_pages: Mutex<BTreeMap<u32, usize>>,
    /// write `cancelled: true` into this manifest while rendering this page
    cancel_manifest_on_page: Mutex<Option<(u32, PathBuf)>>,
}

impl FakeImageDriver {
    fn page_of(prompt: &str) -> Option<u32> {
        let rest = prompt.strip_prefix("Comic page ")?;
        rest.split_whitespace().next()?.parse().ok()
    }

    fn page_calls(&self, page: u32) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| Self::page_of(p) == Some(page))
            .count()
    }
}

#[async_trait]
impl ImageDriver for FakeImageDriver {
    async fn generate_image(
        &self,
        prompt: &str,
        references: &[ImageSource],
        params: &ImageParams,
    ) -> VignetteResult<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), references.len()));
        self.sizes.lock().unwrap().push(params.size.clone());

        if let Some(page) = Self::page_of(prompt) {
            if let Some((target, manifest)) = self.cancel_manifest_on_page.lock().unwrap().clone() {
                if page == target {
                    let raw = std::fs::read(&manifest).unwrap();
                    let mut value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
                    value["cancelled"] = serde_json::Value::Bool(true);
                    std::fs::write(&manifest, serde_json::to_vec(&value).unwrap()).unwrap();
                }
            }
            let mut failures = self.fail_pages.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&page) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(GenerationError::new(GenerationErrorKind::Provider(format!(
                        "synthetic failure on page {page}"
                    )))
                    .into());
                }
            }
        }
        Ok(format!("image:{}", prompt.len()).into_bytes())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Blob store wrapper that fails `put` for keys containing a needle.
struct FailingBlobStore {
    inner: InMemoryBlobStore,
    fail_put_containing: Mutex<Option<String>>,
}

impl FailingBlobStore {
    fn new() -> Self {
        Self {
            inner: InMemoryBlobStore::new(),
            fail_put_containing: Mutex::new(None),
        }
    }
}

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn put(&self, data: &[u8], key: &str) -> VignetteResult<BlobLocator> {
        if let Some(needle) = self.fail_put_containing.lock().unwrap().as_deref() {
            if key.contains(needle) {
                return Err(GenerationError::new(GenerationErrorKind::Provider(
                    "synthetic upload outage".to_string(),
                ))
                .into());
            }
        }
        self.inner.put(data, key).await
    }

    async fn get(&self, locator: &BlobLocator) -> VignetteResult<Vec<u8>> {
        self.inner.get(locator).await
    }

    async fn get_key(&self, key: &str) -> VignetteResult<Vec<u8>> {
        self.inner.get_key(key).await
    }

    async fn signed_url(
        &self,
        locator: &BlobLocator,
        expires_in: Duration,
    ) -> VignetteResult<Option<String>> {
        self.inner.signed_url(locator, expires_in).await
    }

    async fn delete(&self, key: &str) -> VignetteResult<()> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> VignetteResult<bool> {
        self.inner.exists(key).await
    }

    async fn list(&self, prefix: &str) -> VignetteResult<Vec<String>> {
        self.inner.list(prefix).await
    }
}

/// Queue fake that records enqueues without delivering.
#[derive(Default)]
struct RecordingQueue {
    enqueued: AtomicUsize,
    cancelled: Mutex<Vec<String>>,
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn enqueue(
        &self,
        _target: &str,
        payload: &serde_json::Value,
        _delay: Option<Duration>,
    ) -> VignetteResult<TaskHandle> {
        let n = self.enqueued.fetch_add(1, Ordering::SeqCst);
        let job = payload["job_id"].as_str().unwrap_or("?");
        Ok(TaskHandle(format!("task-{job}-{n}")))
    }

    async fn cancel(&self, handle: &TaskHandle) -> VignetteResult<bool> {
        self.cancelled.lock().unwrap().push(handle.0.clone());
        Ok(true)
    }
}

/// Packager fake that concatenates page bytes into the artifact file.
#[derive(Default)]
struct ConcatPackager;

#[async_trait]
impl Packager for ConcatPackager {
    async fn package(
        &self,
        page_files: &[PathBuf],
        _format: ArtifactFormat,
        out_path: &Path,
    ) -> VignetteResult<()> {
        let mut all = Vec::new();
        for file in page_files {
            all.extend(std::fs::read(file).unwrap());
        }
        std::fs::write(out_path, all).unwrap();
        Ok(())
    }
}

/// Packager fake whose assembly always fails.
struct BrokenPackager;

#[async_trait]
impl Packager for BrokenPackager {
    async fn package(
        &self,
        _page_files: &[PathBuf],
        _format: ArtifactFormat,
        _out_path: &Path,
    ) -> VignetteResult<()> {
        Err(GenerationError::new(GenerationErrorKind::Provider(
            "assembler offline".to_string(),
        ))
        .into())
    }
}

struct Harness {
    _dir: TempDir,
    config: VignetteConfig,
    blobs: Arc<FailingBlobStore>,
    images: Arc<FakeImageDriver>,
    queue: Arc<RecordingQueue>,
    driver: JobDriver,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = VignetteConfigBuilder::default()
            .data_dir(dir.path())
            .retry_attempts(3usize)
            .retry_base_delay_ms(1u64)
            .build()
            .unwrap();
        let blobs = Arc::new(FailingBlobStore::new());
        let images = Arc::new(FakeImageDriver::default());
        let queue = Arc::new(RecordingQueue::default());
        let driver = JobDriver::new(
            &config,
            blobs.clone(),
            images.clone(),
            queue.clone(),
            Arc::new(ConcatPackager),
        );
        Self {
            _dir: dir,
            config,
            blobs,
            images,
            queue,
            driver,
        }
    }

    fn lookbook(&self) -> LookbookStore {
        LookbookStore::new(&self.config, self.blobs.clone())
    }

    async fn seed(&self, job_id: &str, characters: &[&str]) {
        let req = SeedRequest {
            job_id: job_id.to_string(),
            character_ids: characters.iter().map(|s| s.to_string()).collect(),
            location_ids: vec!["loc_harbor".into()],
            prop_ids: vec!["prop_lantern".into()],
            ..SeedRequest::default()
        };
        self.lookbook().seed(&req).await.unwrap();
    }

    fn manifest_path(&self, job_id: &str) -> PathBuf {
        self.config
            .data_dir()
            .join("jobs")
            .join(job_id)
            .join("manifest.json")
    }
}

fn page(n: u32, characters: &[&str]) -> Page {
    Page {
        page_number: n,
        panels: vec![Panel {
            panel_number: 1,
            art_description: format!("Scene {n} at the harbor"),
            dialogue: String::new(),
            narration: String::new(),
            sfx: String::new(),
            characters: characters.iter().map(|s| s.to_string()).collect(),
            props: vec!["prop_lantern".into()],
            location_id: Some("loc_harbor".into()),
        }],
        location_id: None,
        characters: Vec::new(),
        props: Vec::new(),
    }
}

fn request(pages: Vec<Page>) -> ComicRequest {
    ComicRequest {
        comic_title: "Harbor Tides".into(),
        style: "ink wash".into(),
        pages,
        return_pdf: false,
        image_ref: None,
        return_mode: ReturnMode::default(),
    }
}

#[tokio::test]
async fn three_pages_render_done_and_finalize() {
    let h = Harness::new();
    let req = request(vec![
        page(1, &["char_mira"]),
        page(2, &["char_mira"]),
        page(3, &["char_mira"]),
    ]);
    let job_id = h.driver.create_job(&req).await.unwrap();
    assert_eq!(h.queue.enqueued.load(Ordering::SeqCst), 1);
    h.seed(&job_id, &["char_mira"]).await;

    let outcome = h.driver.deliver(&job_id).await.unwrap();
    assert_eq!(outcome, ChainOutcome::Completed);

    let manifest = h.driver.status(&job_id).await.unwrap();
    assert!(manifest.all_done());
    let final_artifact = manifest.final_artifact.unwrap();
    assert_eq!(final_artifact.mime, "application/zip");
    assert_eq!(
        final_artifact.locator.as_deref(),
        Some(format!("jobs/{job_id}/pages.zip").as_str())
    );

    // Page uploads landed under deterministic keys.
    for n in 1..=3 {
        assert!(h
            .blobs
            .exists(&format!("jobs/{job_id}/pages/page-{n}.png"))
            .await
            .unwrap());
    }

    // Chain continuity: pages 2 and 3 chain from their predecessor and carry
    // one more reference than page 1 (the previous page's output).
    let calls = h.images.calls.lock().unwrap();
    let page_calls: Vec<&(String, usize)> = calls
        .iter()
        .filter(|(p, _)| FakeImageDriver::page_of(p).is_some())
        .collect();
    assert_eq!(page_calls.len(), 3);
    assert!(!page_calls[0].0.contains("previous page"));
    assert!(page_calls[1].0.contains("previous page"));
    assert!(page_calls[2].0.contains("previous page"));
    assert_eq!(page_calls[1].1, page_calls[0].1 + 1);

    // The configured size hint reaches every generation call.
    assert!(h.images.sizes.lock().unwrap().iter().all(|s| s == "1024x1536"));
}

#[tokio::test]
async fn unresolvable_entity_blocks_the_chain() {
    let h = Harness::new();
    let req = request(vec![
        page(1, &["char_mira"]),
        page(2, &["char_mira", "char_ghost"]),
        page(3, &["char_mira"]),
    ]);
    let job_id = h.driver.create_job(&req).await.unwrap();
    h.seed(&job_id, &["char_mira"]).await;

    let outcome = h.driver.deliver(&job_id).await.unwrap();
    let ChainOutcome::Blocked { page: blocked, missing } = outcome else {
        panic!("expected blocked outcome, got {outcome:?}");
    };
    assert_eq!(blocked, 2);
    assert_eq!(missing.get("char_ghost").unwrap(), "not_found");

    let manifest = h.driver.status(&job_id).await.unwrap();
    assert_eq!(manifest.page_status(1), PageStatus::Done);
    assert_eq!(manifest.page_status(2), PageStatus::BlockedMissingRefs);
    assert_eq!(manifest.page_status(3), PageStatus::Pending);

    // Seed the missing entity and deliver again: the chain resumes from
    // page 2 without re-rendering page 1.
    h.seed(&job_id, &["char_mira", "char_ghost"]).await;
    let outcome = h.driver.deliver(&job_id).await.unwrap();
    assert_eq!(outcome, ChainOutcome::Completed);
    assert!(h.driver.status(&job_id).await.unwrap().all_done());
    assert_eq!(h.images.page_calls(1), 1);
}

#[tokio::test]
async fn retry_exhaustion_fails_the_page_and_stops() {
    let h = Harness::new();
    let req = request(vec![
        page(1, &["char_mira"]),
        page(2, &["char_mira"]),
        page(3, &["char_mira"]),
    ]);
    let job_id = h.driver.create_job(&req).await.unwrap();
    h.seed(&job_id, &["char_mira"]).await;

    // Page 2 would succeed on a 4th call, but the budget is 3.
    h.images.fail_pages.lock().unwrap().insert(2, 3);
    let outcome = h.driver.deliver(&job_id).await.unwrap();
    let ChainOutcome::Failed { page: failed, error } = outcome else {
        panic!("expected failed outcome, got {outcome:?}");
    };
    assert_eq!(failed, 2);
    assert!(error.contains("after 3 attempts"));

    let manifest = h.driver.status(&job_id).await.unwrap();
    assert_eq!(manifest.page_status(2), PageStatus::Failed);
    assert_eq!(manifest.pages.get(&2).unwrap().attempts, Some(3));
    assert_eq!(manifest.page_status(3), PageStatus::Pending);

    // Resume re-attempts the same page, not a restart from page 1.
    let outcome = h.driver.deliver(&job_id).await.unwrap();
    assert_eq!(outcome, ChainOutcome::Completed);
    assert_eq!(h.images.page_calls(1), 1);
    assert_eq!(h.images.page_calls(2), 4);
}

#[tokio::test]
async fn cancellation_is_cooperative_and_leaves_pages_pending() {
    let h = Harness::new();
    let req = request(vec![
        page(1, &["char_mira"]),
        page(2, &["char_mira"]),
        page(3, &["char_mira"]),
    ]);
    let job_id = h.driver.create_job(&req).await.unwrap();
    h.seed(&job_id, &["char_mira"]).await;

    // Flip the latch while page 2's generation call is in flight.
    *h.images.cancel_manifest_on_page.lock().unwrap() =
        Some((2, h.manifest_path(&job_id)));

    let outcome = h.driver.deliver(&job_id).await.unwrap();
    assert_eq!(outcome, ChainOutcome::Cancelled { next_page: 3 });

    let manifest = h.driver.status(&job_id).await.unwrap();
    assert!(manifest.cancelled);
    // The in-flight page finished; the next page was never started.
    assert_eq!(manifest.page_status(2), PageStatus::Done);
    assert_eq!(manifest.page_status(3), PageStatus::Pending);
    assert_eq!(h.images.page_calls(3), 0);

    // A redelivery for a cancelled job acknowledges without work.
    let calls_before = h.images.calls.lock().unwrap().len();
    let outcome = h.driver.deliver(&job_id).await.unwrap();
    assert_eq!(outcome, ChainOutcome::Cancelled { next_page: 3 });
    assert_eq!(h.images.calls.lock().unwrap().len(), calls_before);
}

#[tokio::test]
async fn cancel_sets_latch_and_dequeues_best_effort() {
    let h = Harness::new();
    let req = request(vec![page(1, &["char_mira"])]);
    let job_id = h.driver.create_job(&req).await.unwrap();

    h.driver.cancel(&job_id).await.unwrap();
    assert!(h.driver.status(&job_id).await.unwrap().cancelled);
    assert_eq!(h.queue.cancelled.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn upload_failure_keeps_rendered_and_resume_retries_upload_only() {
    let h = Harness::new();
    let req = request(vec![page(1, &["char_mira"]), page(2, &["char_mira"])]);
    let job_id = h.driver.create_job(&req).await.unwrap();
    h.seed(&job_id, &["char_mira"]).await;

    *h.blobs.fail_put_containing.lock().unwrap() = Some("pages/page-2".to_string());
    let outcome = h.driver.deliver(&job_id).await.unwrap();
    // The chain carries on past an upload failure; only the status differs.
    assert_eq!(outcome, ChainOutcome::Completed);

    let manifest = h.driver.status(&job_id).await.unwrap();
    assert_eq!(manifest.page_status(1), PageStatus::Done);
    assert_eq!(manifest.page_status(2), PageStatus::Rendered);
    let state = manifest.pages.get(&2).unwrap();
    assert_eq!(state.uploaded, Some(false));
    assert!(state.upload_error.is_some());
    assert!(manifest.final_artifact.is_none());

    // Local bytes survived for the retry.
    let local = h
        .config
        .data_dir()
        .join("jobs")
        .join(&job_id)
        .join("page-2.png");
    assert!(local.exists());

    // Storage recovers; resume re-attempts the upload without regenerating.
    *h.blobs.fail_put_containing.lock().unwrap() = None;
    let outcome = h.driver.deliver(&job_id).await.unwrap();
    assert_eq!(outcome, ChainOutcome::Completed);
    let manifest = h.driver.status(&job_id).await.unwrap();
    assert!(manifest.all_done());
    assert!(manifest.final_artifact.is_some());
    assert_eq!(h.images.page_calls(2), 1);
}

#[tokio::test]
async fn packaging_failure_records_error_and_artifact_path() {
    let h = Harness::new();
    let driver = JobDriver::new(
        &h.config,
        h.blobs.clone(),
        h.images.clone(),
        h.queue.clone(),
        Arc::new(BrokenPackager),
    );
    let req = request(vec![page(1, &["char_mira"])]);
    let job_id = driver.create_job(&req).await.unwrap();
    h.seed(&job_id, &["char_mira"]).await;

    let outcome = driver.deliver(&job_id).await.unwrap();
    assert_eq!(outcome, ChainOutcome::Completed);

    // Pages rendered; packaging did not. The artifact records the failure
    // alongside the path it tried to assemble, so callers can find the
    // workdir that still holds the pages.
    let manifest = driver.status(&job_id).await.unwrap();
    assert!(manifest.all_done());
    let final_artifact = manifest.final_artifact.unwrap();
    assert!(final_artifact.locator.is_none());
    assert!(final_artifact
        .upload_error
        .as_deref()
        .unwrap()
        .contains("Packaging failed"));
    assert!(final_artifact
        .local
        .as_deref()
        .unwrap()
        .ends_with("pages.zip"));
}

#[tokio::test]
async fn fresh_worker_restores_state_from_durable_storage() {
    let h = Harness::new();
    let req = request(vec![page(1, &["char_mira"]), page(2, &["char_mira"])]);
    let job_id = h.driver.create_job(&req).await.unwrap();
    h.seed(&job_id, &["char_mira"]).await;
    h.driver.deliver(&job_id).await.unwrap();

    // Wipe the worker's local disk; only blobs survive.
    let workdir = h.config.data_dir().join("jobs").join(&job_id);
    tokio::fs::remove_dir_all(&workdir).await.unwrap();

    let manifest = h.driver.status(&job_id).await.unwrap();
    assert!(manifest.all_done());

    // Redelivery restores state and does not regenerate or re-finalize.
    let outcome = h.driver.deliver(&job_id).await.unwrap();
    assert_eq!(outcome, ChainOutcome::Completed);
    assert_eq!(h.images.page_calls(1), 1);
    assert_eq!(h.images.page_calls(2), 1);
}

#[tokio::test]
async fn unknown_job_is_an_error() {
    let h = Harness::new();
    let err = h.driver.status("nope").await.unwrap_err();
    assert!(err.to_string().contains("Unknown job"));
}

#[tokio::test]
async fn sweep_removes_expired_job_directories() {
    let h = Harness::new();
    let req = request(vec![page(1, &["char_mira"])]);
    let job_id = h.driver.create_job(&req).await.unwrap();

    // Default TTL: nothing is old enough.
    assert!(sweep_expired_jobs(&h.config).await.unwrap().is_empty());

    // TTL of zero hours treats everything as expired.
    let eager = VignetteConfigBuilder::default()
        .data_dir(h.config.data_dir().clone())
        .sweep_ttl_hours(0u64)
        .build()
        .unwrap();
    let swept = sweep_expired_jobs(&eager).await.unwrap();
    assert_eq!(swept, vec![job_id.clone()]);
    assert!(!h.config.data_dir().join("jobs").join(&job_id).exists());
}

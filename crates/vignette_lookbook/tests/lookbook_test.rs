//! End-to-end tests for seeding, reference-asset generation, and cleanup
//! against the in-memory blob store.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use vignette_core::{VignetteConfig, VignetteConfigBuilder};
use vignette_error::{GenerationError, GenerationErrorKind, VignetteResult};
use vignette_interface::{BlobStore, ImageDriver, ImageParams, ImageSource};
use vignette_lookbook::{CleanRequest, LookbookStore, RefAssetGenerator, SeedRequest};
use vignette_storage::InMemoryBlobStore;

/// Image driver that records every call and can fail on chosen prompts.
#[derive(Default)]
struct ScriptedImageDriver {
    calls: Mutex<Vec<(String, usize, String)>>,
    fail_containing: Option<String>,
}

#[async_trait]
impl ImageDriver for ScriptedImageDriver {
    async fn generate_image(
        &self,
        prompt: &str,
        references: &[ImageSource],
        params: &ImageParams,
    ) -> VignetteResult<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), references.len(), params.model.clone()));
        if let Some(needle) = &self.fail_containing {
            if prompt.contains(needle.as_str()) {
                return Err(GenerationError::new(GenerationErrorKind::Provider(
                    "scripted failure".to_string(),
                ))
                .into());
            }
        }
        Ok(format!("png:{}", prompt.len()).into_bytes())
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

fn config(dir: &TempDir) -> VignetteConfig {
    VignetteConfigBuilder::default()
        .data_dir(dir.path())
        .build()
        .unwrap()
}

fn seed_request() -> SeedRequest {
    SeedRequest {
        job_id: "j1".into(),
        character_ids: vec!["char_mira".into()],
        location_ids: vec!["loc_harbor".into()],
        prop_ids: vec!["prop_lantern".into()],
        name_hints: BTreeMap::from([("char_mira".to_string(), "Mira".to_string())]),
        user_theme: Some("gaslamp noir".into()),
        ..SeedRequest::default()
    }
}

#[tokio::test]
async fn seed_persists_and_mirrors() {
    let dir = TempDir::new().unwrap();
    let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
    let store = LookbookStore::new(&config(&dir), blobs.clone());

    let outcome = store.seed(&seed_request()).await.unwrap();
    assert_eq!(outcome.created.len(), 3);

    // Local file and blob mirror both hold the document.
    let doc = store.load_required("j1").await.unwrap();
    assert_eq!(doc.entities().count(), 3);
    assert!(blobs.exists("jobs/j1/lookbook.json").await.unwrap());

    // Re-delivery merges instead of duplicating.
    let again = store.seed(&seed_request()).await.unwrap();
    assert!(again.created.is_empty());
    assert_eq!(again.merged.len(), 3);
}

#[tokio::test]
async fn load_required_demands_a_seeded_registry() {
    let dir = TempDir::new().unwrap();
    let store = LookbookStore::new(&config(&dir), Arc::new(InMemoryBlobStore::new()));
    let err = store.load_required("ghost").await.unwrap_err();
    assert!(err.to_string().contains("seed it first"));
}

#[tokio::test]
async fn corrupt_local_document_falls_back_to_mirror() {
    let dir = TempDir::new().unwrap();
    let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
    let store = LookbookStore::new(&config(&dir), blobs.clone());
    store.seed(&seed_request()).await.unwrap();

    // Corrupt the local file; the blob mirror still has the real document.
    let local = store.paths("j1").lookbook_file();
    tokio::fs::write(&local, b"{ not json").await.unwrap();

    let doc = store.load_required("j1").await.unwrap();
    assert_eq!(doc.entities().count(), 3);
}

#[tokio::test]
async fn ensure_assets_fills_defaults_in_order() {
    let dir = TempDir::new().unwrap();
    let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
    let store = LookbookStore::new(&config(&dir), blobs.clone());
    store.seed(&seed_request()).await.unwrap();

    let driver = Arc::new(ScriptedImageDriver::default());
    let generator = RefAssetGenerator::new(
        &config(&dir),
        LookbookStore::new(&config(&dir), blobs.clone()),
        driver.clone(),
    );

    let ids = vec!["char_mira".to_string(), "loc_harbor".to_string()];
    let outcome = generator.ensure_assets("j1", &ids, false).await.unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.reports[0].generated, vec!["portrait", "turnaround"]);
    assert_eq!(outcome.reports[1].generated, vec!["wide"]);

    // The turnaround call binds exactly one reference: the fresh portrait.
    let calls = driver.calls.lock().unwrap();
    let turnaround = calls
        .iter()
        .find(|(p, _, _)| p.contains("turnaround sheet"))
        .unwrap();
    assert_eq!(turnaround.1, 1);

    // The configured model hint reaches every generation call.
    assert!(calls.iter().all(|(_, _, m)| m == "image-alpha"));

    // Assets land under stable keys and appear in the document.
    assert!(blobs
        .exists("jobs/j1/lookbook/char_mira/portrait.png")
        .await
        .unwrap());
    let doc = store.load_required("j1").await.unwrap();
    assert!(doc.entity("char_mira").unwrap().asset("turnaround").is_some());

    // Theme flows into prompts.
    assert!(calls.iter().all(|(p, _, _)| p.contains("gaslamp noir")));
}

#[tokio::test]
async fn ensure_assets_is_idempotent_and_force_replaces() {
    let dir = TempDir::new().unwrap();
    let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
    let store = LookbookStore::new(&config(&dir), blobs.clone());
    store.seed(&seed_request()).await.unwrap();

    let driver = Arc::new(ScriptedImageDriver::default());
    let generator = RefAssetGenerator::new(
        &config(&dir),
        LookbookStore::new(&config(&dir), blobs.clone()),
        driver.clone(),
    );
    let ids = vec!["prop_lantern".to_string()];

    generator.ensure_assets("j1", &ids, false).await.unwrap();
    let second = generator.ensure_assets("j1", &ids, false).await.unwrap();
    assert!(second.reports[0].generated.is_empty());
    assert_eq!(second.reports[0].skipped, vec!["detail"]);

    let forced = generator.ensure_assets("j1", &ids, true).await.unwrap();
    assert_eq!(forced.reports[0].generated, vec!["detail"]);

    // Replace, not accumulate: still one detail asset under one key.
    let doc = store.load_required("j1").await.unwrap();
    let lantern = doc.entity("prop_lantern").unwrap();
    assert_eq!(lantern.reference_assets.len(), 1);
    assert_eq!(
        blobs.list("jobs/j1/lookbook/prop_lantern").await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn ensure_assets_reports_unknown_and_assetless_ids() {
    let dir = TempDir::new().unwrap();
    let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
    LookbookStore::new(&config(&dir), blobs.clone())
        .seed(&seed_request())
        .await
        .unwrap();

    // Portrait generation fails, so char_mira ends the call assetless.
    let driver = Arc::new(ScriptedImageDriver {
        fail_containing: Some("portrait".to_string()),
        ..ScriptedImageDriver::default()
    });
    let generator = RefAssetGenerator::new(
        &config(&dir),
        LookbookStore::new(&config(&dir), blobs),
        driver,
    );

    let ids = vec!["char_mira".to_string(), "char_ghost".to_string()];
    let outcome = generator.ensure_assets("j1", &ids, false).await.unwrap();
    assert_eq!(outcome.missing.get("char_ghost").unwrap(), "not_found");
    assert_eq!(
        outcome.missing.get("char_mira").unwrap(),
        "no_reference_assets"
    );
    assert!(outcome.reports[0].error.is_some());
}

#[tokio::test]
async fn cleanup_wildcard_spares_cover_unless_included() {
    let dir = TempDir::new().unwrap();
    let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
    let store = LookbookStore::new(&config(&dir), blobs.clone());
    let mut seed = seed_request();
    seed.cover_locator = Some("covers/c1.png".into());
    store.seed(&seed).await.unwrap();

    let generator = RefAssetGenerator::new(
        &config(&dir),
        LookbookStore::new(&config(&dir), blobs.clone()),
        Arc::new(ScriptedImageDriver::default()),
    );
    generator
        .ensure_assets("j1", &["char_mira".to_string()], false)
        .await
        .unwrap();

    let req = CleanRequest {
        job_id: "j1".into(),
        targets: BTreeMap::from([("char_mira".to_string(), vec!["*".to_string()])]),
        ..CleanRequest::default()
    };
    let outcome = store.clean_assets(&req).await.unwrap();
    assert_eq!(outcome.reports[0].removed, vec!["portrait", "turnaround"]);
    assert!(outcome.reports[0].skipped.contains(&"cover".to_string()));

    let doc = store.load_required("j1").await.unwrap();
    let mira = doc.entity("char_mira").unwrap();
    assert!(mira.asset("cover").is_some());
    assert!(mira.asset("portrait").is_none());
    assert!(!blobs
        .exists("jobs/j1/lookbook/char_mira/portrait.png")
        .await
        .unwrap());

    // Including the cover removes it too, and prune_empty drops the entity.
    let req = CleanRequest {
        job_id: "j1".into(),
        targets: BTreeMap::from([("char_mira".to_string(), vec!["*".to_string()])]),
        include_cover: true,
        prune_empty: true,
        ..CleanRequest::default()
    };
    let outcome = store.clean_assets(&req).await.unwrap();
    assert_eq!(outcome.pruned, vec!["char_mira".to_string()]);
}

#[tokio::test]
async fn cleanup_dry_run_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
    let store = LookbookStore::new(&config(&dir), blobs.clone());
    store.seed(&seed_request()).await.unwrap();

    let generator = RefAssetGenerator::new(
        &config(&dir),
        LookbookStore::new(&config(&dir), blobs.clone()),
        Arc::new(ScriptedImageDriver::default()),
    );
    generator
        .ensure_assets("j1", &["loc_harbor".to_string()], false)
        .await
        .unwrap();

    let req = CleanRequest {
        job_id: "j1".into(),
        targets: BTreeMap::from([("loc_harbor".to_string(), vec!["wide".to_string()])]),
        dry_run: true,
        ..CleanRequest::default()
    };
    let outcome = store.clean_assets(&req).await.unwrap();
    assert_eq!(outcome.reports[0].removed, vec!["wide"]);
    assert!(blobs
        .exists("jobs/j1/lookbook/loc_harbor/wide.png")
        .await
        .unwrap());
    let doc = store.load_required("j1").await.unwrap();
    assert!(doc.entity("loc_harbor").unwrap().asset("wide").is_some());
}

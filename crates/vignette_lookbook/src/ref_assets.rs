//! Reference-asset generation.
//!
//! For every registered entity the generator fills in the kind's default
//! asset set (character portrait and turnaround, location wide shot, prop
//! detail study). Assets are stored under stable keys, so regeneration
//! replaces rather than accumulates. Failures are contained per entity: one
//! bad generation never aborts the rest of the batch.

use crate::{prompt, LookbookStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use vignette_core::{LookbookDoc, ReferenceAsset, VignetteConfig};
use vignette_error::VignetteResult;
use vignette_interface::{BlobStore, ImageDriver, ImageParams, ImageSource};

/// Per-entity report of what one `ensure_assets` call did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetReport {
    /// Entity id
    pub id: String,
    /// Asset types generated this call, in generation order
    pub generated: Vec<String>,
    /// Default types already present and left alone
    pub skipped: Vec<String>,
    /// Generation failure message, when the entity's batch was cut short
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of an `ensure_assets` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnsureOutcome {
    /// Per-entity reports, in request order
    pub reports: Vec<AssetReport>,
    /// Ids that remain unusable, with a reason: "not_found" for ids absent
    /// from the registry, "no_reference_assets" for entities that still have
    /// no asset after this call
    pub missing: BTreeMap<String, String>,
}

impl EnsureOutcome {
    /// Whether every requested id ended up with at least one asset.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Generates and stores reference assets for lookbook entities.
pub struct RefAssetGenerator {
    store: LookbookStore,
    images: Arc<dyn ImageDriver>,
    params: ImageParams,
    signed_url_ttl: Duration,
}

impl RefAssetGenerator {
    /// Build a generator over a lookbook store and an image driver.
    pub fn new(
        config: &VignetteConfig,
        store: LookbookStore,
        images: Arc<dyn ImageDriver>,
    ) -> Self {
        Self {
            store,
            images,
            params: ImageParams::new(config.image_model(), config.image_size()),
            signed_url_ttl: Duration::from_secs(*config.signed_url_ttl_secs()),
        }
    }

    /// The underlying lookbook store.
    pub fn store(&self) -> &LookbookStore {
        &self.store
    }

    /// Ensure the requested entities have their default reference assets,
    /// generating whatever is missing (everything, when `force` is set).
    ///
    /// Characters generate portrait before turnaround, and the turnaround is
    /// composed against the portrait. Keys are deterministic
    /// (`jobs/{job_id}/lookbook/{id}/{type}.png`), so a forced regeneration
    /// overwrites the previous asset in place.
    ///
    /// # Errors
    ///
    /// Fails when the registry has not been seeded or the updated document
    /// cannot be persisted. Per-entity generation failures are reported in
    /// the outcome instead.
    #[tracing::instrument(skip(self, ids), fields(requested = ids.len(), force))]
    pub async fn ensure_assets(
        &self,
        job_id: &str,
        ids: &[String],
        force: bool,
    ) -> VignetteResult<EnsureOutcome> {
        let mut doc = self.store.load_required(job_id).await?;
        let theme = doc.user_theme().map(str::to_string);
        let mut outcome = EnsureOutcome::default();

        let mut seen = std::collections::BTreeSet::new();
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            if !doc.contains(id) {
                tracing::warn!(job_id, id, "Requested entity not in lookbook");
                outcome.missing.insert(id.clone(), "not_found".to_string());
                continue;
            }
            let report = self
                .ensure_entity(job_id, &mut doc, id, force, theme.as_deref())
                .await;
            outcome.reports.push(report);
        }

        // Verify pass: anything still assetless cannot anchor a page render.
        for id in ids {
            if let Some(entity) = doc.entity(id) {
                if !entity.has_any_assets() {
                    outcome
                        .missing
                        .insert(id.clone(), "no_reference_assets".to_string());
                }
            }
        }

        self.store.save(job_id, &doc).await?;
        tracing::info!(
            job_id,
            generated = outcome.reports.iter().map(|r| r.generated.len()).sum::<usize>(),
            missing = outcome.missing.len(),
            "Ensured reference assets"
        );
        Ok(outcome)
    }

    async fn ensure_entity(
        &self,
        job_id: &str,
        doc: &mut LookbookDoc,
        id: &str,
        force: bool,
        theme: Option<&str>,
    ) -> AssetReport {
        let mut report = AssetReport {
            id: id.to_string(),
            ..AssetReport::default()
        };
        let Some(entity) = doc.entity(id) else {
            return report;
        };
        let defaults = entity.kind.default_asset_types();
        let wanted: Vec<&str> = if force {
            defaults.to_vec()
        } else {
            entity.missing_default_types()
        };
        report.skipped = defaults
            .iter()
            .filter(|t| !wanted.contains(t))
            .map(|t| t.to_string())
            .collect();

        // Portrait bytes from this run, for composing the turnaround.
        let mut fresh_portrait: Option<Vec<u8>> = None;

        for asset_type in wanted {
            let Some(entity) = doc.entity(id) else { break };
            let Some(prompt_text) = prompt::asset_prompt(asset_type, entity, theme) else {
                continue;
            };
            let references = self
                .references_for(entity, asset_type, fresh_portrait.as_deref())
                .await;

            match self
                .images
                .generate_image(&prompt_text, &references, &self.params)
                .await
            {
                Ok(bytes) => {
                    match self.record_asset(job_id, doc, id, asset_type, &bytes).await {
                        Ok(()) => {
                            if asset_type == "portrait" {
                                fresh_portrait = Some(bytes);
                            }
                            report.generated.push(asset_type.to_string());
                        }
                        Err(e) => {
                            tracing::warn!(job_id, id, asset_type, error = %e, "Asset store failed");
                            report.error = Some(e.to_string());
                            break;
                        }
                    }
                }
                Err(e) => {
                    // Remaining types for this entity are cut short; a
                    // turnaround without its portrait drifts off-model.
                    tracing::warn!(job_id, id, asset_type, error = %e, "Asset generation failed");
                    report.error = Some(e.to_string());
                    break;
                }
            }
        }
        report
    }

    /// Pick reference images for one asset generation. The turnaround binds
    /// to the best portrait available; everything else binds to the cover
    /// when one exists.
    async fn references_for(
        &self,
        entity: &vignette_core::Entity,
        asset_type: &str,
        fresh_portrait: Option<&[u8]>,
    ) -> Vec<ImageSource> {
        if asset_type == "turnaround" {
            if let Some(bytes) = fresh_portrait {
                return vec![ImageSource::Bytes(bytes.to_vec())];
            }
            if let Some(bytes) = self.asset_bytes(entity.asset("portrait")).await {
                return vec![ImageSource::Bytes(bytes)];
            }
        }
        match self.asset_bytes(entity.asset("cover")).await {
            Some(bytes) => vec![ImageSource::Bytes(bytes)],
            None => Vec::new(),
        }
    }

    /// Fetch an asset's bytes by its stable locator key, best-effort.
    async fn asset_bytes(&self, asset: Option<&ReferenceAsset>) -> Option<Vec<u8>> {
        let key = asset?.locator.as_deref()?;
        match self.store.blobs().get_key(key).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(key, error = %e, "Reference asset unreadable, generating without it");
                None
            }
        }
    }

    /// Store one generated asset durably and bind it into the document.
    async fn record_asset(
        &self,
        job_id: &str,
        doc: &mut LookbookDoc,
        id: &str,
        asset_type: &str,
        bytes: &[u8],
    ) -> VignetteResult<()> {
        let paths = self.store.paths(job_id);
        let key = paths.asset_blob_key(id, asset_type);
        let locator = self.store.blobs().put(bytes, &key).await?;
        let url = self
            .store
            .blobs()
            .signed_url(&locator, self.signed_url_ttl)
            .await
            .unwrap_or_default();

        // Local cache copy next to the job; losing it is harmless.
        let local = paths.asset_file(id, asset_type);
        if let Some(parent) = local.parent() {
            if tokio::fs::create_dir_all(parent).await.is_ok() {
                if let Err(e) = tokio::fs::write(&local, bytes).await {
                    tracing::debug!(path = %local.display(), error = %e, "Local asset cache write failed");
                }
            }
        }

        if let Some(entity) = doc.entity_mut(id) {
            entity.replace_asset(ReferenceAsset::new(asset_type, url, Some(key)));
        }
        Ok(())
    }
}

//! Reference-image resolution for page composition.
//!
//! Turns a page's entity ids into an ordered, capped, de-duplicated set of
//! reference images, each labeled with the entity and asset type it binds
//! to. Resolved bytes are cached under the job's `_ref_cache/` directory so
//! repeated pages don't re-fetch the same assets.

use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;
use vignette_core::{Entity, JobPaths, LookbookDoc, VignetteConfig};
use vignette_interface::{BlobStore, ImageSource};

/// One reference image with the binding line that goes into the prompt.
#[derive(Debug, Clone)]
pub struct BoundReference {
    /// Human-readable binding, e.g. `Mira (char_mira) portrait`
    pub label: String,
    /// Image bytes or a local path to them
    pub source: ImageSource,
}

/// The ordered reference set for one page.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    /// References in binding order; index 0 is the chain reference when
    /// present
    pub references: Vec<BoundReference>,
}

impl ReferenceSet {
    /// Image sources in binding order, for the generation call.
    pub fn sources(&self) -> Vec<ImageSource> {
        self.references.iter().map(|r| r.source.clone()).collect()
    }

    /// The numbered binding block for the prompt, 1-based to match how image
    /// models count attached references.
    pub fn binding_block(&self) -> String {
        self.references
            .iter()
            .enumerate()
            .map(|(i, r)| format!("Reference image {}: {}", i + 1, r.label))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of references.
    pub fn len(&self) -> usize {
        self.references.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

/// Resolves entity reference assets into local image sources.
pub struct ReferenceResolver {
    blobs: Arc<dyn BlobStore>,
    max_per_entity: usize,
    total_cap: usize,
}

impl ReferenceResolver {
    /// Resolver with caps from the process configuration.
    pub fn new(config: &VignetteConfig, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            max_per_entity: *config.ref_max_per_entity(),
            total_cap: *config.ref_total_cap(),
        }
    }

    /// Resolve references for `ids` against the registry, in id order, with
    /// `chain` (the previous page or root image) bound first when present.
    ///
    /// Unreadable assets are skipped with a warning; the caller has already
    /// established that the entities themselves exist.
    #[tracing::instrument(skip_all, fields(ids = ids.len()))]
    pub async fn resolve(
        &self,
        paths: &JobPaths,
        doc: &LookbookDoc,
        ids: &BTreeSet<String>,
        chain: Option<BoundReference>,
    ) -> ReferenceSet {
        let mut set = ReferenceSet::default();
        let mut seen_keys = BTreeSet::new();
        if let Some(chain) = chain {
            set.references.push(chain);
        }

        for id in ids {
            let Some(entity) = doc.entity(id) else { continue };
            let mut taken = 0usize;
            for asset in ordered_assets(entity) {
                if taken >= self.max_per_entity || set.len() >= self.total_cap {
                    break;
                }
                let Some(key) = asset.locator.as_deref().filter(|k| !k.is_empty()) else {
                    continue;
                };
                if !seen_keys.insert(key.to_string()) {
                    continue;
                }
                match self.resolve_to_local(paths, key).await {
                    Some(source) => {
                        set.references.push(BoundReference {
                            label: format!(
                                "{} ({}) {}",
                                entity.display_name, entity.id, asset.asset_type
                            ),
                            source,
                        });
                        taken += 1;
                    }
                    None => {
                        tracing::warn!(id, key, "Reference asset unreadable, skipping");
                    }
                }
            }
        }
        set
    }

    /// Fetch one asset into the job's reference cache, reusing a cached copy
    /// when present.
    async fn resolve_to_local(&self, paths: &JobPaths, key: &str) -> Option<ImageSource> {
        let cache_dir = paths.ref_cache_dir();
        let cache_path = cache_dir.join(format!("{}.png", cache_name(key)));
        if tokio::fs::try_exists(&cache_path).await.unwrap_or(false) {
            return Some(ImageSource::Path(cache_path));
        }
        let bytes = self.blobs.get_key(key).await.ok()?;
        if bytes.is_empty() {
            tracing::warn!(key, "Reference asset is empty, skipping");
            return None;
        }
        if tokio::fs::create_dir_all(&cache_dir).await.is_ok()
            && tokio::fs::write(&cache_path, &bytes).await.is_ok()
        {
            return Some(ImageSource::Path(cache_path));
        }
        Some(ImageSource::Bytes(bytes))
    }
}

/// Content-addressed cache file name for an asset key.
fn cache_name(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    // First 16 bytes are plenty for collision resistance at this scale.
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

/// An entity's assets in binding-priority order: the kind's default types
/// first, then everything else except the cover (covers anchor asset
/// generation, not page composition).
fn ordered_assets(entity: &Entity) -> Vec<&vignette_core::ReferenceAsset> {
    let defaults = entity.kind.default_asset_types();
    let mut ordered: Vec<_> = defaults.iter().filter_map(|t| entity.asset(t)).collect();
    for asset in &entity.reference_assets {
        if asset.asset_type != "cover" && !defaults.contains(&asset.asset_type.as_str()) {
            ordered.push(asset);
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use vignette_core::ReferenceAsset;

    #[test]
    fn cache_names_are_stable_and_distinct() {
        let a = cache_name("jobs/j/lookbook/char_a/portrait.png");
        assert_eq!(a, cache_name("jobs/j/lookbook/char_a/portrait.png"));
        assert_ne!(a, cache_name("jobs/j/lookbook/char_a/turnaround.png"));
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn default_types_bind_before_extras_and_cover_is_excluded() {
        let mut entity = Entity::new("char_a", "A", "seed").unwrap();
        entity.replace_asset(ReferenceAsset::new("cover", None, Some("c".into())));
        entity.replace_asset(ReferenceAsset::new("sketch", None, Some("s".into())));
        entity.replace_asset(ReferenceAsset::new("turnaround", None, Some("t".into())));
        entity.replace_asset(ReferenceAsset::new("portrait", None, Some("p".into())));

        let types: Vec<&str> = ordered_assets(&entity)
            .iter()
            .map(|a| a.asset_type.as_str())
            .collect();
        assert_eq!(types, vec!["portrait", "turnaround", "sketch"]);
    }
}

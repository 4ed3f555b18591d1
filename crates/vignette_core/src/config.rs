//! Process-wide configuration.
//!
//! Constructed once at startup and passed by reference into component
//! constructors; there is no ambient global config.

use derive_getters::Getters;
use std::path::PathBuf;
use vignette_error::{ConfigError, VignetteResult};

/// Recurrence thresholds for promoting script-introduced entities into the
/// registry. One-off mentions below threshold stay anonymous; every
/// registered entity costs a reference-asset generation round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters)]
pub struct UsageThresholds {
    /// Distinct panels a new character must appear in
    character_panels: usize,
    /// Distinct panels a new prop must appear in
    prop_panels: usize,
    /// Page-level uses that qualify a new location outright
    location_pages: usize,
    /// Panel-level references that qualify a new location...
    location_panels: usize,
    /// ...provided they span at least this many distinct pages
    location_page_spread: usize,
}

impl Default for UsageThresholds {
    fn default() -> Self {
        Self {
            character_panels: 2,
            prop_panels: 2,
            location_pages: 1,
            location_panels: 2,
            location_page_spread: 2,
        }
    }
}

/// Workspace configuration, loaded from the environment at process start.
#[derive(Debug, Clone, PartialEq, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct VignetteConfig {
    /// Root directory for all job artifacts
    #[builder(default = "PathBuf::from(\"./data\")")]
    data_dir: PathBuf,
    /// Image model identifier handed to the image driver
    #[builder(default = "\"image-alpha\".to_string()")]
    image_model: String,
    /// Output size hint handed to the image driver
    #[builder(default = "\"1024x1536\".to_string()")]
    image_size: String,
    /// Bounded generation/upload retry attempts per page
    #[builder(default = "3")]
    retry_attempts: usize,
    /// Base delay for exponential backoff, in milliseconds
    #[builder(default = "2000")]
    retry_base_delay_ms: u64,
    /// Signed URL lifetime, in seconds
    #[builder(default = "3600")]
    signed_url_ttl_secs: u64,
    /// Delete intermediate page files after the final artifact uploads
    #[builder(default)]
    prune_pages_after_final: bool,
    /// Delete the packaged artifact after upload
    #[builder(default)]
    prune_artifact_after_upload: bool,
    /// Age at which finalized job directories are swept, in hours
    #[builder(default = "24")]
    sweep_ttl_hours: u64,
    /// Reference images attached per entity when composing a page
    #[builder(default = "2")]
    ref_max_per_entity: usize,
    /// Total reference image cap per page
    #[builder(default = "10")]
    ref_total_cap: usize,
    /// Continue with referenceless generation instead of blocking the chain.
    /// Off by default; blocking preserves continuity.
    #[builder(default)]
    allow_missing_refs: bool,
    /// Delta promotion thresholds
    #[builder(default)]
    thresholds: UsageThresholds,
}

impl Default for VignetteConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            image_model: "image-alpha".to_string(),
            image_size: "1024x1536".to_string(),
            retry_attempts: 3,
            retry_base_delay_ms: 2000,
            signed_url_ttl_secs: 3600,
            prune_pages_after_final: false,
            prune_artifact_after_upload: false,
            sweep_ttl_hours: 24,
            ref_max_per_entity: 2,
            ref_total_cap: 10,
            allow_missing_refs: false,
            thresholds: UsageThresholds::default(),
        }
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> VignetteResult<T> {
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::new(format!("{name} is not a valid value: {v}")).into()),
        Err(_) => Ok(default),
    }
}

impl VignetteConfig {
    /// Load configuration from the environment, with `.env` support.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when a set variable fails to parse.
    pub fn from_env() -> VignetteResult<Self> {
        // Missing .env is fine; explicit env vars still apply.
        let _ = dotenvy::dotenv();
        let defaults = Self::default();
        Ok(Self {
            data_dir: std::env::var("VIGNETTE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            image_model: std::env::var("VIGNETTE_IMAGE_MODEL").unwrap_or(defaults.image_model),
            image_size: std::env::var("VIGNETTE_IMAGE_SIZE").unwrap_or(defaults.image_size),
            retry_attempts: env_parse("VIGNETTE_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_base_delay_ms: env_parse(
                "VIGNETTE_RETRY_BASE_DELAY_MS",
                defaults.retry_base_delay_ms,
            )?,
            signed_url_ttl_secs: env_parse(
                "VIGNETTE_SIGNED_URL_TTL",
                defaults.signed_url_ttl_secs,
            )?,
            prune_pages_after_final: env_bool(
                "VIGNETTE_PRUNE_PAGES_AFTER_FINAL",
                defaults.prune_pages_after_final,
            ),
            prune_artifact_after_upload: env_bool(
                "VIGNETTE_PRUNE_ARTIFACT_AFTER_UPLOAD",
                defaults.prune_artifact_after_upload,
            ),
            sweep_ttl_hours: env_parse("VIGNETTE_SWEEP_TTL_HOURS", defaults.sweep_ttl_hours)?,
            ref_max_per_entity: env_parse(
                "VIGNETTE_REF_MAX_PER_ENTITY",
                defaults.ref_max_per_entity,
            )?,
            ref_total_cap: env_parse("VIGNETTE_REF_TOTAL_CAP", defaults.ref_total_cap)?,
            allow_missing_refs: env_bool("VIGNETTE_ALLOW_MISSING_REFS", false),
            thresholds: UsageThresholds::default(),
        })
    }
}

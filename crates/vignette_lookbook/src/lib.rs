//! Entity registry ("lookbook") services for the Vignette pipeline.
//!
//! A job's lookbook is its single source of visual truth: characters,
//! locations, and props with canonical descriptions and reference images.
//! This crate covers the registry's lifecycle — idempotent seeding, script
//! delta reconciliation, reference-asset generation, and targeted cleanup —
//! on top of the persistence layer in [`LookbookStore`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cleanup;
pub mod prompt;
mod reconcile;
mod ref_assets;
mod seed;
mod store;

pub use cleanup::{CleanOutcome, CleanReport, CleanRequest, ALL_ASSET_TYPES};
pub use reconcile::{merge_delta, repair_pages, unknown_ids, UsageAudit};
pub use ref_assets::{AssetReport, EnsureOutcome, RefAssetGenerator};
pub use seed::{seed_into, SeedOutcome, SeedRequest};
pub use store::LookbookStore;

//! Core data types for the Vignette comic pipeline.
//!
//! This crate provides the domain model shared across the workspace: entities
//! and their reference assets, the per-job lookbook document, script pages and
//! deltas, the job manifest state machine, the public comic request, and the
//! process-wide configuration struct.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod entity;
mod lookbook;
mod manifest;
mod paths;
mod request;
mod script;

pub use config::{UsageThresholds, VignetteConfig, VignetteConfigBuilder};
pub use entity::{display_name_from_id, Entity, EntityKind, ReferenceAsset, VisualCanon};
pub use lookbook::{LookbookDoc, LOOKBOOK_VERSION};
pub use manifest::{FinalArtifact, JobManifest, PageState, PageStatus};
pub use paths::JobPaths;
pub use request::{ComicRequest, ReturnMode};
pub use script::{EntityStub, Page, Panel, ScriptDelta};

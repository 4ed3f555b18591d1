//! Capability traits consumed by the Vignette pipeline.
//!
//! The pipeline treats its collaborators as opaque capabilities: image and
//! structured-text generation, durable blob storage, at-least-once task
//! delivery, and final-artifact packaging. Concrete provider clients live
//! outside this workspace; tests supply scripted fakes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod blob;
mod driver;
mod packager;
mod queue;

pub use blob::{BlobLocator, BlobStore};
pub use driver::{ImageDriver, ImageParams, ImageSource, ScriptDriver};
pub use packager::{ArtifactFormat, Packager};
pub use queue::{TaskHandle, TaskQueue};

//! The Vignette render pipeline: chained page rendering and the resumable
//! job driver.
//!
//! A job renders its pages strictly in order, each page composed against the
//! previous page's output plus the lookbook's reference assets. The job
//! manifest records every page's lifecycle and makes delivery idempotent
//! under the task queue's at-least-once semantics.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod manifest_store;
pub mod prompt;
mod refs;
mod renderer;
mod retry;
mod sweep;

pub use driver::JobDriver;
pub use manifest_store::ManifestStore;
pub use refs::{BoundReference, ReferenceResolver, ReferenceSet};
pub use renderer::{ChainOutcome, PageRenderer};
pub use retry::RetryPolicy;
pub use sweep::sweep_expired_jobs;

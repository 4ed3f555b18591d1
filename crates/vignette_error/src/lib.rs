//! Error types for the Vignette comic pipeline.
//!
//! This crate provides the foundation error types used throughout the Vignette
//! workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use vignette_error::{VignetteResult, StorageError, StorageErrorKind};
//!
//! fn read_page() -> VignetteResult<Vec<u8>> {
//!     Err(StorageError::new(StorageErrorKind::NotFound("page-1.png".into())))?
//! }
//!
//! assert!(read_page().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod generation;
mod lookbook;
mod queue;
mod render;
mod request;
mod storage;

pub use config::ConfigError;
pub use error::{VignetteError, VignetteErrorKind, VignetteResult};
pub use generation::{GenerationError, GenerationErrorKind};
pub use lookbook::{LookbookError, LookbookErrorKind};
pub use queue::{QueueError, QueueErrorKind};
pub use render::{RenderError, RenderErrorKind};
pub use request::{RequestError, RequestErrorKind};
pub use storage::{StorageError, StorageErrorKind};

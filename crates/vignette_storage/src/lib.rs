//! Blob storage backends for the Vignette pipeline.
//!
//! Two implementations of the `BlobStore` capability: a filesystem backend
//! used in production-like deployments and local development, and an
//! in-memory backend for tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod filesystem;
mod memory;

pub use filesystem::FileSystemBlobStore;
pub use memory::InMemoryBlobStore;

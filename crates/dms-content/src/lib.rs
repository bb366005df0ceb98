//! Content storage for the versioned document store.
//!
//! Content bytes live either inline in the catalog row or in a file under a
//! registered store. Several records, typically siblings across versions,
//! may point at the same file. This crate guarantees that a write through
//! one of them never becomes visible through another.
//!
//! # Key Types
//!
//! - [`StorageBackend`]: reads and writes bytes for a [`StorageLocation`](dms_catalog::StorageLocation)
//! - [`ContentCloner`]: builds the sibling record for a new version
//! - [`ContentService`]: uploads, reads, copy-on-write writes, deletes,
//!   storage migration, and renditions
//! - [`ContentTransformer`] / [`TransformerRegistry`]: derive renditions
//!   from existing content
//!
//! # Design Rules
//!
//! 1. A file referenced by more than one record is never written. A write
//!    through a shared record forks it onto a fresh path first.
//! 2. The sharing check and the write happen under the `(store, path)` lock.
//! 3. A file is removed only when no record references it any more.

pub mod backend;
pub mod cloner;
pub mod error;
pub mod rendition;
pub mod service;
pub mod transform;

pub use backend::{StorageBackend, StorageTarget};
pub use cloner::ContentCloner;
pub use error::{ContentError, ContentResult};
pub use rendition::{rendition_name, RenditionRequest, RenditionView};
pub use service::{ContentService, Upload};
pub use transform::{ContentTransformer, TransformError, TransformerRegistry};

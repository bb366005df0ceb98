//! Metadata catalog for the versioned document store.
//!
//! The catalog records which versioned objects exist, how they chain into
//! version trees, and which content records each object owns. It never
//! touches content bytes held in files; that is `dms-store`'s job.
//!
//! # Key Types
//!
//! - [`VersionedObject`] / [`ObjectKind`]: one version of a document,
//!   folder, or user, with per-kind attributes
//! - [`ContentRecord`] / [`StorageLocation`]: one blob plus metadata,
//!   stored inline or in a file store
//! - [`Catalog`]: persistence trait for objects and content records
//! - [`InMemoryCatalog`]: `RwLock`-backed implementation

pub mod content;
pub mod error;
pub mod memory;
pub mod object;
pub mod traits;

pub use content::{ContentRecord, StorageLocation, StoredColumns};
pub use error::{CatalogError, CatalogResult};
pub use memory::InMemoryCatalog;
pub use object::{
    DocumentAttrs, DocumentDetails, FolderAttrs, ObjectKind, UserAttrs, VersionedObject,
};
pub use traits::Catalog;

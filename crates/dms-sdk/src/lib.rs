//! High-level SDK for the versioned document store.
//!
//! [`Vault`] wires the catalog, the store registry, content storage, and
//! version management together behind one API. It is the entry point for
//! applications embedding the store.

pub mod config;
pub mod error;
pub mod vault;

pub use config::{StoreConfig, VaultConfig};
pub use error::{VaultError, VaultResult};
pub use vault::Vault;

// Re-export key types
pub use dms_catalog::{
    ContentRecord, DocumentAttrs, DocumentDetails, FolderAttrs, ObjectKind, StorageLocation,
    UserAttrs, VersionedObject,
};
pub use dms_content::{
    ContentTransformer, RenditionRequest, RenditionView, StorageTarget, TransformError,
    TransformerRegistry, Upload,
};
pub use dms_store::{Store, StoreStatus};
pub use dms_types::{BranchKind, ContentId, ErrorKind, ObjectId, StoreId, Version};

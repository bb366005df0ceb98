//! File-backed blob storage for the document store.
//!
//! A [`Store`] is a named filesystem root. Content records that are not held
//! inline point at `(store id, relative path)`; this crate owns everything
//! that happens below that pointer.
//!
//! # Components
//!
//! - [`Store`] / [`StoreStatus`] -- the storage root model
//! - [`StoreRegistry`] -- registry trait, with [`InMemoryStoreRegistry`]
//! - [`FileBlobs`] -- byte-level read/write/delete under one store root
//! - [`allocate_path`] -- fresh hierarchical relative paths
//! - [`PathLocks`] -- mutual exclusion keyed by `(store, path)`
//! - [`StoreGate`] -- keeps new references out of a store being removed
//!
//! # Design Rules
//!
//! 1. Paths handed to this crate are always relative to a store root and
//!    never escape it.
//! 2. Writes go through a temporary file and a rename; a reader sees either
//!    the old bytes or the new bytes, never a torn file.
//! 3. All I/O errors are propagated, never silently ignored.

pub mod blobs;
pub mod error;
pub mod lock;
pub mod path;
pub mod registry;
pub mod store;

pub use blobs::FileBlobs;
pub use error::{StoreError, StoreResult};
pub use lock::{PathGuard, PathKey, PathLocks, StoreGate};
pub use path::{allocate_path, validate_relative_path};
pub use registry::{InMemoryStoreRegistry, StoreRegistry};
pub use store::{Store, StoreStatus};

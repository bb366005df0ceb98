//! Foundation types for the versioned document store.
//!
//! Every other `dms` crate depends on `dms-types`. It holds only plain value
//! types: nothing here touches storage.
//!
//! # Key Types
//!
//! - [`ObjectId`]: identity of a versioned object (one per version)
//! - [`ContentId`]: identity of a content record (one blob + metadata)
//! - [`StoreId`]: identity of a file-backed storage root
//! - [`Version`]: `major.minor` version number
//! - [`BranchKind`]: which component a new version bumps
//! - [`ErrorKind`]: coarse error classification shared by all crates

pub mod error;
pub mod id;
pub mod version;

pub use error::{ErrorKind, TypeError};
pub use id::{ContentId, ObjectId, StoreId};
pub use version::{BranchKind, Version};

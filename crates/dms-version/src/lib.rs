//! Version management for the versioned document store.
//!
//! Branching creates a new object whose parent is the source version. The
//! new version starts out sharing the source's content: inline bytes are
//! copied, files are aliased. Copy-on-write in `dms-content` keeps the
//! siblings isolated from then on.
//!
//! - [`VersionManager`]: major/minor branching and version deletion
//! - [`VersionQuery`]: latest detection, history, and lookups by name

pub mod error;
pub mod manager;
pub mod query;

#[cfg(test)]
mod testing;

pub use error::{VersionError, VersionResult};
pub use manager::{BranchPlan, VersionManager};
pub use query::VersionQuery;

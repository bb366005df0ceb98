use dms_catalog::CatalogError;
use dms_content::ContentError;
use dms_types::{ErrorKind, ObjectId};

/// Errors from versioning operations.
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("content error: {0}")]
    Content(#[from] ContentError),

    /// An object names a parent version that does not exist.
    #[error("version chain of {id} is broken: parent {missing} does not exist")]
    BrokenChain { id: ObjectId, missing: ObjectId },

    /// Following parent links returned to an object already visited.
    #[error("version chain of {0} contains a cycle")]
    Cycle(ObjectId),

    /// The source content kept changing while a branch was being committed.
    #[error("content of {0} changed during every branch attempt")]
    Contended(ObjectId),
}

impl VersionError {
    /// Coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Catalog(e) => e.kind(),
            Self::Content(e) => e.kind(),
            Self::BrokenChain { .. } | Self::Cycle(_) => ErrorKind::InvalidState,
            Self::Contended(_) => ErrorKind::Conflict,
        }
    }
}

/// Result alias for versioning operations.
pub type VersionResult<T> = Result<T, VersionError>;

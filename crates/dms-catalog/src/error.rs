use dms_types::{ContentId, ErrorKind, ObjectId};

/// Errors from catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// No object exists with this id.
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// No content record exists with this id.
    #[error("content not found: {0}")]
    ContentNotFound(ContentId),

    /// The object names a parent version that does not exist.
    #[error("parent version not found: {0}")]
    ParentNotFound(ObjectId),

    /// An object or content record with this id already exists.
    #[error("duplicate id: {0}")]
    DuplicateId(String),

    /// The object breaks a version-chain rule.
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// A content record has both storage modes populated, or neither.
    #[error("invalid storage: {0}")]
    InvalidStorage(String),

    /// The object still has child versions and cannot be deleted.
    #[error("object {id} has {children} child version(s)")]
    HasChildren { id: ObjectId, children: usize },

    /// The catalog lock was poisoned.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl CatalogError {
    /// Coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ObjectNotFound(_) | Self::ContentNotFound(_) | Self::ParentNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::DuplicateId(_) | Self::HasChildren { .. } => {
                ErrorKind::Conflict
            }
            Self::InvalidObject(_) | Self::InvalidStorage(_) | Self::LockPoisoned(_) => {
                ErrorKind::InvalidState
            }
        }
    }
}

/// Result alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

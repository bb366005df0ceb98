use dms_types::{ErrorKind, StoreId};

/// Errors from store registry and blob operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No store is registered under this id.
    #[error("store not found: {0}")]
    NotFound(StoreId),

    /// No store is registered under this name.
    #[error("store not found with name: {0}")]
    NameNotFound(String),

    /// A store with this name already exists.
    #[error("store with name '{0}' already exists")]
    DuplicateName(String),

    /// The store is still referenced by content records.
    #[error("cannot remove store {id}: {references} content records still reference it")]
    InUse { id: StoreId, references: usize },

    /// The store is inactive and cannot accept writes.
    #[error("store is not active: {0}")]
    Inactive(String),

    /// The store definition is unusable (empty name, bad root, ...).
    #[error("invalid store: {0}")]
    InvalidStore(String),

    /// A relative storage path is empty or escapes the store root.
    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    /// A lock guarding registry or path state was poisoned.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::NameNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateName(_) | Self::InUse { .. } => ErrorKind::Conflict,
            Self::Inactive(_)
            | Self::InvalidStore(_)
            | Self::InvalidPath(_)
            | Self::LockPoisoned(_) => ErrorKind::InvalidState,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

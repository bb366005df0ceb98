use thiserror::Error;

use dms_types::ErrorKind;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] dms_store::StoreError),

    #[error("catalog error: {0}")]
    Catalog(#[from] dms_catalog::CatalogError),

    #[error("content error: {0}")]
    Content(#[from] dms_content::ContentError),

    #[error("version error: {0}")]
    Version(#[from] dms_version::VersionError),
}

impl VaultError {
    /// Coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::InvalidState,
            Self::Io(_) => ErrorKind::Io,
            Self::Store(e) => e.kind(),
            Self::Catalog(e) => e.kind(),
            Self::Content(e) => e.kind(),
            Self::Version(e) => e.kind(),
        }
    }
}

pub type VaultResult<T> = Result<T, VaultError>;

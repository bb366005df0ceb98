use dms_catalog::CatalogError;
use dms_store::StoreError;
use dms_types::{ContentId, ErrorKind};

use crate::transform::TransformError;

/// Errors from content operations.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Renditions can only be derived from records that are not themselves
    /// secondary renditions.
    #[error("content {0} is a secondary rendition and cannot be a rendition source")]
    SecondarySource(ContentId),

    /// The operation needs a primary record.
    #[error("content {0} is not a primary rendition")]
    NotPrimary(ContentId),

    /// No registered transformer handles the requested conversion.
    #[error("no transformer from {source_type} to {target_type}")]
    NoTransformer {
        source_type: String,
        target_type: String,
    },

    #[error("transformation failed: {0}")]
    Transform(#[from] TransformError),

    #[error("invalid upload: {0}")]
    InvalidUpload(String),
}

impl ContentError {
    /// Coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Catalog(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::NoTransformer { .. } => ErrorKind::NotFound,
            Self::SecondarySource(_)
            | Self::NotPrimary(_)
            | Self::Transform(_)
            | Self::InvalidUpload(_) => ErrorKind::InvalidState,
        }
    }
}

/// Result alias for content operations.
pub type ContentResult<T> = Result<T, ContentError>;

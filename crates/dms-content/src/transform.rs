//! Content transformer interface and the registry that holds transformers.
//!
//! Transformers are external collaborators: this crate only defines the
//! seam and persists whatever bytes a transformer produces as a secondary
//! rendition. The registry is a plain value, built once and passed by
//! reference to whatever needs it.

use std::fmt;
use std::sync::Arc;

use dms_catalog::ContentRecord;

/// Failure reported by a transformer.
#[derive(Debug, thiserror::Error)]
#[error("{transformer}: {message}")]
pub struct TransformError {
    pub transformer: String,
    pub message: String,
}

impl TransformError {
    pub fn new(transformer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            transformer: transformer.into(),
            message: message.into(),
        }
    }
}

/// Converts content of one type into another.
pub trait ContentTransformer: Send + Sync {
    /// Unique name of this transformer.
    fn name(&self) -> &str;

    /// MIME type this transformer reads, e.g. `application/pdf`.
    fn source_type(&self) -> &str;

    /// MIME type this transformer produces, e.g. `text/plain`.
    fn target_type(&self) -> &str;

    /// Convert the source bytes.
    fn transform(&self, input: &[u8]) -> Result<Vec<u8>, TransformError>;

    /// Returns `true` if this transformer accepts `record`'s content type.
    fn can_transform(&self, record: &ContentRecord) -> bool {
        record
            .content_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(self.source_type()))
    }

    /// Whether the output should be fed to the search indexer.
    fn produces_indexable(&self) -> bool {
        self.target_type().starts_with("text/")
    }
}

/// The set of available transformers, in registration order.
#[derive(Clone, Default)]
pub struct TransformerRegistry {
    transformers: Vec<Arc<dyn ContentTransformer>>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transformer, replacing any previous one with the same name.
    pub fn register(&mut self, transformer: Arc<dyn ContentTransformer>) {
        self.transformers.retain(|t| t.name() != transformer.name());
        self.transformers.push(transformer);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, transformer: Arc<dyn ContentTransformer>) -> Self {
        self.register(transformer);
        self
    }

    /// Remove a transformer by name. Returns `true` if it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.transformers.len();
        self.transformers.retain(|t| t.name() != name);
        self.transformers.len() != before
    }

    /// First transformer that accepts `record`.
    pub fn find_for(&self, record: &ContentRecord) -> Option<Arc<dyn ContentTransformer>> {
        self.transformers
            .iter()
            .find(|t| t.can_transform(record))
            .cloned()
    }

    /// First transformer from `source_type` to `target_type`.
    pub fn find(&self, source_type: &str, target_type: &str) -> Option<Arc<dyn ContentTransformer>> {
        self.transformers
            .iter()
            .find(|t| {
                t.source_type().eq_ignore_ascii_case(source_type)
                    && t.target_type().eq_ignore_ascii_case(target_type)
            })
            .cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerRegistry")
            .field("transformers", &self.names())
            .finish()
    }
}

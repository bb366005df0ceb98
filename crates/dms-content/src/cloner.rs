use chrono::Utc;
use dms_catalog::{ContentRecord, StorageLocation};
use dms_types::{ContentId, ObjectId};

/// Builds the sibling of a content record for a newly branched version.
///
/// Inline bytes are copied. File-backed records alias the source's
/// `(store, path)`; no file is copied until one of the siblings is written.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentCloner;

impl ContentCloner {
    /// The clone of `source` owned by `target`, with a fresh id.
    ///
    /// `parent_rendition` is copied as-is, so a cloned secondary still
    /// points at its source in the old version.
    pub fn clone_for(source: &ContentRecord, target: ObjectId) -> ContentRecord {
        let storage = match &source.storage {
            StorageLocation::Inline { bytes } => StorageLocation::inline(bytes.clone()),
            StorageLocation::File { store_id, path } => StorageLocation::file(*store_id, path.clone()),
        };
        let now = Utc::now();
        ContentRecord {
            id: ContentId::new(),
            name: source.name.clone(),
            content_type: source.content_type.clone(),
            object_id: target,
            is_primary: source.is_primary,
            parent_rendition: source.parent_rendition,
            indexable: source.indexable,
            storage,
            created_at: now,
            modified_at: now,
        }
    }

    /// Clones of every record in `sources`, in the same order.
    pub fn clone_all(sources: &[ContentRecord], target: ObjectId) -> Vec<ContentRecord> {
        sources.iter().map(|s| Self::clone_for(s, target)).collect()
    }
}

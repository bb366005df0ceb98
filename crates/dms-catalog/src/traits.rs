use dms_types::{ContentId, ObjectId, StoreId};

use crate::content::ContentRecord;
use crate::error::CatalogResult;
use crate::object::VersionedObject;

/// Metadata persistence for versioned objects and their content records.
///
/// Implementations must satisfy these invariants:
/// - An object's id and parent never change once it is persisted.
/// - A parent always has a strictly smaller version than its child.
/// - Every content record belongs to exactly one existing object.
/// - `commit_branch` is all-or-nothing: readers see the new object together
///   with all of its content records, or none of them.
/// - Lists come back in a stable order: creation order unless stated
///   otherwise.
pub trait Catalog: Send + Sync {
    /// Persist a new object, assigning an id when it has none.
    ///
    /// Fails if the parent is unknown, is the object itself, or does not
    /// have a smaller version.
    fn insert_object(&self, object: VersionedObject) -> CatalogResult<VersionedObject>;

    /// Fetch an object by id.
    fn get_object(&self, id: ObjectId) -> CatalogResult<VersionedObject>;

    /// Replace the mutable attributes of a persisted object.
    ///
    /// Id, parent, version and creation time are immutable.
    fn update_object(&self, object: &VersionedObject) -> CatalogResult<VersionedObject>;

    /// Every persisted object.
    fn all_objects(&self) -> CatalogResult<Vec<VersionedObject>>;

    /// Objects whose parent is `id`.
    fn children_of(&self, id: ObjectId) -> CatalogResult<Vec<VersionedObject>>;

    /// Objects with this exact name, newest version first. Equal versions
    /// are ordered most recently created first.
    fn objects_by_name(&self, name: &str) -> CatalogResult<Vec<VersionedObject>>;

    /// Remove an object together with its content records, returning the
    /// removed records. Fails with a conflict while child versions exist.
    fn delete_object(&self, id: ObjectId) -> CatalogResult<Vec<ContentRecord>>;

    /// Persist a branched object and its cloned content records as one unit.
    fn commit_branch(
        &self,
        object: VersionedObject,
        contents: Vec<ContentRecord>,
    ) -> CatalogResult<VersionedObject>;

    /// Persist a new content record for an existing object.
    fn insert_content(&self, record: ContentRecord) -> CatalogResult<ContentRecord>;

    /// Fetch a content record by id.
    fn get_content(&self, id: ContentId) -> CatalogResult<ContentRecord>;

    /// Replace a persisted content record. The owning object cannot change.
    fn update_content(&self, record: &ContentRecord) -> CatalogResult<()>;

    /// Remove a content record and return it.
    fn delete_content(&self, id: ContentId) -> CatalogResult<ContentRecord>;

    /// Content records owned by an object.
    fn contents_of(&self, object_id: ObjectId) -> CatalogResult<Vec<ContentRecord>>;

    /// Secondary renditions whose source is `content_id`, owned by the same
    /// object as `content_id`. Clones carried into other versions keep their
    /// source pointer but are not listed. Empty when `content_id` is unknown.
    fn renditions_of(&self, content_id: ContentId) -> CatalogResult<Vec<ContentRecord>>;

    /// File-backed records stored in `store_id`.
    fn contents_in_store(&self, store_id: StoreId) -> CatalogResult<Vec<ContentRecord>>;

    /// Ids of every record pointing at `(store_id, path)`.
    fn path_references(&self, store_id: StoreId, path: &str) -> CatalogResult<Vec<ContentId>> {
        Ok(self
            .contents_in_store(store_id)?
            .into_iter()
            .filter(|r| r.storage.file_ref() == Some((store_id, path)))
            .map(|r| r.id)
            .collect())
    }

    /// Number of records stored in `store_id`.
    fn store_reference_count(&self, store_id: StoreId) -> CatalogResult<usize> {
        Ok(self.contents_in_store(store_id)?.len())
    }

    /// Returns `true` if any object names `id` as its parent.
    fn has_children(&self, id: ObjectId) -> CatalogResult<bool> {
        Ok(!self.children_of(id)?.is_empty())
    }
}

//! In-memory catalog for testing and ephemeral use.
//!
//! [`InMemoryCatalog`] keeps objects and content records in `HashMap`s behind
//! a single `RwLock`, so a multi-row change such as a branch commit is
//! validated and applied under one write guard.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use dms_types::{ContentId, ObjectId, StoreId};
use tracing::debug;

use crate::content::ContentRecord;
use crate::error::{CatalogError, CatalogResult};
use crate::object::VersionedObject;
use crate::traits::Catalog;

#[derive(Debug)]
struct Row<T> {
    seq: u64,
    value: T,
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<ObjectId, Row<VersionedObject>>,
    contents: HashMap<ContentId, Row<ContentRecord>>,
    next_seq: u64,
}

impl State {
    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn object(&self, id: ObjectId) -> CatalogResult<&VersionedObject> {
        self.objects
            .get(&id)
            .map(|row| &row.value)
            .ok_or(CatalogError::ObjectNotFound(id))
    }

    /// Check a new object against the version-chain rules and fix its id.
    fn validate_new_object(&self, object: &mut VersionedObject) -> CatalogResult<ObjectId> {
        let id = *object.id.get_or_insert_with(ObjectId::new);
        if self.objects.contains_key(&id) {
            return Err(CatalogError::DuplicateId(id.to_string()));
        }
        if let Some(parent_id) = object.parent_version {
            if parent_id == id {
                return Err(CatalogError::InvalidObject(format!(
                    "object {id} cannot be its own parent"
                )));
            }
            let parent = self
                .objects
                .get(&parent_id)
                .ok_or(CatalogError::ParentNotFound(parent_id))?;
            if parent.value.version >= object.version {
                return Err(CatalogError::InvalidObject(format!(
                    "version {} does not follow parent version {}",
                    object.version, parent.value.version
                )));
            }
        }
        Ok(id)
    }

    fn validate_new_content(
        &self,
        record: &ContentRecord,
        pending_owner: Option<ObjectId>,
    ) -> CatalogResult<()> {
        if self.contents.contains_key(&record.id) {
            return Err(CatalogError::DuplicateId(record.id.to_string()));
        }
        let owner_known = pending_owner == Some(record.object_id)
            || self.objects.contains_key(&record.object_id);
        if !owner_known {
            return Err(CatalogError::ObjectNotFound(record.object_id));
        }
        Ok(())
    }

    fn sorted_contents<F>(&self, filter: F) -> Vec<ContentRecord>
    where
        F: Fn(&ContentRecord) -> bool,
    {
        let mut rows: Vec<&Row<ContentRecord>> =
            self.contents.values().filter(|r| filter(&r.value)).collect();
        rows.sort_by_key(|r| r.seq);
        rows.into_iter().map(|r| r.value.clone()).collect()
    }

    fn sorted_objects<F>(&self, filter: F) -> Vec<&Row<VersionedObject>>
    where
        F: Fn(&VersionedObject) -> bool,
    {
        let mut rows: Vec<&Row<VersionedObject>> =
            self.objects.values().filter(|r| filter(&r.value)).collect();
        rows.sort_by_key(|r| r.seq);
        rows
    }
}

/// An in-memory implementation of [`Catalog`].
///
/// Data is lost when the catalog is dropped.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: RwLock<State>,
}

impl InMemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted objects.
    pub fn object_count(&self) -> CatalogResult<usize> {
        Ok(self.read()?.objects.len())
    }

    /// Number of persisted content records.
    pub fn content_count(&self) -> CatalogResult<usize> {
        Ok(self.read()?.contents.len())
    }

    fn read(&self) -> CatalogResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| CatalogError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> CatalogResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| CatalogError::LockPoisoned(e.to_string()))
    }
}

impl Catalog for InMemoryCatalog {
    fn insert_object(&self, mut object: VersionedObject) -> CatalogResult<VersionedObject> {
        let mut state = self.write()?;
        let id = state.validate_new_object(&mut object)?;
        let seq = state.seq();
        state.objects.insert(
            id,
            Row {
                seq,
                value: object.clone(),
            },
        );
        debug!(object = %id, name = %object.name, version = %object.version, "inserted object");
        Ok(object)
    }

    fn get_object(&self, id: ObjectId) -> CatalogResult<VersionedObject> {
        self.read()?.object(id).cloned()
    }

    fn update_object(&self, object: &VersionedObject) -> CatalogResult<VersionedObject> {
        let id = object
            .id
            .ok_or_else(|| CatalogError::InvalidObject("object has not been persisted".into()))?;
        let mut state = self.write()?;
        let row = state
            .objects
            .get_mut(&id)
            .ok_or(CatalogError::ObjectNotFound(id))?;
        if row.value.parent_version != object.parent_version {
            return Err(CatalogError::InvalidObject(format!(
                "parent of object {id} cannot change"
            )));
        }
        if row.value.version != object.version {
            return Err(CatalogError::InvalidObject(format!(
                "version of object {id} cannot change"
            )));
        }
        let created_at = row.value.created_at;
        row.value = object.clone();
        row.value.created_at = created_at;
        Ok(row.value.clone())
    }

    fn all_objects(&self) -> CatalogResult<Vec<VersionedObject>> {
        let state = self.read()?;
        Ok(state
            .sorted_objects(|_| true)
            .into_iter()
            .map(|r| r.value.clone())
            .collect())
    }

    fn children_of(&self, id: ObjectId) -> CatalogResult<Vec<VersionedObject>> {
        let state = self.read()?;
        Ok(state
            .sorted_objects(|o| o.parent_version == Some(id))
            .into_iter()
            .map(|r| r.value.clone())
            .collect())
    }

    fn objects_by_name(&self, name: &str) -> CatalogResult<Vec<VersionedObject>> {
        let state = self.read()?;
        let mut rows = state.sorted_objects(|o| o.name == name);
        rows.sort_by(|a, b| {
            b.value
                .version
                .cmp(&a.value.version)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(rows.into_iter().map(|r| r.value.clone()).collect())
    }

    fn delete_object(&self, id: ObjectId) -> CatalogResult<Vec<ContentRecord>> {
        let mut state = self.write()?;
        state.object(id)?;
        let children = state
            .objects
            .values()
            .filter(|r| r.value.parent_version == Some(id))
            .count();
        if children > 0 {
            return Err(CatalogError::HasChildren { id, children });
        }
        let removed = state.sorted_contents(|r| r.object_id == id);
        for record in &removed {
            state.contents.remove(&record.id);
        }
        state.objects.remove(&id);
        debug!(object = %id, contents = removed.len(), "deleted object");
        Ok(removed)
    }

    fn commit_branch(
        &self,
        mut object: VersionedObject,
        contents: Vec<ContentRecord>,
    ) -> CatalogResult<VersionedObject> {
        let mut state = self.write()?;
        let id = state.validate_new_object(&mut object)?;
        for (i, record) in contents.iter().enumerate() {
            if record.object_id != id {
                return Err(CatalogError::InvalidObject(format!(
                    "content {} is not owned by the branched object",
                    record.id
                )));
            }
            state.validate_new_content(record, Some(id))?;
            if contents[..i].iter().any(|r| r.id == record.id) {
                return Err(CatalogError::DuplicateId(record.id.to_string()));
            }
        }

        // Validation is complete; nothing below can fail.
        let seq = state.seq();
        state.objects.insert(
            id,
            Row {
                seq,
                value: object.clone(),
            },
        );
        let count = contents.len();
        for record in contents {
            let seq = state.seq();
            state.contents.insert(record.id, Row { seq, value: record });
        }
        debug!(object = %id, version = %object.version, contents = count, "committed branch");
        Ok(object)
    }

    fn insert_content(&self, record: ContentRecord) -> CatalogResult<ContentRecord> {
        let mut state = self.write()?;
        state.validate_new_content(&record, None)?;
        let seq = state.seq();
        state.contents.insert(
            record.id,
            Row {
                seq,
                value: record.clone(),
            },
        );
        debug!(content = %record.id, object = %record.object_id, "inserted content");
        Ok(record)
    }

    fn get_content(&self, id: ContentId) -> CatalogResult<ContentRecord> {
        self.read()?
            .contents
            .get(&id)
            .map(|r| r.value.clone())
            .ok_or(CatalogError::ContentNotFound(id))
    }

    fn update_content(&self, record: &ContentRecord) -> CatalogResult<()> {
        let mut state = self.write()?;
        let row = state
            .contents
            .get_mut(&record.id)
            .ok_or(CatalogError::ContentNotFound(record.id))?;
        if row.value.object_id != record.object_id {
            return Err(CatalogError::InvalidObject(format!(
                "owner of content {} cannot change",
                record.id
            )));
        }
        row.value = record.clone();
        Ok(())
    }

    fn delete_content(&self, id: ContentId) -> CatalogResult<ContentRecord> {
        let mut state = self.write()?;
        state
            .contents
            .remove(&id)
            .map(|r| r.value)
            .ok_or(CatalogError::ContentNotFound(id))
    }

    fn contents_of(&self, object_id: ObjectId) -> CatalogResult<Vec<ContentRecord>> {
        Ok(self.read()?.sorted_contents(|r| r.object_id == object_id))
    }

    fn renditions_of(&self, content_id: ContentId) -> CatalogResult<Vec<ContentRecord>> {
        let state = self.read()?;
        let Some(owner) = state.contents.get(&content_id).map(|r| r.value.object_id) else {
            return Ok(Vec::new());
        };
        Ok(state.sorted_contents(|r| {
            r.parent_rendition == Some(content_id) && r.is_secondary() && r.object_id == owner
        }))
    }

    fn contents_in_store(&self, store_id: StoreId) -> CatalogResult<Vec<ContentRecord>> {
        Ok(self
            .read()?
            .sorted_contents(|r| matches!(r.storage.file_ref(), Some((s, _)) if s == store_id)))
    }

    fn path_references(&self, store_id: StoreId, path: &str) -> CatalogResult<Vec<ContentId>> {
        let state = self.read()?;
        Ok(state
            .sorted_contents(|r| r.storage.file_ref() == Some((store_id, path)))
            .into_iter()
            .map(|r| r.id)
            .collect())
    }
}

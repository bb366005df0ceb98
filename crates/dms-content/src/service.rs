//! Content record lifecycle: upload, read, copy-on-write write, delete, and
//! storage migration.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use dms_catalog::{Catalog, ContentRecord, StorageLocation};
use dms_store::{PathGuard, PathKey, PathLocks, StoreGate};
use dms_types::{ContentId, ObjectId, StoreId};
use tracing::{debug, warn};

use crate::backend::{StorageBackend, StorageTarget};
use crate::error::{ContentError, ContentResult};

/// Bytes and metadata for a new primary content record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub indexable: bool,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes: bytes.into(),
            indexable: false,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn indexable(mut self, indexable: bool) -> Self {
        self.indexable = indexable;
        self
    }
}

/// Owns every change to content records and their bytes.
///
/// File-backed records may share a `(store, path)` with siblings in other
/// versions. Every operation that writes or removes such a file first takes
/// the path lock, then re-reads the record, then checks who else references
/// the path.
///
/// Operations that make a record point into a store it may not already be
/// referenced from hold the store gate shared, so [`remove_store`] never
/// unregisters a store a record is about to reference.
///
/// [`remove_store`]: ContentService::remove_store
pub struct ContentService {
    catalog: Arc<dyn Catalog>,
    backend: StorageBackend,
    locks: Arc<PathLocks>,
    gate: StoreGate,
}

impl ContentService {
    pub fn new(catalog: Arc<dyn Catalog>, backend: StorageBackend, locks: Arc<PathLocks>) -> Self {
        Self {
            catalog,
            backend,
            locks,
            gate: StoreGate::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    pub fn locks(&self) -> &Arc<PathLocks> {
        &self.locks
    }

    pub(crate) fn gate(&self) -> &StoreGate {
        &self.gate
    }

    // ------------------------------------------------------------------
    // Upload
    // ------------------------------------------------------------------

    /// Store an upload as a new primary record of `object_id`.
    pub fn create(
        &self,
        object_id: ObjectId,
        upload: Upload,
        target: StorageTarget,
    ) -> ContentResult<ContentRecord> {
        if upload.name.trim().is_empty() {
            return Err(ContentError::InvalidUpload("content name cannot be empty".into()));
        }
        self.catalog.get_object(object_id)?;

        let _placing = self.gate.placing()?;
        let storage = self.backend.write_fresh(target, &upload.name, &upload.bytes)?;
        let mut record = ContentRecord::new(object_id, upload.name, upload.content_type, storage);
        record.indexable = upload.indexable;
        let record = self.persist_new(record)?;
        debug!(content = %record.id, object = %object_id, storage = ?record.storage, "created content");
        Ok(record)
    }

    /// Store an upload inline.
    pub fn create_inline(&self, object_id: ObjectId, upload: Upload) -> ContentResult<ContentRecord> {
        self.create(object_id, upload, StorageTarget::Inline)
    }

    /// Store an upload as a file in `store_id`, which must be active.
    pub fn create_in_store(
        &self,
        object_id: ObjectId,
        store_id: StoreId,
        upload: Upload,
    ) -> ContentResult<ContentRecord> {
        self.create(object_id, upload, StorageTarget::Store(store_id))
    }

    /// Insert a record whose bytes were just written to a fresh location.
    /// The fresh file is removed again if the insert fails.
    pub(crate) fn persist_new(&self, record: ContentRecord) -> ContentResult<ContentRecord> {
        let storage = record.storage.clone();
        match self.catalog.insert_content(record) {
            Ok(record) => Ok(record),
            Err(e) => {
                self.discard_fresh(&storage);
                Err(e.into())
            }
        }
    }

    fn discard_fresh(&self, storage: &StorageLocation) {
        if let Some((store, path)) = storage.file_ref() {
            if let Err(e) = self.backend.remove_file(store, path) {
                warn!(%store, %path, error = %e, "could not remove unused file");
            }
        }
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get(&self, id: ContentId) -> ContentResult<ContentRecord> {
        Ok(self.catalog.get_content(id)?)
    }

    pub fn contents_of(&self, object_id: ObjectId) -> ContentResult<Vec<ContentRecord>> {
        Ok(self.catalog.contents_of(object_id)?)
    }

    /// Records of `object_id` flagged for the search indexer.
    pub fn indexable_contents(&self, object_id: ObjectId) -> ContentResult<Vec<ContentRecord>> {
        Ok(self
            .catalog
            .contents_of(object_id)?
            .into_iter()
            .filter(|r| r.indexable)
            .collect())
    }

    pub fn read_bytes(&self, id: ContentId) -> ContentResult<Vec<u8>> {
        let record = self.catalog.get_content(id)?;
        self.backend.read(&record.storage)
    }

    pub fn size(&self, id: ContentId) -> ContentResult<u64> {
        let record = self.catalog.get_content(id)?;
        self.backend.size(&record.storage)
    }

    /// BLAKE3 digest of the record's bytes, hex encoded.
    pub fn digest(&self, id: ContentId) -> ContentResult<String> {
        let bytes = self.read_bytes(id)?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }

    // ------------------------------------------------------------------
    // Locking
    // ------------------------------------------------------------------

    /// Fetch a record and, if it is file-backed, hold its path lock.
    ///
    /// The record is re-read after the lock is acquired. If its storage
    /// moved while this thread waited, the lock is dropped and the sequence
    /// starts over.
    fn lock_record(&self, id: ContentId) -> ContentResult<(ContentRecord, Option<PathGuard<'_>>)> {
        loop {
            let record = self.catalog.get_content(id)?;
            let Some((store, path)) = record.storage.file_ref() else {
                return Ok((record, None));
            };
            let guard = self.locks.lock(store, path)?;
            let current = self.catalog.get_content(id)?;
            if current.storage == record.storage {
                return Ok((current, Some(guard)));
            }
            debug!(content = %id, "storage moved while waiting for path lock; retrying");
        }
    }

    /// Hold the path locks of every file-backed record in `records`.
    pub fn lock_paths(&self, records: &[ContentRecord]) -> ContentResult<PathGuard<'_>> {
        let keys = records
            .iter()
            .filter_map(|r| r.storage.file_ref())
            .map(|(store, path)| PathKey::new(store, path));
        Ok(self.locks.lock_many(keys)?)
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Replace the bytes of a record.
    ///
    /// Inline records are overwritten. A file-backed record whose path no
    /// other record references is overwritten in place; otherwise the bytes
    /// go to a fresh path in the same store and only this record is
    /// repointed. The store must be active.
    pub fn set_bytes(&self, id: ContentId, bytes: &[u8]) -> ContentResult<ContentRecord> {
        let (mut record, _guard) = self.lock_record(id)?;

        let mut forked = None;
        match record.storage.clone() {
            StorageLocation::Inline { .. } => {
                record.storage = StorageLocation::inline(bytes.to_vec());
            }
            StorageLocation::File { store_id, path } => {
                self.backend.store(store_id)?.ensure_active()?;
                let shared = self
                    .catalog
                    .path_references(store_id, &path)?
                    .into_iter()
                    .any(|other| other != id);
                if shared {
                    let fresh = self.backend.write_fresh(
                        StorageTarget::Store(store_id),
                        &record.name,
                        bytes,
                    )?;
                    debug!(content = %id, from = %path, to = ?fresh, "forked shared file");
                    record.storage = fresh.clone();
                    forked = Some(fresh);
                } else {
                    self.backend.overwrite(store_id, &path, bytes)?;
                }
            }
        }

        record.touch();
        if let Err(e) = self.catalog.update_content(&record) {
            if let Some(fresh) = forked {
                self.discard_fresh(&fresh);
            }
            return Err(e.into());
        }
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Remove a record. Its file is removed only when no other record still
    /// references it. Failure to remove the file is logged, not returned.
    ///
    /// Secondary renditions derived from this record are left in place.
    pub fn delete(&self, id: ContentId) -> ContentResult<ContentRecord> {
        let (record, _guard) = self.lock_record(id)?;
        self.catalog.delete_content(id)?;
        if let Some((store, path)) = record.storage.file_ref() {
            self.remove_if_unreferenced(store, path);
        }
        debug!(content = %id, object = %record.object_id, "deleted content");
        Ok(record)
    }

    /// Clean up the files of records already removed from the catalog.
    pub fn release_storage(&self, records: &[ContentRecord]) -> ContentResult<()> {
        let paths: BTreeSet<(StoreId, &str)> =
            records.iter().filter_map(|r| r.storage.file_ref()).collect();
        for (store, path) in paths {
            let _guard = self.locks.lock(store, path)?;
            self.remove_if_unreferenced(store, path);
        }
        Ok(())
    }

    /// The caller holds the path lock.
    fn remove_if_unreferenced(&self, store: StoreId, path: &str) {
        match self.catalog.path_references(store, path) {
            Ok(refs) if refs.is_empty() => match self.backend.remove_file(store, path) {
                Ok(existed) => debug!(%store, %path, existed, "removed unreferenced file"),
                Err(e) => warn!(%store, %path, error = %e, "could not remove unreferenced file"),
            },
            Ok(refs) => debug!(%store, %path, references = refs.len(), "file still shared"),
            Err(e) => warn!(%store, %path, error = %e, "could not check file references"),
        }
    }

    // ------------------------------------------------------------------
    // Migration
    // ------------------------------------------------------------------

    /// Move a record's bytes into a file in `store_id`.
    ///
    /// A record already in that store is returned unchanged. The previous
    /// file, if any, is removed only when nothing else references it.
    pub fn move_to_store(&self, id: ContentId, store_id: StoreId) -> ContentResult<ContentRecord> {
        let (record, _guard) = self.lock_record(id)?;
        if matches!(record.storage.file_ref(), Some((s, _)) if s == store_id) {
            return Ok(record);
        }
        let bytes = self.backend.read(&record.storage)?;
        let _placing = self.gate.placing()?;
        let fresh = self
            .backend
            .write_fresh(StorageTarget::Store(store_id), &record.name, &bytes)?;
        self.relocate(record, fresh)
    }

    /// Move a record's bytes inline. Inline records are returned unchanged.
    pub fn move_to_inline(&self, id: ContentId) -> ContentResult<ContentRecord> {
        let (record, _guard) = self.lock_record(id)?;
        if record.storage.is_inline() {
            return Ok(record);
        }
        let bytes = self.backend.read(&record.storage)?;
        self.relocate(record, StorageLocation::inline(bytes))
    }

    /// The caller holds the path lock of `record`'s current location.
    fn relocate(
        &self,
        mut record: ContentRecord,
        fresh: StorageLocation,
    ) -> ContentResult<ContentRecord> {
        let old = std::mem::replace(&mut record.storage, fresh);
        record.touch();
        if let Err(e) = self.catalog.update_content(&record) {
            self.discard_fresh(&record.storage);
            return Err(e.into());
        }
        if let Some((store, path)) = old.file_ref() {
            self.remove_if_unreferenced(store, path);
        }
        debug!(content = %record.id, from = ?old, to = ?record.storage, "moved content");
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Housekeeping
    // ------------------------------------------------------------------

    /// Unregister a store no record references.
    ///
    /// Uploads and moves into the store wait while the references are
    /// counted, so a store that is removed stays unreferenced.
    pub fn remove_store(&self, store_id: StoreId) -> ContentResult<()> {
        let _retiring = self.gate.retiring()?;
        let references = self.catalog.store_reference_count(store_id)?;
        self.backend.registry().remove(store_id, references)?;
        debug!(store = %store_id, "no content referenced the store");
        Ok(())
    }

    /// Files under a store root that no record references.
    pub fn orphaned_files(&self, store_id: StoreId) -> ContentResult<Vec<String>> {
        let referenced: BTreeSet<String> = self
            .catalog
            .contents_in_store(store_id)?
            .iter()
            .filter_map(|r| r.storage.file_ref().map(|(_, p)| p.to_string()))
            .collect();
        Ok(self
            .backend
            .list_files(store_id)?
            .into_iter()
            .filter(|p| !referenced.contains(p))
            .collect())
    }
}

impl fmt::Debug for ContentService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentService")
            .field("backend", &self.backend)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::Fixture;
    use super::*;
    use dms_store::StoreRegistry;
    use dms_types::ErrorKind;

    #[test]
    fn create_requires_existing_object() {
        let fx = Fixture::new();
        let err = fx
            .service
            .create_inline(ObjectId::new(), Upload::new("a.txt", b"x".to_vec()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn create_rejects_empty_name() {
        let fx = Fixture::new();
        let err = fx
            .service
            .create_inline(fx.object, Upload::new(" ", b"x".to_vec()))
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidUpload(_)));
    }

    #[test]
    fn upload_to_inactive_store_refused() {
        let fx = Fixture::new();
        fx.service.backend().registry().deactivate(fx.store).unwrap();
        let err = fx
            .service
            .create_in_store(fx.object, fx.store, Upload::new("a.txt", b"x".to_vec()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(fx.service.contents_of(fx.object).unwrap().is_empty());
    }

    #[test]
    fn inline_write_is_isolated_from_sibling() {
        let fx = Fixture::new();
        let c = fx.inline(b"hello");
        let c2 = fx.sibling_of(&c);

        fx.service.set_bytes(c2.id, b"world").unwrap();
        assert_eq!(fx.service.read_bytes(c.id).unwrap(), b"hello");
        assert_eq!(fx.service.read_bytes(c2.id).unwrap(), b"world");
    }

    #[test]
    fn shared_file_write_forks_the_writer() {
        let fx = Fixture::new();
        let c = fx.file(b"hello");
        let c2 = fx.sibling_of(&c);
        let (_, p) = c.storage.file_ref().unwrap();
        assert_eq!(c2.storage.file_ref(), Some((fx.store, p)));

        let updated = fx.service.set_bytes(c2.id, b"world").unwrap();
        let (_, p2) = updated.storage.file_ref().unwrap();
        assert_ne!(p2, p);
        assert_eq!(std::fs::read(fx.dir.path().join(p)).unwrap(), b"hello");
        assert_eq!(fx.service.read_bytes(c.id).unwrap(), b"hello");
        assert_eq!(fx.service.read_bytes(c2.id).unwrap(), b"world");
    }

    #[test]
    fn writing_the_original_also_forks() {
        let fx = Fixture::new();
        let c = fx.file(b"hello");
        let c2 = fx.sibling_of(&c);

        let updated = fx.service.set_bytes(c.id, b"changed").unwrap();
        assert_ne!(updated.storage, c2.storage);
        assert_eq!(fx.service.read_bytes(c2.id).unwrap(), b"hello");
    }

    #[test]
    fn unshared_file_is_written_in_place() {
        let fx = Fixture::new();
        let c = fx.file(b"hello");
        let updated = fx.service.set_bytes(c.id, b"again").unwrap();
        assert_eq!(updated.storage, c.storage);
        assert_eq!(fx.service.read_bytes(c.id).unwrap(), b"again");
        assert_eq!(fx.service.size(c.id).unwrap(), 5);
    }

    #[test]
    fn second_write_after_fork_is_in_place() {
        let fx = Fixture::new();
        let c = fx.file(b"hello");
        let c2 = fx.sibling_of(&c);
        let forked = fx.service.set_bytes(c2.id, b"one").unwrap();
        let again = fx.service.set_bytes(c2.id, b"two").unwrap();
        assert_eq!(forked.storage, again.storage);
        assert_eq!(fx.service.read_bytes(c.id).unwrap(), b"hello");
    }

    #[test]
    fn write_to_inactive_store_refused() {
        let fx = Fixture::new();
        let c = fx.file(b"hello");
        fx.service.backend().registry().deactivate(fx.store).unwrap();
        let err = fx.service.set_bytes(c.id, b"nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(fx.service.read_bytes(c.id).unwrap(), b"hello");
        assert_eq!(fx.service.locks().held_count(), 0);
    }

    #[test]
    fn delete_keeps_shared_file() {
        let fx = Fixture::new();
        let c = fx.file(b"hello");
        let c2 = fx.sibling_of(&c);
        let (_, path) = c.storage.file_ref().unwrap();
        let full = fx.dir.path().join(path);

        fx.service.delete(c.id).unwrap();
        assert!(full.is_file());
        assert_eq!(fx.service.read_bytes(c2.id).unwrap(), b"hello");

        fx.service.delete(c2.id).unwrap();
        assert!(!full.exists());
        assert!(fx.service.backend().list_files(fx.store).unwrap().is_empty());
    }

    #[test]
    fn delete_unknown_is_not_found() {
        let fx = Fixture::new();
        let err = fx.service.delete(ContentId::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn release_storage_after_catalog_removal() {
        let fx = Fixture::new();
        let c = fx.file(b"hello");
        let removed = fx.service.catalog().delete_content(c.id).unwrap();
        assert_eq!(fx.service.orphaned_files(fx.store).unwrap().len(), 1);
        fx.service.release_storage(&[removed]).unwrap();
        assert!(fx.service.orphaned_files(fx.store).unwrap().is_empty());
    }

    #[test]
    fn move_between_inline_and_store() {
        let fx = Fixture::new();
        let c = fx.inline(b"payload");

        let moved = fx.service.move_to_store(c.id, fx.store).unwrap();
        assert!(moved.is_file_backed());
        assert_eq!(fx.service.read_bytes(c.id).unwrap(), b"payload");

        let back = fx.service.move_to_inline(c.id).unwrap();
        assert!(back.storage.is_inline());
        assert!(fx.service.backend().list_files(fx.store).unwrap().is_empty());
        assert_eq!(fx.service.read_bytes(c.id).unwrap(), b"payload");
    }

    #[test]
    fn moving_a_shared_record_keeps_the_shared_file() {
        let fx = Fixture::new();
        let c = fx.file(b"hello");
        let c2 = fx.sibling_of(&c);
        fx.service.move_to_inline(c2.id).unwrap();
        assert_eq!(fx.service.read_bytes(c.id).unwrap(), b"hello");
        assert_eq!(fx.service.backend().list_files(fx.store).unwrap().len(), 1);
    }

    #[test]
    fn indexable_contents_filters() {
        let fx = Fixture::new();
        fx.inline(b"binary");
        let text = fx
            .service
            .create_inline(
                fx.object,
                Upload::new("a.txt", b"text".to_vec())
                    .with_content_type("text/plain")
                    .indexable(true),
            )
            .unwrap();
        let found = fx.service.indexable_contents(fx.object).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, text.id);
    }

    #[test]
    fn digest_follows_bytes() {
        let fx = Fixture::new();
        let a = fx.inline(b"hello");
        let b = fx.file(b"hello");
        assert_eq!(fx.service.digest(a.id).unwrap(), fx.service.digest(b.id).unwrap());
        assert_eq!(fx.service.digest(a.id).unwrap().len(), 64);
        fx.service.set_bytes(b.id, b"other").unwrap();
        assert_ne!(fx.service.digest(a.id).unwrap(), fx.service.digest(b.id).unwrap());
    }

    #[test]
    fn orphaned_files_lists_unreferenced() {
        let fx = Fixture::new();
        fx.file(b"kept");
        std::fs::create_dir_all(fx.dir.path().join("zz")).unwrap();
        std::fs::write(fx.dir.path().join("zz/stray.bin"), b"x").unwrap();
        assert_eq!(fx.service.orphaned_files(fx.store).unwrap(), vec!["zz/stray.bin"]);
    }

    #[test]
    fn concurrent_writers_on_one_shared_path() {
        let fx = Fixture::new();
        let original = fx.file(b"base");
        let siblings: Vec<ContentRecord> = (0..8).map(|_| fx.sibling_of(&original)).collect();

        std::thread::scope(|s| {
            for (i, sibling) in siblings.iter().enumerate() {
                let service = &fx.service;
                s.spawn(move || {
                    service
                        .set_bytes(sibling.id, format!("writer-{i}").as_bytes())
                        .unwrap();
                });
            }
        });

        assert_eq!(fx.service.read_bytes(original.id).unwrap(), b"base");
        let mut paths = BTreeSet::new();
        for (i, sibling) in siblings.iter().enumerate() {
            let record = fx.service.get(sibling.id).unwrap();
            assert_eq!(
                fx.service.read_bytes(sibling.id).unwrap(),
                format!("writer-{i}").as_bytes()
            );
            paths.insert(record.storage.file_ref().unwrap().1.to_string());
        }
        assert_eq!(paths.len(), siblings.len());
        assert_eq!(fx.service.locks().held_count(), 0);
    }

    #[test]
    fn remove_store_refuses_referenced_store() {
        let fx = Fixture::new();
        let c = fx.file(b"kept");
        let err = fx.service.remove_store(fx.store).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        fx.service.move_to_inline(c.id).unwrap();
        fx.service.remove_store(fx.store).unwrap();
        let err = fx.service.backend().store(fx.store).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn uploads_racing_store_removal_never_dangle() {
        for _ in 0..16 {
            let fx = Fixture::new();
            let removed = std::thread::scope(|s| {
                for i in 0..4 {
                    let fx = &fx;
                    s.spawn(move || {
                        for j in 0..8 {
                            let upload = Upload::new(format!("u{i}-{j}.txt"), b"x".to_vec());
                            // Uploads after the removal fail with NotFound.
                            let _ = fx.service.create_in_store(fx.object, fx.store, upload);
                        }
                    });
                }
                fx.service.remove_store(fx.store).is_ok()
            });

            let references = fx.service.catalog().store_reference_count(fx.store).unwrap();
            if removed {
                assert_eq!(references, 0);
                assert!(fx.service.backend().store(fx.store).is_err());
            } else {
                assert!(references > 0);
            }
        }
    }
}

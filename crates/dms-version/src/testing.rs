use std::sync::Arc;

use dms_catalog::{Catalog, ContentRecord, InMemoryCatalog, ObjectKind, VersionedObject};
use dms_content::{ContentService, StorageBackend, Upload};
use dms_store::{InMemoryStoreRegistry, PathLocks, StoreRegistry};
use dms_types::{ObjectId, StoreId};
use tempfile::TempDir;

use crate::manager::VersionManager;
use crate::query::VersionQuery;

pub struct Fixture {
    pub dir: TempDir,
    pub store: StoreId,
    pub catalog: Arc<InMemoryCatalog>,
    pub content: Arc<ContentService>,
    pub versions: VersionManager,
    pub query: VersionQuery,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(InMemoryStoreRegistry::new());
        let store = registry.register("files", dir.path()).unwrap().id;
        let catalog = Arc::new(InMemoryCatalog::new());
        let content = Arc::new(ContentService::new(
            catalog.clone(),
            StorageBackend::new(registry),
            Arc::new(PathLocks::new()),
        ));
        let versions = VersionManager::new(catalog.clone(), content.clone());
        let query = VersionQuery::new(catalog.clone());
        Self {
            dir,
            store,
            catalog,
            content,
            versions,
            query,
        }
    }

    pub fn object(&self, name: &str, kind: ObjectKind) -> ObjectId {
        self.catalog
            .insert_object(VersionedObject::new(name, kind))
            .unwrap()
            .id
            .unwrap()
    }

    pub fn inline(&self, object: ObjectId, bytes: &[u8]) -> ContentRecord {
        self.content
            .create_inline(object, Upload::new("body.txt", bytes.to_vec()))
            .unwrap()
    }

    pub fn file(&self, object: ObjectId, bytes: &[u8]) -> ContentRecord {
        self.content
            .create_in_store(object, self.store, Upload::new("body.txt", bytes.to_vec()))
            .unwrap()
    }

    /// Number of files under the store root.
    pub fn files(&self) -> usize {
        self.content.backend().list_files(self.store).unwrap().len()
    }
}

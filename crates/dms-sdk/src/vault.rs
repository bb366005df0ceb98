//! The [`Vault`] facade: one handle over the catalog, the file stores, content
//! and version management, built from a [`VaultConfig`].

use std::path::Path;
use std::sync::Arc;

use dms_catalog::{Catalog, ContentRecord, InMemoryCatalog, ObjectKind, VersionedObject};
use dms_content::{
    ContentService, RenditionRequest, RenditionView, StorageBackend, StorageTarget,
    TransformerRegistry, Upload,
};
use dms_store::{InMemoryStoreRegistry, PathLocks, Store, StoreRegistry};
use dms_types::{BranchKind, ContentId, ObjectId, StoreId, Version};
use dms_version::{VersionManager, VersionQuery};
use tracing::info;

use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};

/// High-level document store API.
pub struct Vault {
    config: VaultConfig,
    default_target: StorageTarget,
    registry: Arc<InMemoryStoreRegistry>,
    catalog: Arc<InMemoryCatalog>,
    content: Arc<ContentService>,
    versions: VersionManager,
    query: VersionQuery,
    transformers: TransformerRegistry,
}

impl Vault {
    /// Open a vault, registering every configured store.
    pub fn open(config: VaultConfig) -> VaultResult<Self> {
        config.validate()?;

        let registry = Arc::new(
            InMemoryStoreRegistry::new().with_create_missing_roots(config.create_missing_roots),
        );
        let mut default_target = StorageTarget::Inline;
        for def in &config.stores {
            let store = registry.register(&def.name, &def.root)?;
            if !def.active {
                registry.deactivate(store.id)?;
            }
            if config.default_store.as_deref() == Some(def.name.as_str()) {
                default_target = StorageTarget::Store(store.id);
            }
        }

        let catalog = Arc::new(InMemoryCatalog::new());
        let backend = StorageBackend::new(registry.clone())
            .with_prune_empty_dirs(config.cleanup_empty_dirs);
        let content = Arc::new(ContentService::new(
            catalog.clone(),
            backend,
            Arc::new(PathLocks::new()),
        ));
        let versions = VersionManager::new(catalog.clone(), content.clone());
        let query = VersionQuery::new(catalog.clone());

        info!(
            stores = config.stores.len(),
            default_store = config.default_store.as_deref().unwrap_or("<inline>"),
            "opened vault"
        );
        Ok(Self {
            config,
            default_target,
            registry,
            catalog,
            content,
            versions,
            query,
            transformers: TransformerRegistry::new(),
        })
    }

    /// Open a vault from a TOML configuration document.
    pub fn from_toml(s: &str) -> VaultResult<Self> {
        Self::open(VaultConfig::from_toml_str(s)?)
    }

    /// Open a vault from a TOML configuration file.
    pub fn load(path: &Path) -> VaultResult<Self> {
        Self::open(VaultConfig::load(path)?)
    }

    /// Use `transformers` for [`transform`](Self::transform).
    pub fn with_transformers(mut self, transformers: TransformerRegistry) -> Self {
        self.transformers = transformers;
        self
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn transformers(&self) -> &TransformerRegistry {
        &self.transformers
    }

    /// Where [`upload`](Self::upload) puts new content.
    pub fn default_target(&self) -> StorageTarget {
        self.default_target
    }

    // ---- Objects ----

    /// Create a root object at version 1.0.
    pub fn create_object(&self, name: &str, kind: ObjectKind) -> VaultResult<VersionedObject> {
        Ok(self.catalog.insert_object(VersionedObject::new(name, kind))?)
    }

    pub fn get_object(&self, id: ObjectId) -> VaultResult<VersionedObject> {
        Ok(self.catalog.get_object(id)?)
    }

    pub fn update_object(&self, object: &VersionedObject) -> VaultResult<VersionedObject> {
        Ok(self.catalog.update_object(object)?)
    }

    /// Delete a version without children, releasing its content.
    pub fn delete_object(&self, id: ObjectId) -> VaultResult<()> {
        self.versions.delete_version(id)?;
        Ok(())
    }

    // ---- Content ----

    /// Upload bytes as a new primary record, into the default store.
    pub fn upload(
        &self,
        object_id: ObjectId,
        name: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> VaultResult<ContentRecord> {
        let mut upload = Upload::new(name, bytes);
        upload.content_type = content_type.map(str::to_string);
        upload.indexable = content_type.is_some_and(|t| t.starts_with("text/"));
        self.upload_to(object_id, upload, self.default_target)
    }

    pub fn upload_to(
        &self,
        object_id: ObjectId,
        upload: Upload,
        target: StorageTarget,
    ) -> VaultResult<ContentRecord> {
        Ok(self.content.create(object_id, upload, target)?)
    }

    pub fn get_content(&self, id: ContentId) -> VaultResult<ContentRecord> {
        Ok(self.content.get(id)?)
    }

    pub fn contents_of(&self, object_id: ObjectId) -> VaultResult<Vec<ContentRecord>> {
        Ok(self.content.contents_of(object_id)?)
    }

    pub fn read_bytes(&self, id: ContentId) -> VaultResult<Vec<u8>> {
        Ok(self.content.read_bytes(id)?)
    }

    /// Replace a record's bytes. Files shared with other versions are never
    /// written; the record is moved to a fresh file instead.
    pub fn write_bytes(&self, id: ContentId, bytes: &[u8]) -> VaultResult<ContentRecord> {
        Ok(self.content.set_bytes(id, bytes)?)
    }

    pub fn content_size(&self, id: ContentId) -> VaultResult<u64> {
        Ok(self.content.size(id)?)
    }

    pub fn digest(&self, id: ContentId) -> VaultResult<String> {
        Ok(self.content.digest(id)?)
    }

    pub fn delete_content(&self, id: ContentId) -> VaultResult<()> {
        self.content.delete(id)?;
        Ok(())
    }

    pub fn indexable_contents(&self, object_id: ObjectId) -> VaultResult<Vec<ContentRecord>> {
        Ok(self.content.indexable_contents(object_id)?)
    }

    pub fn move_to_store(&self, id: ContentId, store_id: StoreId) -> VaultResult<ContentRecord> {
        Ok(self.content.move_to_store(id, store_id)?)
    }

    pub fn move_to_inline(&self, id: ContentId) -> VaultResult<ContentRecord> {
        Ok(self.content.move_to_inline(id)?)
    }

    // ---- Versions ----

    pub fn branch(&self, object_id: ObjectId, kind: BranchKind) -> VaultResult<VersionedObject> {
        Ok(self.versions.branch(object_id, kind)?)
    }

    pub fn create_major_version(&self, object_id: ObjectId) -> VaultResult<VersionedObject> {
        Ok(self.versions.create_major_version(object_id)?)
    }

    pub fn create_minor_version(&self, object_id: ObjectId) -> VaultResult<VersionedObject> {
        Ok(self.versions.create_minor_version(object_id)?)
    }

    pub fn history(&self, id: ObjectId) -> VaultResult<Vec<VersionedObject>> {
        Ok(self.query.history(id)?)
    }

    pub fn is_latest(&self, id: ObjectId) -> VaultResult<bool> {
        Ok(self.query.is_latest(id)?)
    }

    pub fn all_versions_by_name(&self, name: &str) -> VaultResult<Vec<VersionedObject>> {
        Ok(self.query.all_versions_by_name(name)?)
    }

    pub fn latest_versions(&self) -> VaultResult<Vec<VersionedObject>> {
        Ok(self.query.latest_versions()?)
    }

    pub fn latest_by_name(&self, name: &str) -> VaultResult<Vec<VersionedObject>> {
        Ok(self.query.latest_by_name(name)?)
    }

    pub fn children(&self, id: ObjectId) -> VaultResult<Vec<VersionedObject>> {
        Ok(self.query.children(id)?)
    }

    pub fn find_by_name_and_version(
        &self,
        name: &str,
        version: Version,
    ) -> VaultResult<Option<VersionedObject>> {
        Ok(self.query.find_by_name_and_version(name, version)?)
    }

    // ---- Renditions ----

    pub fn add_secondary_rendition(
        &self,
        source_id: ContentId,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> VaultResult<ContentRecord> {
        Ok(self.content.add_secondary_rendition(source_id, bytes, content_type)?)
    }

    pub fn add_rendition(
        &self,
        source_id: ContentId,
        request: RenditionRequest,
    ) -> VaultResult<ContentRecord> {
        Ok(self.content.add_rendition(source_id, request)?)
    }

    /// Derive a rendition with the configured transformers.
    pub fn transform(
        &self,
        source_id: ContentId,
        target_type: Option<&str>,
    ) -> VaultResult<ContentRecord> {
        Ok(self
            .content
            .transform_and_add_rendition(source_id, target_type, &self.transformers)?)
    }

    pub fn renditions_of(&self, primary_id: ContentId) -> VaultResult<Vec<ContentRecord>> {
        Ok(self.content.renditions_of(primary_id)?)
    }

    pub fn rendition_view(&self, id: ContentId) -> VaultResult<RenditionView> {
        Ok(self.content.rendition_view(id)?)
    }

    pub fn remove_secondary_renditions(&self, primary_id: ContentId) -> VaultResult<usize> {
        Ok(self.content.remove_secondary_renditions(primary_id)?)
    }

    pub fn update_primary_content(
        &self,
        primary_id: ContentId,
        bytes: &[u8],
    ) -> VaultResult<ContentRecord> {
        Ok(self.content.update_primary_content(primary_id, bytes)?)
    }

    // ---- Stores ----

    pub fn register_store(&self, name: &str, root: &Path) -> VaultResult<Store> {
        Ok(self.registry.register(name, root)?)
    }

    pub fn store(&self, id: StoreId) -> VaultResult<Store> {
        Ok(self.registry.get(id)?)
    }

    pub fn store_by_name(&self, name: &str) -> VaultResult<Store> {
        Ok(self.registry.by_name(name)?)
    }

    pub fn stores(&self) -> VaultResult<Vec<Store>> {
        Ok(self.registry.list()?)
    }

    pub fn activate_store(&self, id: StoreId) -> VaultResult<Store> {
        Ok(self.registry.activate(id)?)
    }

    /// Stop accepting writes to a store. Its content stays readable.
    pub fn deactivate_store(&self, id: StoreId) -> VaultResult<Store> {
        Ok(self.registry.deactivate(id)?)
    }

    /// Unregister a store that no content record references. Uploads into
    /// the store wait until the check is done.
    pub fn remove_store(&self, id: StoreId) -> VaultResult<()> {
        if self.default_target == StorageTarget::Store(id) {
            return Err(VaultError::Config(
                "the default store cannot be removed".into(),
            ));
        }
        Ok(self.content.remove_store(id)?)
    }

    /// Files under a store root that no content record references.
    pub fn orphaned_files(&self, id: StoreId) -> VaultResult<Vec<String>> {
        Ok(self.content.orphaned_files(id)?)
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("default_target", &self.default_target)
            .field("transformers", &self.transformers)
            .finish_non_exhaustive()
    }
}

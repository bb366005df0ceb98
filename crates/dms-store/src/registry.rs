//! The [`StoreRegistry`] trait and its in-memory implementation.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;
use dms_types::StoreId;
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::store::{Store, StoreStatus};

/// Registry of file-backed stores.
///
/// Implementations must be thread-safe. Store names are unique. A store that
/// is still referenced by content can be deactivated but not removed.
pub trait StoreRegistry: Send + Sync {
    /// Register a new active store rooted at `root`.
    fn register(&self, name: &str, root: &Path) -> StoreResult<Store>;

    /// Look up a store by id.
    fn get(&self, id: StoreId) -> StoreResult<Store>;

    /// Look up a store by name.
    fn by_name(&self, name: &str) -> StoreResult<Store>;

    /// All registered stores, sorted by name.
    fn list(&self) -> StoreResult<Vec<Store>>;

    /// Change the status of a store.
    fn set_status(&self, id: StoreId, status: StoreStatus) -> StoreResult<Store>;

    /// Remove a store. `references` is the number of content records that
    /// still point into it; a non-zero count is refused.
    fn remove(&self, id: StoreId, references: usize) -> StoreResult<()>;

    /// Registered stores that accept writes.
    fn list_active(&self) -> StoreResult<Vec<Store>> {
        Ok(self.list()?.into_iter().filter(Store::is_active).collect())
    }

    /// Re-activate a store.
    fn activate(&self, id: StoreId) -> StoreResult<Store> {
        self.set_status(id, StoreStatus::Active)
    }

    /// Stop accepting writes to a store. Existing content stays readable.
    fn deactivate(&self, id: StoreId) -> StoreResult<Store> {
        self.set_status(id, StoreStatus::Inactive)
    }
}

/// In-memory store registry.
///
/// Root directories are validated on registration and on activation: the
/// root must be (or become) a writable directory.
#[derive(Debug)]
pub struct InMemoryStoreRegistry {
    stores: RwLock<HashMap<StoreId, Store>>,
    create_missing_roots: bool,
}

impl InMemoryStoreRegistry {
    /// Create an empty registry that creates missing root directories.
    pub fn new() -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            create_missing_roots: true,
        }
    }

    /// Whether missing root directories are created on registration.
    pub fn with_create_missing_roots(mut self, create: bool) -> Self {
        self.create_missing_roots = create;
        self
    }

    fn validate_root(&self, root: &Path) -> StoreResult<()> {
        if root.as_os_str().is_empty() {
            return Err(StoreError::InvalidStore("root path cannot be empty".into()));
        }
        if !root.exists() {
            if !self.create_missing_roots {
                return Err(StoreError::InvalidStore(format!(
                    "root path does not exist: {}",
                    root.display()
                )));
            }
            fs::create_dir_all(root)?;
        }
        if !root.is_dir() {
            return Err(StoreError::InvalidStore(format!(
                "root path is not a directory: {}",
                root.display()
            )));
        }
        // Probe writability with a throwaway file.
        tempfile::NamedTempFile::new_in(root).map_err(|e| {
            StoreError::InvalidStore(format!("root path is not writable: {}: {e}", root.display()))
        })?;
        Ok(())
    }
}

impl Default for InMemoryStoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::LockPoisoned(e.to_string())
}

impl StoreRegistry for InMemoryStoreRegistry {
    fn register(&self, name: &str, root: &Path) -> StoreResult<Store> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidStore("name cannot be empty".into()));
        }
        // Duplicate names are reported before touching the filesystem.
        {
            let stores = self.stores.read().map_err(poisoned)?;
            if stores.values().any(|s| s.name == name) {
                return Err(StoreError::DuplicateName(name.to_string()));
            }
        }
        self.validate_root(root)?;

        let store = Store::new(name, PathBuf::from(root));
        let mut stores = self.stores.write().map_err(poisoned)?;
        if stores.values().any(|s| s.name == name) {
            return Err(StoreError::DuplicateName(name.to_string()));
        }
        stores.insert(store.id, store.clone());
        info!(store = %store.name, root = %store.root.display(), "registered store");
        Ok(store)
    }

    fn get(&self, id: StoreId) -> StoreResult<Store> {
        let stores = self.stores.read().map_err(poisoned)?;
        stores.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    fn by_name(&self, name: &str) -> StoreResult<Store> {
        let stores = self.stores.read().map_err(poisoned)?;
        stores
            .values()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| StoreError::NameNotFound(name.to_string()))
    }

    fn list(&self) -> StoreResult<Vec<Store>> {
        let stores = self.stores.read().map_err(poisoned)?;
        let mut all: Vec<Store> = stores.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    fn set_status(&self, id: StoreId, status: StoreStatus) -> StoreResult<Store> {
        if status == StoreStatus::Active {
            let root = self.get(id)?.root;
            self.validate_root(&root)?;
        }
        let mut stores = self.stores.write().map_err(poisoned)?;
        let store = stores.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        store.status = status;
        store.modified_at = Utc::now();
        info!(store = %store.name, %status, "store status changed");
        Ok(store.clone())
    }

    fn remove(&self, id: StoreId, references: usize) -> StoreResult<()> {
        let mut stores = self.stores.write().map_err(poisoned)?;
        if !stores.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        if references > 0 {
            return Err(StoreError::InUse { id, references });
        }
        if let Some(store) = stores.remove(&id) {
            info!(store = %store.name, "removed store");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn register_and_lookup() {
        let dir = TempDir::new().unwrap();
        let registry = InMemoryStoreRegistry::new();
        let store = registry.register("primary", dir.path()).unwrap();

        assert!(store.is_active());
        assert_eq!(registry.get(store.id).unwrap(), store);
        assert_eq!(registry.by_name("primary").unwrap().id, store.id);
    }

    #[test]
    fn register_creates_missing_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested/root");
        let registry = InMemoryStoreRegistry::new();
        registry.register("nested", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn register_refuses_missing_root_when_not_creating() {
        let dir = TempDir::new().unwrap();
        let registry = InMemoryStoreRegistry::new().with_create_missing_roots(false);
        let err = registry
            .register("missing", &dir.path().join("absent"))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidStore(_)));
    }

    #[test]
    fn register_refuses_file_root() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain-file");
        std::fs::write(&file, b"x").unwrap();
        let registry = InMemoryStoreRegistry::new();
        assert!(matches!(
            registry.register("file", &file).unwrap_err(),
            StoreError::InvalidStore(_)
        ));
    }

    #[test]
    fn duplicate_names_conflict() {
        let dir = TempDir::new().unwrap();
        let registry = InMemoryStoreRegistry::new();
        registry.register("primary", dir.path()).unwrap();
        let err = registry.register("primary", dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateName(_)));
        assert_eq!(err.kind(), dms_types::ErrorKind::Conflict);
    }

    #[test]
    fn empty_name_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = InMemoryStoreRegistry::new();
        assert!(registry.register("  ", dir.path()).is_err());
    }

    #[test]
    fn deactivate_and_activate() {
        let dir = TempDir::new().unwrap();
        let registry = InMemoryStoreRegistry::new();
        let store = registry.register("primary", dir.path()).unwrap();

        let inactive = registry.deactivate(store.id).unwrap();
        assert!(!inactive.is_active());
        assert!(registry.list_active().unwrap().is_empty());

        let active = registry.activate(store.id).unwrap();
        assert!(active.is_active());
        assert_eq!(registry.list_active().unwrap().len(), 1);
    }

    #[test]
    fn list_is_sorted_by_name() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let registry = InMemoryStoreRegistry::new();
        registry.register("zeta", a.path()).unwrap();
        registry.register("alpha", b.path()).unwrap();
        let names: Vec<String> = registry.list().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn remove_refuses_referenced_store() {
        let dir = TempDir::new().unwrap();
        let registry = InMemoryStoreRegistry::new();
        let store = registry.register("primary", dir.path()).unwrap();

        let err = registry.remove(store.id, 3).unwrap_err();
        assert!(matches!(err, StoreError::InUse { references: 3, .. }));

        registry.remove(store.id, 0).unwrap();
        assert!(matches!(
            registry.get(store.id).unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn unknown_store_is_not_found() {
        let registry = InMemoryStoreRegistry::new();
        let err = registry.get(StoreId::new()).unwrap_err();
        assert_eq!(err.kind(), dms_types::ErrorKind::NotFound);
    }
}

//! Byte I/O for both storage modes.

use std::fmt;
use std::sync::Arc;

use dms_catalog::StorageLocation;
use dms_store::{allocate_path, FileBlobs, Store, StoreRegistry};
use dms_types::StoreId;
use tracing::debug;

use crate::error::ContentResult;

/// Where newly uploaded bytes should go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageTarget {
    Inline,
    Store(StoreId),
}

/// Reads and writes content bytes for a [`StorageLocation`].
///
/// Inline bytes are owned by the location itself. File-backed bytes live at
/// `store.root/path`. Inactive stores stay readable; every write checks that
/// the store is active first.
pub struct StorageBackend {
    registry: Arc<dyn StoreRegistry>,
    prune_empty_dirs: bool,
}

impl StorageBackend {
    pub fn new(registry: Arc<dyn StoreRegistry>) -> Self {
        Self {
            registry,
            prune_empty_dirs: true,
        }
    }

    /// Whether empty directories are pruned after a file is removed.
    pub fn with_prune_empty_dirs(mut self, prune: bool) -> Self {
        self.prune_empty_dirs = prune;
        self
    }

    pub fn registry(&self) -> &Arc<dyn StoreRegistry> {
        &self.registry
    }

    /// Look up a registered store.
    pub fn store(&self, id: StoreId) -> ContentResult<Store> {
        Ok(self.registry.get(id)?)
    }

    fn blobs(&self, store: &Store) -> FileBlobs {
        FileBlobs::for_store(store).with_prune_empty_dirs(self.prune_empty_dirs)
    }

    fn active_blobs(&self, id: StoreId) -> ContentResult<FileBlobs> {
        let store = self.store(id)?;
        store.ensure_active()?;
        Ok(self.blobs(&store))
    }

    /// Read all bytes at a location.
    pub fn read(&self, location: &StorageLocation) -> ContentResult<Vec<u8>> {
        match location {
            StorageLocation::Inline { bytes } => Ok(bytes.clone()),
            StorageLocation::File { store_id, path } => {
                let store = self.store(*store_id)?;
                Ok(self.blobs(&store).read(path)?)
            }
        }
    }

    /// Size in bytes, derived from the stored bytes.
    pub fn size(&self, location: &StorageLocation) -> ContentResult<u64> {
        match location {
            StorageLocation::Inline { bytes } => Ok(bytes.len() as u64),
            StorageLocation::File { store_id, path } => {
                let store = self.store(*store_id)?;
                Ok(self.blobs(&store).size(path)?)
            }
        }
    }

    /// Store bytes at a location nothing else references yet.
    ///
    /// For a store target a fresh path is allocated from `name`.
    pub fn write_fresh(
        &self,
        target: StorageTarget,
        name: &str,
        bytes: &[u8],
    ) -> ContentResult<StorageLocation> {
        match target {
            StorageTarget::Inline => Ok(StorageLocation::inline(bytes.to_vec())),
            StorageTarget::Store(store_id) => {
                let blobs = self.active_blobs(store_id)?;
                let path = allocate_path(name);
                blobs.write(&path, bytes)?;
                debug!(store = %store_id, %path, len = bytes.len(), "wrote new file");
                Ok(StorageLocation::file(store_id, path))
            }
        }
    }

    /// Overwrite an existing file. The caller holds the path lock and has
    /// checked that no other record references the path.
    pub fn overwrite(&self, store_id: StoreId, path: &str, bytes: &[u8]) -> ContentResult<()> {
        let blobs = self.active_blobs(store_id)?;
        blobs.write(path, bytes)?;
        debug!(store = %store_id, %path, len = bytes.len(), "overwrote file");
        Ok(())
    }

    /// Remove a file. Returns `true` if it existed.
    pub fn remove_file(&self, store_id: StoreId, path: &str) -> ContentResult<bool> {
        let store = self.store(store_id)?;
        Ok(self.blobs(&store).delete(path)?)
    }

    /// Relative paths of every file under a store root.
    pub fn list_files(&self, store_id: StoreId) -> ContentResult<Vec<String>> {
        let store = self.store(store_id)?;
        Ok(self.blobs(&store).list_files()?)
    }
}

impl fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageBackend")
            .field("prune_empty_dirs", &self.prune_empty_dirs)
            .finish_non_exhaustive()
    }
}

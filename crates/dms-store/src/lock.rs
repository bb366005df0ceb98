//! Mutual exclusion keyed by `(store, relative path)`.
//!
//! Copy-on-write decisions ("is this path shared? then fork, else write in
//! place") and reference-counted deletes are check-then-act sequences. They
//! must not interleave with another writer, deleter, or clone touching the
//! same file. [`PathLocks`] hands out RAII guards for one or more keys;
//! dropping the guard releases every key it holds, on every exit path.
//!
//! Removing a store is a check-then-act sequence over the whole store:
//! count the records that reference it, then unregister it. [`StoreGate`]
//! keeps new references from appearing in between.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Condvar, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dms_types::StoreId;
use tracing::trace;

use crate::error::{StoreError, StoreResult};

/// Lock key: one file inside one store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey {
    pub store: StoreId,
    pub path: String,
}

impl PathKey {
    pub fn new(store: StoreId, path: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.store.short_id(), self.path)
    }
}

/// Table of held path keys.
///
/// A key is either held by exactly one guard or absent from the table.
/// Acquiring a set of keys is all-at-once: the caller waits until none of
/// them is held, then takes all of them together, so two callers locking
/// overlapping sets can never deadlock. Locks are not reentrant.
#[derive(Default)]
pub struct PathLocks {
    held: Mutex<HashSet<PathKey>>,
    released: Condvar,
}

impl PathLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock a single `(store, path)` key.
    pub fn lock(&self, store: StoreId, path: &str) -> StoreResult<PathGuard<'_>> {
        self.lock_many(vec![PathKey::new(store, path)])
    }

    /// Lock every key in `keys` at once. Duplicates are collapsed.
    pub fn lock_many(&self, keys: impl IntoIterator<Item = PathKey>) -> StoreResult<PathGuard<'_>> {
        let mut keys: Vec<PathKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut held = self
            .held
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        while keys.iter().any(|k| held.contains(k)) {
            held = self
                .released
                .wait(held)
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        }
        for key in &keys {
            held.insert(key.clone());
        }
        trace!(count = keys.len(), "path locks acquired");

        Ok(PathGuard { locks: self, keys })
    }

    /// Number of keys currently held.
    pub fn held_count(&self) -> usize {
        self.held.lock().map(|h| h.len()).unwrap_or(0)
    }

    fn release(&self, keys: &[PathKey]) {
        if keys.is_empty() {
            return;
        }
        // A poisoned table still has to give its keys back, otherwise a
        // panicking writer would wedge every later writer of the same path.
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        for key in keys {
            held.remove(key);
        }
        drop(held);
        self.released.notify_all();
        trace!(count = keys.len(), "path locks released");
    }
}

impl fmt::Debug for PathLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathLocks")
            .field("held", &self.held_count())
            .finish()
    }
}

/// Guard over one or more path keys. Releases them on drop.
#[must_use = "the path is unlocked as soon as the guard is dropped"]
pub struct PathGuard<'a> {
    locks: &'a PathLocks,
    keys: Vec<PathKey>,
}

impl PathGuard<'_> {
    /// Keys held by this guard, sorted.
    pub fn keys(&self) -> &[PathKey] {
        &self.keys
    }
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.keys);
    }
}

impl fmt::Debug for PathGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathGuard").field("keys", &self.keys).finish()
    }
}

/// Shared/exclusive gate over store membership.
///
/// Anything that adds a reference to a store (an upload, a rendition, a
/// move into a store) holds it shared from the moment the store is checked
/// until the record is in the catalog. Retiring a store holds it
/// exclusively. Never acquire it twice on one thread.
#[derive(Debug, Default)]
pub struct StoreGate {
    inner: RwLock<()>,
}

impl StoreGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Held while a new store reference is being created.
    pub fn placing(&self) -> StoreResult<RwLockReadGuard<'_, ()>> {
        self.inner
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    /// Held while a store is counted and removed.
    pub fn retiring(&self) -> StoreResult<RwLockWriteGuard<'_, ()>> {
        self.inner
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

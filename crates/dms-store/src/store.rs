use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use dms_types::StoreId;

use crate::error::{StoreError, StoreResult};
use crate::path::validate_relative_path;

/// Whether a store accepts new writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// A named filesystem root under which file-backed content lives.
///
/// Content records address their bytes by a path relative to `root`.
/// Inactive stores remain readable; only writes are refused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub root: PathBuf,
    pub status: StoreStatus,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Store {
    /// Create an active store definition with a fresh id.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            id: StoreId::new(),
            name: name.into(),
            root: root.into(),
            status: StoreStatus::Active,
            created_at: now,
            modified_at: now,
        }
    }

    /// Returns `true` if the store accepts writes.
    pub fn is_active(&self) -> bool {
        self.status == StoreStatus::Active
    }

    /// Fail with [`StoreError::Inactive`] unless the store accepts writes.
    pub fn ensure_active(&self) -> StoreResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(StoreError::Inactive(self.name.clone()))
        }
    }

    /// Absolute location of a relative storage path inside this store.
    pub fn full_path(&self, relative: &str) -> StoreResult<PathBuf> {
        validate_relative_path(relative)?;
        Ok(self.root.join(relative))
    }

    /// The store root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

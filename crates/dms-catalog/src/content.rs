//! Content records and where their bytes live.

use chrono::{DateTime, Utc};
use dms_types::{ContentId, ObjectId, StoreId};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

/// Where a content record's bytes are held.
///
/// Exactly one storage mode exists per record. Size is always derived from
/// the bytes, never stored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StorageLocation {
    /// Bytes owned by the record itself.
    Inline { bytes: Vec<u8> },
    /// Bytes at `path` relative to the root of store `store_id`.
    File { store_id: StoreId, path: String },
}

impl StorageLocation {
    pub fn inline(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Inline {
            bytes: bytes.into(),
        }
    }

    pub fn file(store_id: StoreId, path: impl Into<String>) -> Self {
        Self::File {
            store_id,
            path: path.into(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File { .. })
    }

    /// `(store, path)` for file-backed locations.
    pub fn file_ref(&self) -> Option<(StoreId, &str)> {
        match self {
            Self::File { store_id, path } => Some((*store_id, path.as_str())),
            Self::Inline { .. } => None,
        }
    }

    /// Rebuild a location from its relational row shape.
    ///
    /// Rows with both modes populated, or with neither, are rejected.
    pub fn from_columns(columns: StoredColumns) -> CatalogResult<Self> {
        match columns {
            StoredColumns {
                store_id: Some(store_id),
                storage_path: Some(path),
                inline_bytes: None,
            } => Ok(Self::File { store_id, path }),
            StoredColumns {
                store_id: None,
                storage_path: None,
                inline_bytes: Some(bytes),
            } => Ok(Self::Inline { bytes }),
            StoredColumns {
                store_id: None,
                storage_path: None,
                inline_bytes: None,
            } => Err(CatalogError::InvalidStorage(
                "record has no storage mode".into(),
            )),
            StoredColumns {
                inline_bytes: Some(_),
                ..
            } => Err(CatalogError::InvalidStorage(
                "record has both inline bytes and a file reference".into(),
            )),
            _ => Err(CatalogError::InvalidStorage(
                "file reference needs both a store and a path".into(),
            )),
        }
    }

    /// The relational row shape of this location.
    pub fn to_columns(&self) -> StoredColumns {
        match self {
            Self::Inline { bytes } => StoredColumns {
                store_id: None,
                storage_path: None,
                inline_bytes: Some(bytes.clone()),
            },
            Self::File { store_id, path } => StoredColumns {
                store_id: Some(*store_id),
                storage_path: Some(path.clone()),
                inline_bytes: None,
            },
        }
    }
}

impl std::fmt::Debug for StorageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline { bytes } => write!(f, "Inline({} bytes)", bytes.len()),
            Self::File { store_id, path } => write!(f, "File({}:{path})", store_id.short_id()),
        }
    }
}

/// Nullable storage columns as a relational table would hold them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredColumns {
    pub store_id: Option<StoreId>,
    pub storage_path: Option<String>,
    pub inline_bytes: Option<Vec<u8>>,
}

/// One blob plus metadata, owned by exactly one versioned object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: ContentId,
    pub name: String,
    pub content_type: Option<String>,
    pub object_id: ObjectId,
    pub is_primary: bool,
    /// For secondary renditions, the record this one was derived from.
    pub parent_rendition: Option<ContentId>,
    pub indexable: bool,
    pub storage: StorageLocation,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl ContentRecord {
    /// A new primary record with a fresh id.
    pub fn new(
        object_id: ObjectId,
        name: impl Into<String>,
        content_type: Option<String>,
        storage: StorageLocation,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ContentId::new(),
            name: name.into(),
            content_type,
            object_id,
            is_primary: true,
            parent_rendition: None,
            indexable: false,
            storage,
            created_at: now,
            modified_at: now,
        }
    }

    /// A new secondary rendition derived from `source`, owned by the same
    /// object.
    pub fn rendition_of(
        source: &ContentRecord,
        name: impl Into<String>,
        content_type: Option<String>,
        indexable: bool,
        storage: StorageLocation,
    ) -> Self {
        let mut record = Self::new(source.object_id, name, content_type, storage);
        record.is_primary = false;
        record.parent_rendition = Some(source.id);
        record.indexable = indexable;
        record
    }

    /// Returns `true` if this record was derived from another record.
    pub fn is_secondary(&self) -> bool {
        !self.is_primary && self.parent_rendition.is_some()
    }

    pub fn is_file_backed(&self) -> bool {
        self.storage.is_file()
    }

    /// Record the current time as the last modification.
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

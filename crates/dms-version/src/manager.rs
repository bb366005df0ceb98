//! Major/minor branching.
//!
//! A branch is built in two steps. [`VersionManager::prepare_branch`] reads
//! the source and produces a [`BranchPlan`] without touching anything.
//! Committing the plan holds the path lock of every file the clones alias,
//! re-checks that the source content has not moved, and then persists the
//! new object with all of its clones as one catalog change.

use std::sync::Arc;

use dms_catalog::{Catalog, ContentRecord, VersionedObject};
use dms_content::{ContentCloner, ContentService};
use dms_types::{BranchKind, ObjectId};
use tracing::{debug, info};

use crate::error::{VersionError, VersionResult};

/// How often a branch is re-planned when its source content moves between
/// planning and locking.
const MAX_BRANCH_ATTEMPTS: usize = 16;

/// An unpersisted branch: the new object and the clones of the source
/// content.
#[derive(Clone, Debug)]
pub struct BranchPlan {
    pub source: VersionedObject,
    pub object: VersionedObject,
    pub contents: Vec<ContentRecord>,
    source_contents: Vec<ContentRecord>,
}

impl BranchPlan {
    /// Id the new version will be persisted under.
    pub fn object_id(&self) -> Option<ObjectId> {
        self.object.id
    }

    /// The source records the clones were made from, in the same order.
    pub fn source_contents(&self) -> &[ContentRecord] {
        &self.source_contents
    }
}

/// Creates and removes versions.
pub struct VersionManager {
    catalog: Arc<dyn Catalog>,
    content: Arc<ContentService>,
}

impl VersionManager {
    pub fn new(catalog: Arc<dyn Catalog>, content: Arc<ContentService>) -> Self {
        Self { catalog, content }
    }

    /// Plan a branch of `object_id` without persisting anything.
    pub fn prepare_branch(&self, object_id: ObjectId, kind: BranchKind) -> VersionResult<BranchPlan> {
        let source = self.catalog.get_object(object_id)?;
        let next = kind.apply(source.version);
        let new_id = ObjectId::new();
        let object = source.branch_to(new_id, object_id, next);
        let source_contents = self.catalog.contents_of(object_id)?;
        let contents = ContentCloner::clone_all(&source_contents, new_id);
        Ok(BranchPlan {
            source,
            object,
            contents,
            source_contents,
        })
    }

    /// `(major + 1).0` from `object_id`.
    pub fn create_major_version(&self, object_id: ObjectId) -> VersionResult<VersionedObject> {
        self.branch(object_id, BranchKind::Major)
    }

    /// `major.(minor + 1)` from `object_id`.
    pub fn create_minor_version(&self, object_id: ObjectId) -> VersionResult<VersionedObject> {
        self.branch(object_id, BranchKind::Minor)
    }

    /// Branch `object_id`. Any version can be branched, not only the latest.
    ///
    /// Either the new object and every cloned record become visible, or
    /// nothing does.
    pub fn branch(&self, object_id: ObjectId, kind: BranchKind) -> VersionResult<VersionedObject> {
        for attempt in 1..=MAX_BRANCH_ATTEMPTS {
            let plan = self.prepare_branch(object_id, kind)?;
            let _guard = self.content.lock_paths(plan.source_contents())?;

            if !self.sources_unchanged(object_id, plan.source_contents())? {
                debug!(object = %object_id, attempt, "source content moved; re-planning branch");
                continue;
            }

            let count = plan.contents.len();
            let created = self.catalog.commit_branch(plan.object, plan.contents)?;
            info!(
                source = %object_id,
                object = ?created.id,
                version = %created.version,
                %kind,
                contents = count,
                "created version"
            );
            return Ok(created);
        }
        Err(VersionError::Contended(object_id))
    }

    /// The caller holds the path locks of `planned`.
    fn sources_unchanged(
        &self,
        object_id: ObjectId,
        planned: &[ContentRecord],
    ) -> VersionResult<bool> {
        let current = self.catalog.contents_of(object_id)?;
        Ok(current.len() == planned.len()
            && current
                .iter()
                .zip(planned)
                .all(|(now, then)| now.id == then.id && now.storage.file_ref() == then.storage.file_ref()))
    }

    /// Remove a version that has no child versions, releasing its content.
    ///
    /// Files still shared with other versions are kept.
    pub fn delete_version(&self, object_id: ObjectId) -> VersionResult<Vec<ContentRecord>> {
        let removed = self.catalog.delete_object(object_id)?;
        self.content.release_storage(&removed)?;
        info!(object = %object_id, contents = removed.len(), "deleted version");
        Ok(removed)
    }
}

impl std::fmt::Debug for VersionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionManager").finish_non_exhaustive()
    }
}

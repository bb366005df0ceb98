//! Read-only queries over version trees.

use std::collections::HashSet;
use std::sync::Arc;

use dms_catalog::{Catalog, VersionedObject};
use dms_types::{ObjectId, Version};

use crate::error::{VersionError, VersionResult};

/// Answers questions about version chains.
///
/// A version is *latest* when no other object names it as parent. A tree
/// can have several latest versions when a non-latest version was branched.
pub struct VersionQuery {
    catalog: Arc<dyn Catalog>,
}

impl VersionQuery {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Returns `true` if no version was branched from `id`.
    pub fn is_latest(&self, id: ObjectId) -> VersionResult<bool> {
        self.catalog.get_object(id)?;
        Ok(!self.catalog.has_children(id)?)
    }

    /// `id` followed by its ancestors up to the root.
    ///
    /// Versions branched from `id` are not included. A missing parent or a
    /// loop in the parent links is reported instead of followed.
    pub fn history(&self, id: ObjectId) -> VersionResult<Vec<VersionedObject>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.catalog.get_object(id)?;
        loop {
            let current_id = current.id.unwrap_or(id);
            if !seen.insert(current_id) {
                return Err(VersionError::Cycle(id));
            }
            let parent = current.parent_version;
            chain.push(current);
            let Some(parent_id) = parent else {
                return Ok(chain);
            };
            current = match self.catalog.get_object(parent_id) {
                Ok(parent) => parent,
                Err(dms_catalog::CatalogError::ObjectNotFound(_)) => {
                    return Err(VersionError::BrokenChain {
                        id: current_id,
                        missing: parent_id,
                    });
                }
                Err(e) => return Err(e.into()),
            };
        }
    }

    /// Every version named `name`, newest version first.
    pub fn all_versions_by_name(&self, name: &str) -> VersionResult<Vec<VersionedObject>> {
        Ok(self.catalog.objects_by_name(name)?)
    }

    /// Every latest version in the catalog.
    pub fn latest_versions(&self) -> VersionResult<Vec<VersionedObject>> {
        let all = self.catalog.all_objects()?;
        let parents: HashSet<ObjectId> = all.iter().filter_map(|o| o.parent_version).collect();
        Ok(all
            .into_iter()
            .filter(|o| o.id.is_some_and(|id| !parents.contains(&id)))
            .collect())
    }

    /// Latest versions named `name`, newest version first.
    pub fn latest_by_name(&self, name: &str) -> VersionResult<Vec<VersionedObject>> {
        let versions = self.catalog.objects_by_name(name)?;
        let parents: HashSet<ObjectId> =
            versions.iter().filter_map(|o| o.parent_version).collect();
        Ok(versions
            .into_iter()
            .filter(|o| o.id.is_some_and(|id| !parents.contains(&id)))
            .collect())
    }

    /// Versions branched directly from `id`.
    pub fn children(&self, id: ObjectId) -> VersionResult<Vec<VersionedObject>> {
        self.catalog.get_object(id)?;
        Ok(self.catalog.children_of(id)?)
    }

    /// The most recently created object with this name and version.
    pub fn find_by_name_and_version(
        &self,
        name: &str,
        version: Version,
    ) -> VersionResult<Option<VersionedObject>> {
        Ok(self
            .catalog
            .objects_by_name(name)?
            .into_iter()
            .find(|o| o.version == version))
    }
}

impl std::fmt::Debug for VersionQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionQuery").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use dms_catalog::{CatalogError, CatalogResult, ContentRecord, InMemoryCatalog, ObjectKind};
    use dms_types::{ContentId, ErrorKind, StoreId};

    fn ids(objects: &[VersionedObject]) -> Vec<ObjectId> {
        objects.iter().filter_map(|o| o.id).collect()
    }

    #[test]
    fn latest_detection() {
        let fx = Fixture::new();
        let v1 = fx.object("doc", ObjectKind::Base);
        assert!(fx.query.is_latest(v1).unwrap());

        let v2 = fx.versions.create_major_version(v1).unwrap().id.unwrap();
        assert!(!fx.query.is_latest(v1).unwrap());
        assert!(fx.query.is_latest(v2).unwrap());
    }

    #[test]
    fn is_latest_unknown_is_not_found() {
        let fx = Fixture::new();
        let err = fx.query.is_latest(ObjectId::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn history_is_newest_first() {
        let fx = Fixture::new();
        let v1 = fx.object("doc", ObjectKind::Base);
        let v2 = fx.versions.create_major_version(v1).unwrap().id.unwrap();
        let v3 = fx.versions.create_major_version(v2).unwrap().id.unwrap();

        assert_eq!(ids(&fx.query.history(v3).unwrap()), vec![v3, v2, v1]);
        assert_eq!(ids(&fx.query.history(v2).unwrap()), vec![v2, v1]);
        assert_eq!(ids(&fx.query.history(v1).unwrap()), vec![v1]);
    }

    /// Delegates to an in-memory catalog but lies about parent links.
    struct Tampered {
        inner: InMemoryCatalog,
        hidden: Option<ObjectId>,
        reparent: Option<(ObjectId, ObjectId)>,
    }

    impl Catalog for Tampered {
        fn insert_object(&self, object: VersionedObject) -> CatalogResult<VersionedObject> {
            self.inner.insert_object(object)
        }
        fn get_object(&self, id: ObjectId) -> CatalogResult<VersionedObject> {
            if self.hidden == Some(id) {
                return Err(CatalogError::ObjectNotFound(id));
            }
            let mut object = self.inner.get_object(id)?;
            if let Some((child, parent)) = self.reparent {
                if child == id {
                    object.parent_version = Some(parent);
                }
            }
            Ok(object)
        }
        fn update_object(&self, object: &VersionedObject) -> CatalogResult<VersionedObject> {
            self.inner.update_object(object)
        }
        fn all_objects(&self) -> CatalogResult<Vec<VersionedObject>> {
            self.inner.all_objects()
        }
        fn children_of(&self, id: ObjectId) -> CatalogResult<Vec<VersionedObject>> {
            self.inner.children_of(id)
        }
        fn objects_by_name(&self, name: &str) -> CatalogResult<Vec<VersionedObject>> {
            self.inner.objects_by_name(name)
        }
        fn delete_object(&self, id: ObjectId) -> CatalogResult<Vec<ContentRecord>> {
            self.inner.delete_object(id)
        }
        fn commit_branch(
            &self,
            object: VersionedObject,
            contents: Vec<ContentRecord>,
        ) -> CatalogResult<VersionedObject> {
            self.inner.commit_branch(object, contents)
        }
        fn insert_content(&self, record: ContentRecord) -> CatalogResult<ContentRecord> {
            self.inner.insert_content(record)
        }
        fn get_content(&self, id: ContentId) -> CatalogResult<ContentRecord> {
            self.inner.get_content(id)
        }
        fn update_content(&self, record: &ContentRecord) -> CatalogResult<()> {
            self.inner.update_content(record)
        }
        fn delete_content(&self, id: ContentId) -> CatalogResult<ContentRecord> {
            self.inner.delete_content(id)
        }
        fn contents_of(&self, object_id: ObjectId) -> CatalogResult<Vec<ContentRecord>> {
            self.inner.contents_of(object_id)
        }
        fn renditions_of(&self, content_id: ContentId) -> CatalogResult<Vec<ContentRecord>> {
            self.inner.renditions_of(content_id)
        }
        fn contents_in_store(&self, store_id: StoreId) -> CatalogResult<Vec<ContentRecord>> {
            self.inner.contents_in_store(store_id)
        }
    }

    /// A three-version chain v1 <- v2 <- v3 in a fresh catalog.
    fn chain() -> (InMemoryCatalog, [ObjectId; 3]) {
        let catalog = InMemoryCatalog::new();
        let v1 = catalog
            .insert_object(VersionedObject::new("doc", ObjectKind::Base))
            .unwrap();
        let v1_id = v1.id.unwrap();
        let v2 = catalog
            .insert_object(v1.branch_to(ObjectId::new(), v1_id, v1.version.next_major()))
            .unwrap();
        let v2_id = v2.id.unwrap();
        let v3 = catalog
            .insert_object(v2.branch_to(ObjectId::new(), v2_id, v2.version.next_major()))
            .unwrap();
        (catalog, [v1_id, v2_id, v3.id.unwrap()])
    }

    #[test]
    fn history_reports_a_missing_parent() {
        let (inner, [v1, v2, v3]) = chain();
        let query = VersionQuery::new(Arc::new(Tampered {
            inner,
            hidden: Some(v1),
            reparent: None,
        }));
        let err = query.history(v3).unwrap_err();
        assert!(matches!(err, VersionError::BrokenChain { id, missing } if id == v2 && missing == v1));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn history_reports_a_cycle() {
        let (inner, [v1, _, v3]) = chain();
        let query = VersionQuery::new(Arc::new(Tampered {
            inner,
            hidden: None,
            reparent: Some((v1, v3)),
        }));
        let err = query.history(v3).unwrap_err();
        assert!(matches!(err, VersionError::Cycle(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn latest_versions_are_the_leaves() {
        let fx = Fixture::new();
        let v1 = fx.object("doc", ObjectKind::Base);
        let a = fx.versions.create_major_version(v1).unwrap().id.unwrap();
        let b = fx.versions.create_minor_version(v1).unwrap().id.unwrap();
        let other = fx.object("other", ObjectKind::Base);

        let mut latest = ids(&fx.query.latest_versions().unwrap());
        latest.sort();
        let mut expected = vec![a, b, other];
        expected.sort();
        assert_eq!(latest, expected);

        assert_eq!(ids(&fx.query.latest_by_name("doc").unwrap()), vec![a, b]);
        assert_eq!(ids(&fx.query.children(v1).unwrap()), vec![a, b]);
    }

    #[test]
    fn versions_by_name_newest_first() {
        let fx = Fixture::new();
        let v1 = fx.object("doc", ObjectKind::Base);
        let v1_1 = fx.versions.create_minor_version(v1).unwrap();
        let v2 = fx.versions.create_major_version(v1_1.id.unwrap()).unwrap();

        let versions: Vec<String> = fx
            .query
            .all_versions_by_name("doc")
            .unwrap()
            .iter()
            .map(|o| o.version.to_string())
            .collect();
        assert_eq!(versions, vec!["2.0", "1.1", "1.0"]);
        assert_eq!(
            fx.query
                .find_by_name_and_version("doc", v2.version)
                .unwrap()
                .and_then(|o| o.id),
            v2.id
        );
        assert!(fx
            .query
            .find_by_name_and_version("doc", Version::new(9, 0).unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn duplicate_name_and_version_returns_most_recent() {
        let fx = Fixture::new();
        let v1 = fx.object("doc", ObjectKind::Base);
        fx.versions.create_major_version(v1).unwrap();
        let second = fx.versions.create_major_version(v1).unwrap();
        let found = fx
            .query
            .find_by_name_and_version("doc", Version::new(2, 0).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(found.id, second.id);
    }
}

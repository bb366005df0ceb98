//! Versioned objects and their per-kind attributes.
//!
//! A [`VersionedObject`] is one version of a logical item. Branching never
//! edits an object; it produces a new object whose `parent_version` points at
//! the source. The attributes that travel to the new version are decided by
//! [`ObjectKind::branch_copy`], one arm per kind.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use dms_types::{ObjectId, Version};
use serde::{Deserialize, Serialize};

/// One version of a logical item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionedObject {
    /// Absent until the object is persisted.
    pub id: Option<ObjectId>,
    pub name: String,
    pub version: Version,
    /// The version this one was branched from. `None` for a root.
    pub parent_version: Option<ObjectId>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub kind: ObjectKind,
}

impl VersionedObject {
    /// A new root object at version 1.0 with no id yet.
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            version: Version::initial(),
            parent_version: None,
            created_at: now,
            modified_at: now,
            kind,
        }
    }

    /// Build the unpersisted successor of this object.
    ///
    /// The successor gets `id`, the bumped `version`, this object as parent,
    /// fresh timestamps, and a deep copy of the kind attributes.
    pub fn branch_to(&self, id: ObjectId, parent: ObjectId, version: Version) -> Self {
        let now = Utc::now();
        Self {
            id: Some(id),
            name: self.name.clone(),
            version,
            parent_version: Some(parent),
            created_at: now,
            modified_at: now,
            kind: self.kind.branch_copy(version),
        }
    }

    /// Returns `true` if this object is the root of its version tree.
    pub fn is_root(&self) -> bool {
        self.parent_version.is_none()
    }

    /// Short human-readable label, e.g. `report v2.1`.
    pub fn label(&self) -> String {
        format!("{} v{}", self.name, self.version)
    }
}

/// The closed set of object kinds with their attributes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectKind {
    /// A plain versioned object with no extra attributes.
    Base,
    Document(DocumentAttrs),
    Folder(FolderAttrs),
    User(UserAttrs),
}

impl ObjectKind {
    /// Attributes for the version `next` branched from this one.
    ///
    /// Every collection is copied, so the two versions never share a set.
    /// Users get `next`'s version suffix appended to their username and to
    /// the local part of their email, keeping both unique across versions.
    pub fn branch_copy(&self, next: Version) -> ObjectKind {
        match self {
            Self::Base => Self::Base,
            Self::Document(doc) => Self::Document(doc.clone()),
            Self::Folder(folder) => Self::Folder(folder.clone()),
            Self::User(user) => {
                let suffix = next.suffix();
                Self::User(UserAttrs {
                    username: format!("{}{suffix}", user.username),
                    email: suffix_email(&user.email, &suffix),
                    first_name: user.first_name.clone(),
                    last_name: user.last_name.clone(),
                    active: user.active,
                })
            }
        }
    }

    /// Short name of the kind, for logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Document(doc) => doc.details.type_name(),
            Self::Folder(_) => "folder",
            Self::User(_) => "user",
        }
    }
}

fn suffix_email(email: &str, suffix: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => format!("{local}{suffix}@{domain}"),
        None => email.to_string(),
    }
}

/// Attributes shared by every document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentAttrs {
    pub description: Option<String>,
    pub author: Option<String>,
    pub keywords: Option<String>,
    pub tags: BTreeSet<String>,
    pub details: DocumentDetails,
}

impl DocumentAttrs {
    pub fn new(details: DocumentDetails) -> Self {
        Self {
            details,
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

/// Document subtype with its type-specific fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "document_type", rename_all = "snake_case")]
pub enum DocumentDetails {
    #[default]
    Other,
    Article {
        publication_date: Option<NaiveDate>,
        journal: Option<String>,
        volume: Option<String>,
        issue: Option<String>,
        pages: Option<String>,
        doi: Option<String>,
    },
    Report {
        report_date: Option<NaiveDate>,
        report_number: Option<String>,
        department: Option<String>,
        confidentiality_level: Option<String>,
    },
    Contract {
        contract_number: Option<String>,
        effective_date: Option<NaiveDate>,
        expiration_date: Option<NaiveDate>,
        parties: BTreeSet<String>,
        contract_value: Option<f64>,
    },
    Manual {
        manual_version: Option<String>,
        product_name: Option<String>,
        last_review_date: Option<NaiveDate>,
        target_audience: Option<String>,
    },
    Presentation {
        presentation_date: Option<NaiveDate>,
        venue: Option<String>,
        audience: Option<String>,
        duration_minutes: Option<u32>,
    },
    TripReport {
        destination: Option<String>,
        trip_start_date: Option<NaiveDate>,
        trip_end_date: Option<NaiveDate>,
        purpose: Option<String>,
        budget_amount: Option<f64>,
        actual_amount: Option<f64>,
        attendees: BTreeSet<String>,
        summary: Option<String>,
        follow_up_actions: Option<String>,
    },
}

impl DocumentDetails {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Other => "document",
            Self::Article { .. } => "article",
            Self::Report { .. } => "report",
            Self::Contract { .. } => "contract",
            Self::Manual { .. } => "manual",
            Self::Presentation { .. } => "presentation",
            Self::TripReport { .. } => "trip_report",
        }
    }
}

/// Folder attributes.
///
/// Child folders and folder items are relationships, not attributes, and do
/// not travel to a new version.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderAttrs {
    pub path: Option<String>,
    pub description: Option<String>,
    pub is_public: bool,
    pub permissions: BTreeSet<String>,
    pub parent_folder: Option<ObjectId>,
}

/// User account attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAttrs {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub active: bool,
}

impl UserAttrs {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            first_name: None,
            last_name: None,
            active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract() -> ObjectKind {
        ObjectKind::Document(DocumentAttrs {
            description: Some("supply agreement".into()),
            author: Some("legal".into()),
            keywords: None,
            tags: ["signed".to_string()].into_iter().collect(),
            details: DocumentDetails::Contract {
                contract_number: Some("C-42".into()),
                effective_date: NaiveDate::from_ymd_opt(2024, 1, 1),
                expiration_date: None,
                parties: ["acme".to_string(), "globex".to_string()]
                    .into_iter()
                    .collect(),
                contract_value: Some(1200.5),
            },
        })
    }

    #[test]
    fn new_object_starts_at_initial_version() {
        let obj = VersionedObject::new("spec", ObjectKind::Base);
        assert_eq!(obj.version, Version::initial());
        assert!(obj.id.is_none());
        assert!(obj.is_root());
        assert_eq!(obj.label(), "spec v1.0");
    }

    #[test]
    fn branch_copy_preserves_document_attributes() {
        let kind = contract();
        let copy = kind.branch_copy(Version::new(2, 0).unwrap());
        assert_eq!(copy, kind);
    }

    #[test]
    fn branch_copy_collections_are_independent() {
        let kind = contract();
        let mut copy = kind.branch_copy(Version::new(1, 1).unwrap());
        if let ObjectKind::Document(doc) = &mut copy {
            doc.tags.insert("draft".into());
            if let DocumentDetails::Contract { parties, .. } = &mut doc.details {
                parties.insert("initech".into());
            }
        }
        let ObjectKind::Document(original) = &kind else {
            panic!("expected document");
        };
        assert!(!original.tags.contains("draft"));
        let DocumentDetails::Contract { parties, .. } = &original.details else {
            panic!("expected contract");
        };
        assert_eq!(parties.len(), 2);
    }

    #[test]
    fn branch_copy_suffixes_user_identity() {
        let user = ObjectKind::User(UserAttrs::new("ada", "ada@example.org"));
        let copy = user.branch_copy(Version::new(1, 1).unwrap());
        let ObjectKind::User(attrs) = copy else {
            panic!("expected user");
        };
        assert_eq!(attrs.username, "ada_v1.1");
        assert_eq!(attrs.email, "ada_v1.1@example.org");
        assert!(attrs.active);
    }

    #[test]
    fn email_without_at_sign_is_unchanged() {
        assert_eq!(suffix_email("nobody", "_v2.0"), "nobody");
    }

    #[test]
    fn branch_to_links_parent() {
        let mut obj = VersionedObject::new("spec", contract());
        let parent = ObjectId::new();
        obj.id = Some(parent);
        let child_id = ObjectId::new();
        let next = obj.version.next_major();
        let child = obj.branch_to(child_id, parent, next);
        assert_eq!(child.id, Some(child_id));
        assert_eq!(child.parent_version, Some(parent));
        assert_eq!(child.version, next);
        assert_eq!(child.name, obj.name);
        assert_eq!(child.kind, obj.kind);
    }

    #[test]
    fn kind_serde_is_tagged() {
        let json = serde_json::to_value(contract()).unwrap();
        assert_eq!(json["type"], "document");
        assert_eq!(json["details"]["document_type"], "contract");
        let back: ObjectKind = serde_json::from_value(json).unwrap();
        assert_eq!(back, contract());
    }

    #[test]
    fn type_names() {
        assert_eq!(contract().type_name(), "contract");
        assert_eq!(ObjectKind::Folder(FolderAttrs::default()).type_name(), "folder");
    }
}

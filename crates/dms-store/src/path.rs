//! Storage path allocation and validation.

use std::path::{Component, Path};

use crate::error::{StoreError, StoreResult};

/// Allocate a fresh relative storage path for a blob.
///
/// The path is derived from a random UUID split into four two-character
/// directory levels, so no single directory collects more than 256 entries:
///
/// ```text
/// d4/3a/7b/2e/d43a7b2e-f9c4-4a1b-8e5d-123456789abc.pdf
/// ```
///
/// The extension of `original_name`, if any, is kept.
pub fn allocate_path(original_name: &str) -> String {
    let uuid = uuid::Uuid::new_v4();
    let simple = uuid.simple().to_string();
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    format!(
        "{}/{}/{}/{}/{}{}",
        &simple[0..2],
        &simple[2..4],
        &simple[4..6],
        &simple[6..8],
        uuid.hyphenated(),
        extension
    )
}

/// Reject relative paths that are empty, absolute, or leave the root.
pub fn validate_relative_path(relative: &str) -> StoreResult<()> {
    if relative.trim().is_empty() {
        return Err(StoreError::InvalidPath("empty path".to_string()));
    }
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(StoreError::InvalidPath(relative.to_string())),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_path_is_hierarchical() {
        let path = allocate_path("report.pdf");
        let parts: Vec<&str> = path.split('/').collect();
        assert_eq!(parts.len(), 5);
        for level in &parts[..4] {
            assert_eq!(level.len(), 2);
        }
        assert!(parts[4].ends_with(".pdf"));
        // The directory levels are the leading characters of the file name.
        let joined: String = parts[..4].concat();
        assert!(parts[4].replace('-', "").starts_with(&joined));
    }

    #[test]
    fn allocated_path_without_extension() {
        let path = allocate_path("README");
        assert!(!path.rsplit('/').next().unwrap().contains('.'));
    }

    #[test]
    fn allocated_paths_are_unique() {
        assert_ne!(allocate_path("a.txt"), allocate_path("a.txt"));
    }

    #[test]
    fn allocated_path_is_valid() {
        assert!(validate_relative_path(&allocate_path("x.bin")).is_ok());
    }

    #[test]
    fn validation_rejects_parent_and_absolute() {
        assert!(validate_relative_path("a/../../b").is_err());
        assert!(validate_relative_path("/abs/path").is_err());
        assert!(validate_relative_path("   ").is_err());
        assert!(validate_relative_path("a/b/c.txt").is_ok());
    }
}

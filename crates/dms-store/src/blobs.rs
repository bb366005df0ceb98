use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::path::validate_relative_path;
use crate::store::Store;

/// Byte-level access to the files under one store root.
///
/// `FileBlobs` knows nothing about content records or sharing: it reads,
/// writes, and deletes whatever relative path it is given. Callers decide
/// whether a path may be written (see the copy-on-write path in
/// `dms-content`).
#[derive(Clone, Debug)]
pub struct FileBlobs {
    root: PathBuf,
    prune_empty_dirs: bool,
}

impl FileBlobs {
    /// Blob access rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prune_empty_dirs: true,
        }
    }

    /// Blob access for a registered store.
    pub fn for_store(store: &Store) -> Self {
        Self::new(store.root.clone())
    }

    /// Whether `delete` removes parent directories left empty (default on).
    pub fn with_prune_empty_dirs(mut self, prune: bool) -> Self {
        self.prune_empty_dirs = prune;
        self
    }

    /// The store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &str) -> StoreResult<PathBuf> {
        validate_relative_path(relative)?;
        Ok(self.root.join(relative))
    }

    /// Read the whole file at `relative`.
    pub fn read(&self, relative: &str) -> StoreResult<Vec<u8>> {
        let path = self.resolve(relative)?;
        Ok(fs::read(path)?)
    }

    /// Write `bytes` to `relative`, replacing any previous content.
    ///
    /// Parent directories are created as needed. The bytes are written to a
    /// temporary file in the target directory and renamed into place.
    pub fn write(&self, relative: &str, bytes: &[u8]) -> StoreResult<()> {
        let path = self.resolve(relative)?;
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::InvalidPath(relative.to_string()))?;
        fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        debug!(path = relative, bytes = bytes.len(), "wrote blob");
        Ok(())
    }

    /// Delete the file at `relative`. Returns `true` if it existed.
    pub fn delete(&self, relative: &str) -> StoreResult<bool> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        debug!(path = relative, "deleted blob");

        if self.prune_empty_dirs {
            self.prune_from(path.parent());
        }
        Ok(true)
    }

    /// Remove empty directories from `dir` upward, stopping at the root.
    fn prune_from(&self, mut dir: Option<&Path>) {
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            let is_empty = match fs::read_dir(current) {
                Ok(mut entries) => entries.next().is_none(),
                Err(_) => false,
            };
            if !is_empty {
                break;
            }
            if let Err(e) = fs::remove_dir(current) {
                warn!(dir = %current.display(), error = %e, "could not prune empty directory");
                break;
            }
            dir = current.parent();
        }
    }

    /// Size in bytes of the file at `relative`.
    pub fn size(&self, relative: &str) -> StoreResult<u64> {
        let path = self.resolve(relative)?;
        Ok(fs::metadata(path)?.len())
    }

    /// Returns `true` if a file exists at `relative`.
    pub fn exists(&self, relative: &str) -> StoreResult<bool> {
        let path = self.resolve(relative)?;
        Ok(path.is_file())
    }

    /// All files under the root as sorted relative paths (`/`-separated).
    ///
    /// In-flight temporary files from concurrent writes are skipped.
    pub fn list_files(&self) -> StoreResult<Vec<String>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(|e| {
                StoreError::Io(e.into_io_error().unwrap_or_else(|| {
                    io::Error::new(io::ErrorKind::Other, "filesystem loop under store root")
                }))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with(".tmp") {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::allocate_path;
    use tempfile::TempDir;

    fn blobs() -> (TempDir, FileBlobs) {
        let dir = TempDir::new().unwrap();
        let blobs = FileBlobs::new(dir.path());
        (dir, blobs)
    }

    #[test]
    fn write_then_read() {
        let (_dir, blobs) = blobs();
        blobs.write("aa/bb/hello.txt", b"hello").unwrap();
        assert_eq!(blobs.read("aa/bb/hello.txt").unwrap(), b"hello");
        assert_eq!(blobs.size("aa/bb/hello.txt").unwrap(), 5);
        assert!(blobs.exists("aa/bb/hello.txt").unwrap());
    }

    #[test]
    fn write_replaces_content() {
        let (_dir, blobs) = blobs();
        blobs.write("f.txt", b"first version").unwrap();
        blobs.write("f.txt", b"second").unwrap();
        assert_eq!(blobs.read("f.txt").unwrap(), b"second");
    }

    #[test]
    fn read_missing_is_io_error() {
        let (_dir, blobs) = blobs();
        let err = blobs.read("nope.txt").unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn delete_reports_existence() {
        let (_dir, blobs) = blobs();
        blobs.write("x/y.bin", b"data").unwrap();
        assert!(blobs.delete("x/y.bin").unwrap());
        assert!(!blobs.delete("x/y.bin").unwrap());
        assert!(!blobs.exists("x/y.bin").unwrap());
    }

    #[test]
    fn delete_prunes_empty_directories_but_not_root() {
        let (dir, blobs) = blobs();
        let path = allocate_path("doc.pdf");
        blobs.write(&path, b"pdf").unwrap();
        blobs.delete(&path).unwrap();

        let first_level = path.split('/').next().unwrap();
        assert!(!dir.path().join(first_level).exists());
        assert!(dir.path().exists());
    }

    #[test]
    fn delete_keeps_non_empty_directories() {
        let (dir, blobs) = blobs();
        blobs.write("aa/bb/one.txt", b"1").unwrap();
        blobs.write("aa/cc/two.txt", b"2").unwrap();
        blobs.delete("aa/bb/one.txt").unwrap();

        assert!(!dir.path().join("aa/bb").exists());
        assert!(dir.path().join("aa").exists());
        assert!(blobs.exists("aa/cc/two.txt").unwrap());
    }

    #[test]
    fn pruning_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let blobs = FileBlobs::new(dir.path()).with_prune_empty_dirs(false);
        blobs.write("keep/me/file", b"x").unwrap();
        blobs.delete("keep/me/file").unwrap();
        assert!(dir.path().join("keep/me").is_dir());
    }

    #[test]
    fn list_files_is_relative_and_sorted() {
        let (_dir, blobs) = blobs();
        blobs.write("b/2.txt", b"2").unwrap();
        blobs.write("a/1.txt", b"1").unwrap();
        blobs.write("c.txt", b"3").unwrap();
        assert_eq!(
            blobs.list_files().unwrap(),
            vec!["a/1.txt".to_string(), "b/2.txt".to_string(), "c.txt".to_string()]
        );
    }

    #[test]
    fn paths_outside_root_are_rejected() {
        let (_dir, blobs) = blobs();
        assert!(matches!(
            blobs.write("../escape.txt", b"x").unwrap_err(),
            StoreError::InvalidPath(_)
        ));
    }
}

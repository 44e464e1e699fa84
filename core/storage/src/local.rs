//! Local filesystem storage provider.

use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::provider::{Metadata, StorageProvider, TEMP_SUFFIX};
use coffer_common::{Error, Result, StorePath};

/// Local filesystem storage provider.
///
/// Stores blobs as files below a root directory.
pub struct LocalProvider {
    root: PathBuf,
}

impl LocalProvider {
    /// Create a new local provider with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            fs::create_dir_all(&root)?;
        }
        Ok(Self { root })
    }

    /// Root directory of this provider.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert a StorePath to a filesystem path.
    fn to_fs_path(&self, path: &StorePath) -> PathBuf {
        let mut fs_path = self.root.clone();
        for component in path.components() {
            fs_path.push(component);
        }
        fs_path
    }

    fn temp_path(fs_path: &Path) -> PathBuf {
        let mut name = fs_path.as_os_str().to_os_string();
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }

    fn create_metadata(name: String, fs_meta: &fs::Metadata) -> Metadata {
        let modified: DateTime<Utc> = fs_meta
            .modified()
            .map(|t| t.into())
            .unwrap_or_else(|_| Utc::now());

        Metadata {
            name,
            size: if fs_meta.is_file() {
                Some(fs_meta.len())
            } else {
                None
            },
            is_directory: fs_meta.is_dir(),
            modified,
        }
    }
}

impl StorageProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn read(&self, path: &StorePath) -> Result<Option<Vec<u8>>> {
        let fs_path = self.to_fs_path(path);
        if fs_path.is_dir() {
            return Err(Error::InvalidInput(format!("Cannot read directory: {}", path)));
        }
        match fs::read(&fs_path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_atomic(&self, path: &StorePath, data: &[u8]) -> Result<()> {
        let fs_path = self.to_fs_path(path);
        let parent = fs_path
            .parent()
            .ok_or_else(|| Error::InvalidInput("Cannot write to root".to_string()))?;
        if !parent.is_dir() {
            return Err(Error::NotFound(format!(
                "Parent directory not found: {}",
                parent.display()
            )));
        }

        // Temp file lives next to the target so the rename stays on one filesystem.
        let temp_path = Self::temp_path(&fs_path);
        let written = File::create(&temp_path).and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, &fs_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        // Persist the rename itself; not every platform supports syncing directories.
        if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
            debug!(error = %e, "Directory sync skipped");
        }

        Ok(())
    }

    fn remove(&self, path: &StorePath) -> Result<bool> {
        let fs_path = self.to_fs_path(path);
        if fs_path.is_dir() {
            return Err(Error::InvalidInput(format!(
                "Cannot remove directory: {}",
                path
            )));
        }
        match fs::remove_file(&fs_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, path: &StorePath) -> Result<bool> {
        Ok(self.to_fs_path(path).exists())
    }

    fn list(&self, path: &StorePath) -> Result<Vec<Metadata>> {
        let fs_path = self.to_fs_path(path);

        if !fs_path.is_dir() {
            return Err(Error::NotFound(format!("Directory not found: {}", path)));
        }

        let mut results = Vec::new();
        for entry in fs::read_dir(&fs_path)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                warn!(path = %path, "Skipping entry with non UTF-8 name");
                continue;
            };
            if name.ends_with(TEMP_SUFFIX) {
                continue;
            }
            let fs_meta = entry.metadata()?;
            results.push(Self::create_metadata(name, &fs_meta));
        }

        Ok(results)
    }

    fn create_dir(&self, path: &StorePath) -> Result<()> {
        let fs_path = self.to_fs_path(path);
        if fs_path.is_file() {
            return Err(Error::AlreadyExists(format!(
                "Path exists as a file: {}",
                path
            )));
        }
        fs::create_dir_all(&fs_path)?;
        Ok(())
    }

    fn remove_temp_files(&self, path: &StorePath) -> Result<usize> {
        let fs_path = self.to_fs_path(path);
        if !fs_path.is_dir() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&fs_path)? {
            let entry = entry?;
            let is_temp = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(TEMP_SUFFIX));
            if is_temp && entry.file_type()?.is_file() {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(error = %e, path = %path, "Failed to remove stale temp file"),
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn path(p: &str) -> StorePath {
        StorePath::parse(p).unwrap()
    }

    #[test]
    fn test_local_write_read() {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path()).unwrap();

        provider.write_atomic(&path("/a.bin"), b"Hello, Local!").unwrap();
        assert_eq!(
            provider.read(&path("/a.bin")).unwrap().as_deref(),
            Some(&b"Hello, Local!"[..])
        );
        assert!(provider.read(&path("/missing.bin")).unwrap().is_none());
    }

    #[test]
    fn test_write_replaces_and_leaves_no_temp() {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path()).unwrap();

        provider.write_atomic(&path("/a.bin"), b"old").unwrap();
        provider.write_atomic(&path("/a.bin"), b"new").unwrap();

        assert_eq!(provider.read(&path("/a.bin")).unwrap().unwrap(), b"new");
        let names: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, ["a.bin"]);
    }

    #[test]
    fn test_write_requires_parent() {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path()).unwrap();

        let err = provider.write_atomic(&path("/ns/a.bin"), b"x").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        provider.create_dir(&path("/ns")).unwrap();
        provider.write_atomic(&path("/ns/a.bin"), b"x").unwrap();
    }

    #[test]
    fn test_list_skips_temp_files() {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path()).unwrap();

        provider.write_atomic(&path("/one.bin"), &[1]).unwrap();
        provider.create_dir(&path("/sub")).unwrap();
        fs::write(temp.path().join("two.bin.tmp"), [2]).unwrap();

        let mut names: Vec<_> = provider
            .list(&StorePath::root())
            .unwrap()
            .into_iter()
            .map(|m| (m.name, m.is_directory))
            .collect();
        names.sort();
        assert_eq!(
            names,
            [("one.bin".to_string(), false), ("sub".to_string(), true)]
        );

        assert_eq!(provider.remove_temp_files(&StorePath::root()).unwrap(), 1);
        assert!(!temp.path().join("two.bin.tmp").exists());
    }

    #[test]
    fn test_remove() {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path()).unwrap();

        provider.write_atomic(&path("/a.bin"), b"x").unwrap();
        assert!(provider.remove(&path("/a.bin")).unwrap());
        assert!(!provider.remove(&path("/a.bin")).unwrap());
        assert!(!provider.exists(&path("/a.bin")).unwrap());
    }
}

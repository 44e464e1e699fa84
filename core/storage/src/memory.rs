//! In-memory storage provider for testing.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::provider::{Metadata, StorageProvider};
use coffer_common::{Error, Result, StorePath};

/// In-memory storage entry.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, modified: DateTime<Utc> },
    Directory { modified: DateTime<Utc> },
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, Entry>,
    /// Writes left before injected failures start; `None` never fails.
    write_budget: Option<usize>,
}

/// In-memory storage provider.
///
/// Useful for testing. All data is stored in memory and lost on drop.
/// Writes can be made to fail on demand to exercise error paths.
#[derive(Debug)]
pub struct MemoryProvider {
    inner: RwLock<Inner>,
}

impl MemoryProvider {
    /// Create a new empty memory provider.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            StorePath::root().to_string_path(),
            Entry::Directory {
                modified: Utc::now(),
            },
        );
        Self {
            inner: RwLock::new(Inner {
                entries,
                write_budget: None,
            }),
        }
    }

    /// Let the next `count` writes succeed and fail every write after them.
    pub fn fail_writes_after(&self, count: usize) -> Result<()> {
        self.lock_write()?.write_budget = Some(count);
        Ok(())
    }

    /// Stop injecting write failures.
    pub fn clear_failures(&self) -> Result<()> {
        self.lock_write()?.write_budget = None;
        Ok(())
    }

    /// Number of stored files, across all directories.
    pub fn file_count(&self) -> Result<usize> {
        Ok(self
            .lock_read()?
            .entries
            .values()
            .filter(|entry| matches!(entry, Entry::File { .. }))
            .count())
    }

    fn lock_read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| Error::Storage("Memory provider lock poisoned".to_string()))
    }

    fn lock_write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| Error::Storage("Memory provider lock poisoned".to_string()))
    }

    fn key(path: &StorePath) -> String {
        path.to_string_path()
    }

    fn is_child(parent: &StorePath, key: &str) -> Option<String> {
        let path = StorePath::parse(key).ok()?;
        if path.parent().as_ref() == Some(parent) {
            path.name().map(String::from)
        } else {
            None
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn read(&self, path: &StorePath) -> Result<Option<Vec<u8>>> {
        match self.lock_read()?.entries.get(&Self::key(path)) {
            Some(Entry::File { data, .. }) => Ok(Some(data.clone())),
            Some(Entry::Directory { .. }) => Err(Error::InvalidInput(format!(
                "Cannot read directory: {}",
                path
            ))),
            None => Ok(None),
        }
    }

    fn write_atomic(&self, path: &StorePath, data: &[u8]) -> Result<()> {
        let mut inner = self.lock_write()?;

        if let Some(left) = inner.write_budget.as_mut() {
            if *left == 0 {
                return Err(Error::Storage(format!("Injected write failure: {}", path)));
            }
            *left -= 1;
        }

        let parent = path
            .parent()
            .ok_or_else(|| Error::InvalidInput("Cannot write to root".to_string()))?;
        match inner.entries.get(&Self::key(&parent)) {
            Some(Entry::Directory { .. }) => {}
            _ => {
                return Err(Error::NotFound(format!(
                    "Parent directory not found: {}",
                    parent
                )));
            }
        }

        let key = Self::key(path);
        if let Some(Entry::Directory { .. }) = inner.entries.get(&key) {
            return Err(Error::AlreadyExists(format!("Path is a directory: {}", path)));
        }
        inner.entries.insert(
            key,
            Entry::File {
                data: data.to_vec(),
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn remove(&self, path: &StorePath) -> Result<bool> {
        let mut inner = self.lock_write()?;
        let key = Self::key(path);
        match inner.entries.get(&key) {
            Some(Entry::Directory { .. }) => Err(Error::InvalidInput(format!(
                "Cannot remove directory: {}",
                path
            ))),
            Some(Entry::File { .. }) => {
                inner.entries.remove(&key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn exists(&self, path: &StorePath) -> Result<bool> {
        Ok(self.lock_read()?.entries.contains_key(&Self::key(path)))
    }

    fn list(&self, path: &StorePath) -> Result<Vec<Metadata>> {
        let inner = self.lock_read()?;
        match inner.entries.get(&Self::key(path)) {
            Some(Entry::Directory { .. }) => {}
            _ => return Err(Error::NotFound(format!("Directory not found: {}", path))),
        }

        let results = inner
            .entries
            .iter()
            .filter_map(|(key, entry)| {
                let name = Self::is_child(path, key)?;
                Some(match entry {
                    Entry::File { data, modified } => Metadata {
                        name,
                        size: Some(data.len() as u64),
                        is_directory: false,
                        modified: *modified,
                    },
                    Entry::Directory { modified } => Metadata {
                        name,
                        size: None,
                        is_directory: true,
                        modified: *modified,
                    },
                })
            })
            .collect();
        Ok(results)
    }

    fn create_dir(&self, path: &StorePath) -> Result<()> {
        let mut inner = self.lock_write()?;

        let mut current = StorePath::root();
        for component in path.components() {
            current = current.join(component)?;
            match inner.entries.get(&Self::key(&current)) {
                Some(Entry::Directory { .. }) => {}
                Some(Entry::File { .. }) => {
                    return Err(Error::AlreadyExists(format!(
                        "Path exists as a file: {}",
                        current
                    )));
                }
                None => {
                    inner.entries.insert(
                        Self::key(&current),
                        Entry::Directory {
                            modified: Utc::now(),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    fn remove_temp_files(&self, _path: &StorePath) -> Result<usize> {
        // Writes replace entries in one step, so nothing is ever left behind.
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> StorePath {
        StorePath::parse(p).unwrap()
    }

    #[test]
    fn test_memory_write_read() {
        let provider = MemoryProvider::new();

        provider.write_atomic(&path("/a"), b"Hello").unwrap();
        assert_eq!(provider.read(&path("/a")).unwrap().unwrap(), b"Hello");
        assert!(provider.read(&path("/b")).unwrap().is_none());
        assert_eq!(provider.file_count().unwrap(), 1);
    }

    #[test]
    fn test_memory_directories() {
        let provider = MemoryProvider::new();

        assert!(provider.write_atomic(&path("/ns/a"), b"x").is_err());
        provider.create_dir(&path("/ns/inner")).unwrap();
        provider.write_atomic(&path("/ns/a"), b"x").unwrap();
        provider.write_atomic(&path("/top"), b"y").unwrap();

        let mut names: Vec<_> = provider
            .list(&path("/ns"))
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        names.sort();
        assert_eq!(names, ["a", "inner"]);

        assert!(provider.read(&path("/ns")).is_err());
        assert!(provider.list(&path("/missing")).is_err());
    }

    #[test]
    fn test_injected_write_failures() {
        let provider = MemoryProvider::new();
        provider.write_atomic(&path("/a"), b"old").unwrap();

        provider.fail_writes_after(1).unwrap();
        provider.write_atomic(&path("/b"), b"ok").unwrap();
        let err = provider.write_atomic(&path("/a"), b"new").unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(provider.read(&path("/a")).unwrap().unwrap(), b"old");

        provider.clear_failures().unwrap();
        provider.write_atomic(&path("/a"), b"new").unwrap();
        assert_eq!(provider.read(&path("/a")).unwrap().unwrap(), b"new");
    }

    #[test]
    fn test_memory_remove() {
        let provider = MemoryProvider::new();
        provider.write_atomic(&path("/a"), b"x").unwrap();

        assert!(provider.remove(&path("/a")).unwrap());
        assert!(!provider.remove(&path("/a")).unwrap());
        assert!(!provider.exists(&path("/a")).unwrap());
    }
}

//! Encrypted key to document directory.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::naming::{file_name, parse_file_name, EXTENSION};
use coffer_common::{Error, Key, Result, SensitiveBytes, StorePath};
use coffer_crypto::{decrypt_bytes, encrypt_bytes, DataKey};
use coffer_document::{Document, Serializable};
use coffer_storage::{LocalProvider, StorageProvider};

/// Persists encrypted documents under [`Key`]s.
///
/// Writes are buffered in memory and overlay the committed files until
/// [`flush`](Self::flush). Each committed entry is one file whose name
/// encodes its key and whose content is the encrypted document.
///
/// A directory assumes a single writer. Dropping a directory that still
/// holds buffered entries flushes them best-effort.
pub struct Directory {
    provider: Arc<dyn StorageProvider>,
    root: StorePath,
    key: Arc<DataKey>,
    buffer: BTreeMap<Key, Option<Document>>,
    closed: bool,
}

impl Directory {
    /// Open a directory on the local filesystem.
    ///
    /// # Postconditions
    /// - `path` exists
    /// - Temp files left by an interrupted flush are removed
    pub fn open(path: impl AsRef<Path>, key: DataKey) -> Result<Self> {
        let provider = LocalProvider::new(path)?;
        Self::with_provider(Arc::new(provider), StorePath::root(), Arc::new(key))
    }

    /// Open a directory rooted at `root` within `provider`.
    pub fn with_provider(
        provider: Arc<dyn StorageProvider>,
        root: StorePath,
        key: Arc<DataKey>,
    ) -> Result<Self> {
        provider.create_dir(&root)?;
        match provider.remove_temp_files(&root) {
            Ok(0) => {}
            Ok(removed) => info!(root = %root, removed, "Removed stale temp files"),
            Err(e) => warn!(root = %root, error = %e, "Failed to clean stale temp files"),
        }

        debug!(root = %root, provider = provider.name(), "Directory opened");
        Ok(Self {
            provider,
            root,
            key,
            buffer: BTreeMap::new(),
            closed: false,
        })
    }

    /// Location of this directory within its provider.
    pub fn root(&self) -> &StorePath {
        &self.root
    }

    /// Whether [`close`](Self::close) has completed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of buffered, unflushed entries.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::NotPermitted(format!(
                "Directory {} is closed",
                self.root
            )));
        }
        Ok(())
    }

    fn entry_path(&self, key: &Key) -> Result<StorePath> {
        self.root.join(&file_name(key))
    }

    /// Buffer an upsert, or a delete when `value` is `None`.
    ///
    /// # Errors
    /// - Key name is empty or longer than [`Key::MAX_NAME_LEN`] bytes
    pub fn put(&mut self, key: Key, value: Option<Document>) -> Result<()> {
        self.ensure_open()?;
        key.validate()?;
        self.buffer.insert(key, value);
        Ok(())
    }

    /// Buffer a delete.
    pub fn remove(&mut self, key: Key) -> Result<()> {
        self.put(key, None)
    }

    /// Serialize and buffer a value.
    pub fn put_value<T: Serializable>(&mut self, key: Key, value: &T) -> Result<()> {
        let document = Document::from_value(value)?;
        self.put(key, Some(document))
    }

    /// Get the document stored under `key`.
    ///
    /// Buffered writes are visible before they are flushed.
    ///
    /// # Errors
    /// - Committed file cannot be decrypted or decoded (corrupted I/O error)
    pub fn get(&self, key: &Key) -> Result<Option<Document>> {
        self.ensure_open()?;
        if let Some(buffered) = self.buffer.get(key) {
            return Ok(buffered.clone());
        }
        self.load(key)
    }

    /// Get and deserialize the value stored under `key`.
    pub fn get_value<T: Serializable>(&self, key: &Key) -> Result<Option<T>> {
        self.get(key)?
            .map(|document| document.to_value())
            .transpose()
    }

    /// Whether a live entry exists under `key`.
    pub fn contains(&self, key: &Key) -> Result<bool> {
        self.ensure_open()?;
        match self.buffer.get(key) {
            Some(buffered) => Ok(buffered.is_some()),
            None => self.provider.exists(&self.entry_path(key)?),
        }
    }

    /// Keys of all live entries, committed and buffered, in key order.
    pub fn list(&self) -> Result<Vec<Key>> {
        self.ensure_open()?;

        let mut keys: BTreeSet<Key> = self
            .provider
            .list(&self.root)?
            .into_iter()
            .filter(|meta| !meta.is_directory)
            .filter_map(|meta| parse_file_name(&meta.name))
            .collect();

        for (key, value) in &self.buffer {
            if value.is_some() {
                keys.insert(key.clone());
            } else {
                keys.remove(key);
            }
        }
        Ok(keys.into_iter().collect())
    }

    /// All live entries with their documents, in key order.
    pub fn entries(&self) -> Result<Vec<(Key, Document)>> {
        let mut entries = Vec::new();
        for key in self.list()? {
            if let Some(document) = self.get(&key)? {
                entries.push((key, document));
            }
        }
        Ok(entries)
    }

    fn load(&self, key: &Key) -> Result<Option<Document>> {
        let path = self.entry_path(key)?;
        let Some(ciphertext) = self.provider.read(&path)? else {
            return Ok(None);
        };

        let plaintext = decrypt_bytes(&self.key, &ciphertext)
            .map(SensitiveBytes::new)
            .map_err(|e| Error::corrupted(format!("Cannot decrypt {}: {}", path, e)))?;
        let document = Document::decode(plaintext.as_bytes())
            .map_err(|e| Error::corrupted(format!("Cannot decode {}: {}", path, e)))?;
        Ok(Some(document))
    }

    fn commit(&self, key: &Key, value: Option<&Document>) -> Result<()> {
        let path = self.entry_path(key)?;
        match value {
            Some(document) => {
                let plaintext = SensitiveBytes::new(document.encode()?);
                let ciphertext = encrypt_bytes(&self.key, plaintext.as_bytes())?;
                self.provider.write_atomic(&path, &ciphertext)
            }
            None => self.provider.remove(&path).map(|_| ()),
        }
    }

    /// Commit every buffered entry.
    ///
    /// Entries are committed one at a time in key order, each atomically.
    ///
    /// # Errors
    /// - Storage or encryption failure. The failed entry and every entry
    ///   not yet committed stay buffered; committed entries are kept.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.buffer.is_empty() {
            return Ok(());
        }

        let total = self.buffer.len();
        while let Some((key, value)) = self.buffer.pop_first() {
            if let Err(e) = self.commit(&key, value.as_ref()) {
                warn!(root = %self.root, key = %key, error = %e, "Flush failed");
                self.buffer.insert(key, value);
                return Err(e);
            }
        }

        debug!(root = %self.root, entries = total, "Directory flushed");
        Ok(())
    }

    /// Open a namespace: an independent directory in a subdirectory.
    ///
    /// The namespace shares this directory's key but has its own buffer and
    /// lifecycle. Closing it does not close this directory.
    ///
    /// # Errors
    /// - Name is not a single path component, is longer than
    ///   [`StorePath::MAX_COMPONENT_LEN`] bytes, or ends with the entry extension
    pub fn with_namespace(&self, name: &str) -> Result<Directory> {
        self.ensure_open()?;
        if name.ends_with(&format!(".{}", EXTENSION)) {
            return Err(Error::InvalidInput(format!(
                "Namespace name cannot end with .{}",
                EXTENSION
            )));
        }
        let root = self.root.join(name)?;
        Directory::with_provider(self.provider.clone(), root, self.key.clone())
    }

    /// Flush and release the directory.
    ///
    /// Closing twice is a no-op. If the flush fails the directory stays open.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        self.closed = true;
        debug!(root = %self.root, "Directory closed");
        Ok(())
    }
}

impl Drop for Directory {
    fn drop(&mut self) {
        if self.closed || self.buffer.is_empty() {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(
                root = %self.root,
                pending = self.buffer.len(),
                error = %e,
                "Dropped directory with unflushed entries"
            );
        }
    }
}

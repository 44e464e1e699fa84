//! Password-protected account: the root of one store.
//!
//! # Layout
//! ```text
//! <root>/coffer.key   password-wrapped data key
//! <root>/store.json   store configuration
//! <root>/data/        encrypted entries and namespaces
//! ```

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::{StoreConfig, CONFIG_FILENAME, DATA_DIRNAME, KEY_FILENAME};
use crate::directory::Directory;
use crate::index::ChunkedIndex;
use coffer_common::{Error, Result, StorePath};
use coffer_crypto::{read_key_file, write_key_file, DataKey};
use coffer_document::Serializable;
use coffer_storage::{LocalProvider, StorageProvider};

fn key_path() -> Result<StorePath> {
    StorePath::root().join(KEY_FILENAME)
}

fn config_path() -> Result<StorePath> {
    StorePath::root().join(CONFIG_FILENAME)
}

fn data_path() -> Result<StorePath> {
    StorePath::root().join(DATA_DIRNAME)
}

/// An unlocked account.
///
/// Holds the data key for the lifetime of the value. Every directory and
/// index opened from the account shares that key.
pub struct Account {
    provider: Arc<dyn StorageProvider>,
    key: Arc<DataKey>,
    config: StoreConfig,
}

impl Account {
    /// Whether an account exists at `root`.
    pub fn exists(root: impl AsRef<Path>) -> bool {
        root.as_ref().join(KEY_FILENAME).is_file()
    }

    /// Create a new account on the local filesystem.
    ///
    /// # Postconditions
    /// - A random data key is generated and wrapped with `password`
    /// - Key file, configuration and data directory exist under `root`
    ///
    /// # Errors
    /// - An account already exists at `root`
    /// - Password empty
    /// - Invalid configuration
    pub fn create(root: impl AsRef<Path>, password: &[u8], config: StoreConfig) -> Result<Self> {
        let provider = LocalProvider::new(root)?;
        Self::create_in(Arc::new(provider), password, config)
    }

    /// Create a new account at the root of `provider`.
    pub fn create_in(
        provider: Arc<dyn StorageProvider>,
        password: &[u8],
        mut config: StoreConfig,
    ) -> Result<Self> {
        config.validate()?;
        let key_path = key_path()?;
        if provider.exists(&key_path)? {
            return Err(Error::AlreadyExists("Account already exists".to_string()));
        }

        let key = DataKey::generate();
        config.bind_key(&key);
        let key_file = write_key_file(password, &key, &config.kdf_params)?;

        provider.create_dir(&data_path()?)?;
        provider.write_atomic(&config_path()?, &config.to_bytes()?)?;
        // Written last: a key file marks a complete account.
        provider.write_atomic(&key_path, &key_file)?;

        info!(provider = provider.name(), "Account created");
        Ok(Self {
            provider,
            key: Arc::new(key),
            config,
        })
    }

    /// Open an existing account on the local filesystem.
    ///
    /// # Errors
    /// - No account at `root`
    /// - Invalid password (`NotPermitted`)
    /// - Incompatible store version
    pub fn open(root: impl AsRef<Path>, password: &[u8]) -> Result<Self> {
        let root = root.as_ref();
        if !Self::exists(root) {
            return Err(Error::NotFound(format!(
                "No account at {}",
                root.display()
            )));
        }
        Self::open_in(Arc::new(LocalProvider::new(root)?), password)
    }

    /// Open the account at the root of `provider`.
    pub fn open_in(provider: Arc<dyn StorageProvider>, password: &[u8]) -> Result<Self> {
        let key_file = provider
            .read(&key_path()?)?
            .ok_or_else(|| Error::NotFound("Key file not found".to_string()))?;
        let config_bytes = provider
            .read(&config_path()?)?
            .ok_or_else(|| Error::NotFound("Store configuration not found".to_string()))?;
        let config = StoreConfig::from_bytes(&config_bytes)?;
        config.validate()?;

        let key = read_key_file(password, &key_file)
            .ok_or_else(|| Error::NotPermitted("Invalid password".to_string()))?;
        if !config.accepts_key(&key)? {
            return Err(Error::Crypto(
                "Key file does not belong to this store".to_string(),
            ));
        }

        info!(provider = provider.name(), "Account opened");
        Ok(Self {
            provider,
            key: Arc::new(key),
            config,
        })
    }

    /// Store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open the account's top-level directory.
    ///
    /// Each call returns an independent handle; keep one writer per directory.
    pub fn directory(&self) -> Result<Directory> {
        Directory::with_provider(self.provider.clone(), data_path()?, self.key.clone())
    }

    /// Open a namespace below the top-level directory.
    pub fn namespace(&self, name: &str) -> Result<Directory> {
        self.directory()?.with_namespace(name)
    }

    /// Open the chunked index stored in namespace `name`, using the
    /// configured thresholds.
    pub fn open_index<T, C>(&self, name: &str, compare: C) -> Result<ChunkedIndex<T, C>>
    where
        T: Serializable + Clone + PartialEq,
        C: Fn(&T, &T) -> Ordering,
    {
        ChunkedIndex::open(self.namespace(name)?, compare, self.config.index)
    }

    /// Re-wrap the data key with a new password.
    ///
    /// Stored entries are untouched; only the key file is replaced.
    ///
    /// # Errors
    /// - `old_password` does not unlock the key file (`NotPermitted`)
    /// - New password empty
    pub fn change_password(&mut self, old_password: &[u8], new_password: &[u8]) -> Result<()> {
        let key_path = key_path()?;
        let current = self
            .provider
            .read(&key_path)?
            .ok_or_else(|| Error::NotFound("Key file not found".to_string()))?;

        let key = read_key_file(old_password, &current)
            .ok_or_else(|| Error::NotPermitted("Invalid old password".to_string()))?;
        if !self.key.matches_fingerprint(&key.fingerprint()) {
            return Err(Error::Crypto(
                "Key file does not belong to this store".to_string(),
            ));
        }

        let key_file = write_key_file(new_password, &self.key, &self.config.kdf_params)?;
        self.provider.write_atomic(&key_path, &key_file)?;

        info!(provider = self.provider.name(), "Password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexSettings;
    use coffer_common::Key;
    use coffer_crypto::KdfParams;
    use coffer_storage::MemoryProvider;
    use tempfile::TempDir;

    fn fast_config() -> StoreConfig {
        StoreConfig::new(KdfParams {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        })
        .with_index(IndexSettings {
            split_threshold: 6,
            merge_threshold: 2,
        })
    }

    #[test]
    fn test_create_and_open() {
        let temp = TempDir::new().unwrap();
        assert!(!Account::exists(temp.path()));

        {
            let account = Account::create(temp.path(), b"hunter2", fast_config()).unwrap();
            let mut directory = account.directory().unwrap();
            directory.put_value(Key::reference(1), &"hello".to_string()).unwrap();
            directory.close().unwrap();
        }

        assert!(Account::exists(temp.path()));
        assert!(temp.path().join("store.json").is_file());
        assert!(temp.path().join("data").is_dir());

        let account = Account::open(temp.path(), b"hunter2").unwrap();
        assert_eq!(account.config().index.split_threshold, 6);
        let directory = account.directory().unwrap();
        assert_eq!(
            directory.get_value::<String>(&Key::reference(1)).unwrap(),
            Some("hello".to_string())
        );
    }

    #[test]
    fn test_wrong_password_is_not_permitted() {
        let temp = TempDir::new().unwrap();
        Account::create(temp.path(), b"right", fast_config()).unwrap();

        assert!(matches!(
            Account::open(temp.path(), b"wrong"),
            Err(Error::NotPermitted(_))
        ));
    }

    #[test]
    fn test_create_twice_fails() {
        let temp = TempDir::new().unwrap();
        Account::create(temp.path(), b"pw", fast_config()).unwrap();
        assert!(matches!(
            Account::create(temp.path(), b"pw", fast_config()),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_open_missing_account() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            Account::open(temp.path().join("nothing"), b"pw"),
            Err(Error::NotFound(_))
        ));
        assert!(!temp.path().join("nothing").exists());
    }

    #[test]
    fn test_change_password_keeps_data() {
        let provider: Arc<dyn StorageProvider> = Arc::new(MemoryProvider::new());
        let mut account = Account::create_in(provider.clone(), b"old", fast_config()).unwrap();
        {
            let mut goals = account.namespace("goals").unwrap();
            goals.put_value(Key::name("target").unwrap(), &500i64).unwrap();
            goals.close().unwrap();
        }

        assert!(matches!(
            account.change_password(b"not-old", b"new"),
            Err(Error::NotPermitted(_))
        ));
        account.change_password(b"old", b"new").unwrap();

        assert!(matches!(
            Account::open_in(provider.clone(), b"old"),
            Err(Error::NotPermitted(_))
        ));
        let reopened = Account::open_in(provider, b"new").unwrap();
        let goals = reopened.namespace("goals").unwrap();
        assert_eq!(
            goals.get_value::<i64>(&Key::name("target").unwrap()).unwrap(),
            Some(500)
        );
    }

    #[test]
    fn test_foreign_key_file_rejected() {
        let first: Arc<dyn StorageProvider> = Arc::new(MemoryProvider::new());
        let second: Arc<dyn StorageProvider> = Arc::new(MemoryProvider::new());
        Account::create_in(first.clone(), b"pw", fast_config()).unwrap();
        Account::create_in(second.clone(), b"pw", fast_config()).unwrap();

        let path = key_path().unwrap();
        let foreign = second.read(&path).unwrap().unwrap();
        first.write_atomic(&path, &foreign).unwrap();

        assert!(matches!(
            Account::open_in(first, b"pw"),
            Err(Error::Crypto(_))
        ));
    }

    #[test]
    fn test_open_index_uses_configured_thresholds() {
        let provider: Arc<dyn StorageProvider> = Arc::new(MemoryProvider::new());
        let account = Account::create_in(provider, b"pw", fast_config()).unwrap();

        let mut index = account.open_index("amounts", i64::cmp).unwrap();
        assert_eq!(index.split_threshold(), 6);
        assert_eq!(index.merge_threshold(), 2);
        for i in 0..10 {
            index.add(i).unwrap();
        }
        assert_eq!(index.chunk_count(), 3);
        index.close().unwrap();
    }
}

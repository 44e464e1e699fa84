//! Store configuration and metadata.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use coffer_common::{Error, Result};
use coffer_crypto::{DataKey, KdfParams};

/// Configuration file name in the account root.
pub const CONFIG_FILENAME: &str = "store.json";

/// Key file name in the account root.
pub const KEY_FILENAME: &str = "coffer.key";

/// Data directory name in the account root.
pub const DATA_DIRNAME: &str = "data";

/// Store format version for migration support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreVersion {
    pub major: u32,
    pub minor: u32,
}

impl StoreVersion {
    /// Current store format version.
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    /// Check if this version is compatible with the current version.
    pub fn is_compatible(&self) -> bool {
        self.major == Self::CURRENT.major
    }
}

impl Default for StoreVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Chunk size bounds for chunked indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    /// A chunk holding more items than this is split at its median.
    pub split_threshold: usize,
    /// A chunk holding fewer items than this is merged with a neighbour.
    pub merge_threshold: usize,
}

impl IndexSettings {
    /// Smallest accepted split threshold.
    pub const MIN_SPLIT_THRESHOLD: usize = 2;

    /// Check the thresholds.
    ///
    /// # Errors
    /// - `split_threshold` is below [`Self::MIN_SPLIT_THRESHOLD`]
    pub fn validate(&self) -> Result<()> {
        if self.split_threshold < Self::MIN_SPLIT_THRESHOLD {
            return Err(Error::InvalidInput(format!(
                "Split threshold must be at least {}, got {}",
                Self::MIN_SPLIT_THRESHOLD,
                self.split_threshold
            )));
        }
        Ok(())
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            split_threshold: 256,
            merge_threshold: 64,
        }
    }
}

/// Store configuration.
///
/// Stored as JSON at the account root. Holds no secrets: the data key lives
/// only in the password-wrapped key file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store format version.
    pub version: StoreVersion,
    /// Store creation timestamp.
    pub created_at: DateTime<Utc>,
    /// KDF parameters used when the key file is (re)written.
    pub kdf_params: KdfParams,
    /// Defaults for indexes opened through the account.
    pub index: IndexSettings,
    /// Base64 fingerprint of the data key, pairing the key file with this store.
    #[serde(default)]
    pub key_check: String,
}

impl StoreConfig {
    /// Create a configuration with the given KDF parameters.
    pub fn new(kdf_params: KdfParams) -> Self {
        Self {
            version: StoreVersion::CURRENT,
            created_at: Utc::now(),
            kdf_params,
            index: IndexSettings::default(),
            key_check: String::new(),
        }
    }

    /// Replace the index defaults.
    pub fn with_index(mut self, index: IndexSettings) -> Self {
        self.index = index;
        self
    }

    /// Record the fingerprint of `key`.
    pub(crate) fn bind_key(&mut self, key: &DataKey) {
        self.key_check = STANDARD.encode(key.fingerprint());
    }

    /// Whether `key` is the key this store was created with.
    ///
    /// Configurations without a recorded fingerprint accept any key.
    pub(crate) fn accepts_key(&self, key: &DataKey) -> Result<bool> {
        if self.key_check.is_empty() {
            return Ok(true);
        }
        let fingerprint = STANDARD
            .decode(&self.key_check)
            .map_err(|e| Error::Serialization(format!("Invalid key check: {}", e)))?;
        Ok(key.matches_fingerprint(&fingerprint))
    }

    /// Check that this configuration can be used.
    pub fn validate(&self) -> Result<()> {
        if !self.version.is_compatible() {
            return Err(Error::InvalidInput(format!(
                "Unsupported store version {}.{}",
                self.version.major, self.version.minor
            )));
        }
        self.kdf_params.validate()?;
        self.index.validate()
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Serialize to bytes for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(KdfParams::default())
    }
}

/// Store worker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Flush the store this often while idle; `None` flushes only on request.
    pub flush_interval: Option<Duration>,
}

impl WorkerConfig {
    /// Flush periodically.
    pub fn periodic(interval: Duration) -> Self {
        Self {
            flush_interval: Some(interval),
        }
    }
}

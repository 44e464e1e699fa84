//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory.

use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of a key fingerprint in bytes.
pub const FINGERPRINT_LENGTH: usize = 16;

/// Symmetric key that encrypts every document of an account.
///
/// Generated once when the account is created and persisted only in
/// password-wrapped form.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKey {
    key: [u8; KEY_LENGTH],
}

impl DataKey {
    /// Create a data key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Create a data key from a slice.
    ///
    /// # Errors
    /// - Returns error if the slice is not KEY_LENGTH bytes
    pub fn from_slice(key: &[u8]) -> coffer_common::Result<Self> {
        let key: [u8; KEY_LENGTH] = key.try_into().map_err(|_| {
            coffer_common::Error::Crypto(format!(
                "Invalid key length: expected {}, got {}",
                KEY_LENGTH,
                key.len()
            ))
        })?;
        Ok(Self { key })
    }

    /// Generate a random data key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = [0u8; KEY_LENGTH];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Non-secret identifier of this key.
    ///
    /// Lets a store detect that a key file belongs to a different account
    /// without revealing the key itself.
    pub fn fingerprint(&self) -> [u8; FINGERPRINT_LENGTH] {
        use blake2::digest::consts::U16;
        use blake2::{Blake2b, Digest};

        let mut hasher = Blake2b::<U16>::new();
        hasher.update(b"coffer-fingerprint");
        hasher.update(self.key);

        let mut fingerprint = [0u8; FINGERPRINT_LENGTH];
        fingerprint.copy_from_slice(&hasher.finalize());
        fingerprint
    }

    /// Compare a stored fingerprint against this key in constant time.
    pub fn matches_fingerprint(&self, fingerprint: &[u8]) -> bool {
        self.fingerprint()[..].ct_eq(fingerprint).into()
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataKey([REDACTED])")
    }
}

/// Key derived from a password, used only to wrap a [`DataKey`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct WrappingKey {
    key: [u8; KEY_LENGTH],
}

impl WrappingKey {
    /// Create a wrapping key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for WrappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WrappingKey([REDACTED])")
    }
}

/// Salt for key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt(pub [u8; 32]);

impl Salt {
    /// Generate a random salt.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut salt = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut salt);
        Self(salt)
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

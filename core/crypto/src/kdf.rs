//! Key derivation using Argon2id.
//!
//! Argon2id is a memory-hard password hashing function that provides
//! resistance to both GPU and time-memory trade-off attacks.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use crate::keys::{Salt, WrappingKey, KEY_LENGTH};
use coffer_common::{Error, Result};

/// Parameters for Argon2id key derivation.
///
/// Parameters are recorded in key files, so they are also read back from
/// untrusted bytes. [`validate`](Self::validate) bounds every cost before any
/// work is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Largest accepted memory cost in KiB (1 GiB).
    pub const MAX_MEMORY_COST: u32 = 4 * 262144;

    /// Largest accepted number of iterations.
    pub const MAX_TIME_COST: u32 = 16;

    /// Largest accepted degree of parallelism.
    pub const MAX_PARALLELISM: u32 = 16;

    /// Create parameters suitable for interactive use.
    ///
    /// Targets roughly 0.5-1 second of derivation time.
    pub fn interactive() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
        }
    }

    /// Create parameters suitable for sensitive data.
    pub fn sensitive() -> Self {
        Self {
            memory_cost: 262144, // 256 MiB
            time_cost: 4,
            parallelism: 4,
        }
    }

    /// Create moderate parameters for mobile devices.
    pub fn moderate() -> Self {
        Self {
            memory_cost: 32768, // 32 MiB
            time_cost: 3,
            parallelism: 2,
        }
    }

    /// Check that every cost is within the accepted bounds.
    ///
    /// # Errors
    /// - `parallelism` is zero or above [`Self::MAX_PARALLELISM`]
    /// - `time_cost` is zero or above [`Self::MAX_TIME_COST`]
    /// - `memory_cost` is below 8 KiB per lane or above [`Self::MAX_MEMORY_COST`]
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 || self.parallelism > Self::MAX_PARALLELISM {
            return Err(Error::InvalidInput(format!(
                "KDF parallelism must be within 1..={}, got {}",
                Self::MAX_PARALLELISM,
                self.parallelism
            )));
        }
        if self.time_cost == 0 || self.time_cost > Self::MAX_TIME_COST {
            return Err(Error::InvalidInput(format!(
                "KDF time cost must be within 1..={}, got {}",
                Self::MAX_TIME_COST,
                self.time_cost
            )));
        }
        let min_memory = 8 * self.parallelism;
        if self.memory_cost < min_memory || self.memory_cost > Self::MAX_MEMORY_COST {
            return Err(Error::InvalidInput(format!(
                "KDF memory cost must be within {}..={} KiB, got {}",
                min_memory,
                Self::MAX_MEMORY_COST,
                self.memory_cost
            )));
        }
        Ok(())
    }

    fn to_argon2(&self) -> Result<Params> {
        self.validate()?;
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(KEY_LENGTH),
        )
        .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Derive a wrapping key from a password and salt using Argon2id.
///
/// # Postconditions
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - Returns error if password is empty
/// - Returns error if Argon2id parameters are invalid or out of bounds
pub fn derive_key(password: &[u8], salt: &Salt, params: &KdfParams) -> Result<WrappingKey> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(password, salt.as_bytes(), &mut key_bytes)
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(WrappingKey::from_bytes(key_bytes))
}

#[cfg(test)]
pub(crate) fn test_params() -> KdfParams {
    KdfParams {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}

//! Password-wrapped key files.
//!
//! A key file holds the account's [`DataKey`] sealed under a key derived
//! from the password. Changing the password only rewrites the key file;
//! documents stay encrypted under the same data key.
//!
//! # Format
//! ```text
//! magic "CKEY" | version (1) | memory_cost (4) | time_cost (4) | parallelism (4)
//!   | salt (32) | nonce (24) | sealed data key (32) | tag (16)
//! ```
//! Integers are little-endian. Everything before the nonce is authenticated
//! as associated data, so the recorded KDF parameters cannot be altered.

use tracing::debug;

use crate::aead::{open, seal, NONCE_SIZE, TAG_SIZE};
use crate::kdf::{derive_key, KdfParams};
use crate::keys::{DataKey, Salt, KEY_LENGTH};
use coffer_common::Result;

/// Magic bytes at the start of every key file.
pub const KEY_FILE_MAGIC: &[u8; 4] = b"CKEY";

/// Key file format version.
pub const KEY_FILE_VERSION: u8 = 1;

const HEADER_SIZE: usize = 4 + 1 + 12 + 32;

/// Total size of a key file in bytes.
pub const KEY_FILE_SIZE: usize = HEADER_SIZE + NONCE_SIZE + KEY_LENGTH + TAG_SIZE;

/// Wrap `key` under `password`.
///
/// A fresh salt and nonce are generated on every call, so wrapping the same
/// key twice yields different blobs.
///
/// # Errors
/// - Password is empty
/// - KDF parameters are invalid or out of bounds
pub fn write_key_file(password: &[u8], key: &DataKey, params: &KdfParams) -> Result<Vec<u8>> {
    let salt = Salt::generate();
    let wrapping_key = derive_key(password, &salt, params)?;

    let mut blob = Vec::with_capacity(KEY_FILE_SIZE);
    blob.extend_from_slice(KEY_FILE_MAGIC);
    blob.push(KEY_FILE_VERSION);
    blob.extend_from_slice(&params.memory_cost.to_le_bytes());
    blob.extend_from_slice(&params.time_cost.to_le_bytes());
    blob.extend_from_slice(&params.parallelism.to_le_bytes());
    blob.extend_from_slice(salt.as_bytes());

    let sealed = seal(wrapping_key.as_bytes(), key.as_bytes(), &blob)?;
    blob.extend_from_slice(&sealed);

    Ok(blob)
}

/// Unwrap the data key stored in `blob`.
///
/// Returns `None` when the password is wrong or the blob is damaged;
/// a key is only returned after its authentication tag verifies.
pub fn read_key_file(password: &[u8], blob: &[u8]) -> Option<DataKey> {
    if blob.len() != KEY_FILE_SIZE {
        debug!(len = blob.len(), "Key file has unexpected size");
        return None;
    }

    let (header, sealed) = blob.split_at(HEADER_SIZE);
    if &header[..4] != KEY_FILE_MAGIC || header[4] != KEY_FILE_VERSION {
        debug!("Key file has unknown magic or version");
        return None;
    }

    let params = KdfParams {
        memory_cost: read_u32(&header[5..9]),
        time_cost: read_u32(&header[9..13]),
        parallelism: read_u32(&header[13..17]),
    };
    // The header is only authenticated after derivation, so the costs must be
    // bounded first.
    if let Err(e) = params.validate() {
        debug!(error = %e, "Key file records out-of-range KDF parameters");
        return None;
    }
    let mut salt = [0u8; 32];
    salt.copy_from_slice(&header[17..49]);

    let wrapping_key = match derive_key(password, &Salt::from_bytes(salt), &params) {
        Ok(key) => key,
        Err(e) => {
            debug!(error = %e, "Key derivation failed while reading key file");
            return None;
        }
    };

    let key_bytes = match open(wrapping_key.as_bytes(), sealed, header) {
        Ok(bytes) => coffer_common::SensitiveBytes::new(bytes),
        Err(_) => {
            debug!("Key file did not authenticate");
            return None;
        }
    };

    DataKey::from_slice(key_bytes.as_bytes()).ok()
}

/// Read the KDF parameters recorded in a key file without unwrapping it.
pub fn key_file_params(blob: &[u8]) -> Option<KdfParams> {
    if blob.len() < HEADER_SIZE || &blob[..4] != KEY_FILE_MAGIC {
        return None;
    }
    Some(KdfParams {
        memory_cost: read_u32(&blob[5..9]),
        time_cost: read_u32(&blob[9..13]),
        parallelism: read_u32(&blob[13..17]),
    })
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

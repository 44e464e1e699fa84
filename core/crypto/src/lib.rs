//! Cryptographic primitives for Coffer.
//!
//! This module provides:
//! - Key derivation using Argon2id
//! - Authenticated encryption using XChaCha20-Poly1305
//! - Password-wrapped key files
//! - Self-delimiting streaming encryption
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Wrong passwords and tampered data are reported, never decrypted to garbage

pub mod aead;
pub mod kdf;
pub mod keyfile;
pub mod keys;
pub mod stream;

pub use aead::{decrypt, encrypt};
pub use kdf::{derive_key, KdfParams};
pub use keyfile::{read_key_file, write_key_file};
pub use keys::{DataKey, Salt, WrappingKey};
pub use stream::{decrypt_bytes, encrypt_bytes, DecryptingStream, EncryptingStream};

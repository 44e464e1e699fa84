//! Common utilities and types shared across Coffer modules.
//!
//! This module provides the error type every crate reports through, plus the
//! key and path types that flow between the codec, storage and store layers.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Key, Reference, SensitiveBytes, StorePath};

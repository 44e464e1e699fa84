//! Storage provider abstraction for Coffer.
//!
//! Providers store opaque byte blobs under [`coffer_common::StorePath`]s.
//! All operations are blocking; callers run them off any UI thread.
//!
//! # Design Principles
//! - Atomic replace: a write either fully lands or leaves the old value
//! - Provider isolation: no encryption or encoding logic lives here
//! - Temp files from interrupted writes are never reported as entries

pub mod local;
pub mod memory;
pub mod provider;

pub use local::LocalProvider;
pub use memory::MemoryProvider;
pub use provider::{Metadata, StorageProvider, TEMP_SUFFIX};

//! Encrypted, password-protected, sorted document store.
//!
//! This crate provides:
//! - [`Directory`]: encrypted key to document storage with buffered writes
//! - [`ChunkedIndex`]: a sorted, range-queryable collection split into chunks
//! - [`Account`]: the password-protected root that hands out directories
//! - [`StoreWorker`]: runs one store on a dedicated thread
//!
//! # Concurrency
//! Directories and indexes are single-writer and not internally
//! synchronized. Share them through a [`StoreWorker`].

pub mod account;
pub mod config;
pub mod directory;
pub mod index;
pub mod naming;
pub mod worker;

pub use account::Account;
pub use config::{IndexSettings, StoreConfig, StoreVersion, WorkerConfig};
pub use directory::Directory;
pub use index::ChunkedIndex;
pub use worker::{Durable, StoreWorker};

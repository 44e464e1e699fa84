//! Storage provider trait definition.

use chrono::{DateTime, Utc};

use coffer_common::{Result, StorePath};

/// Suffix of in-flight files written by [`StorageProvider::write_atomic`].
pub const TEMP_SUFFIX: &str = ".tmp";

/// Metadata for a stored object.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Name of the object (last path component).
    pub name: String,
    /// Size in bytes (None for directories).
    pub size: Option<u64>,
    /// Whether this is a directory.
    pub is_directory: bool,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// Storage provider trait for different backends.
///
/// Implementations must make [`write_atomic`](Self::write_atomic) all or
/// nothing: after a failure or crash the path holds either the previous
/// content or the new content, never a mix.
pub trait StorageProvider: Send + Sync {
    /// Get the provider name (e.g., "local", "memory").
    fn name(&self) -> &str;

    /// Read a file.
    ///
    /// # Returns
    /// `None` if no file exists at `path`.
    ///
    /// # Errors
    /// - Path is a directory
    /// - I/O errors
    fn read(&self, path: &StorePath) -> Result<Option<Vec<u8>>>;

    /// Replace the content at `path` atomically.
    ///
    /// # Preconditions
    /// - Parent directory must exist
    ///
    /// # Errors
    /// - Parent directory not found
    /// - I/O errors (the previous content is left intact)
    fn write_atomic(&self, path: &StorePath, data: &[u8]) -> Result<()>;

    /// Delete a file.
    ///
    /// # Returns
    /// Whether a file was removed.
    fn remove(&self, path: &StorePath) -> Result<bool>;

    /// Check if a path exists.
    fn exists(&self, path: &StorePath) -> Result<bool>;

    /// List contents of a directory, excluding in-flight temp files.
    ///
    /// # Errors
    /// - Directory not found
    fn list(&self, path: &StorePath) -> Result<Vec<Metadata>>;

    /// Create a directory and any missing parents.
    fn create_dir(&self, path: &StorePath) -> Result<()>;

    /// Remove temp files left in a directory by interrupted writes.
    ///
    /// # Returns
    /// Number of files removed.
    fn remove_temp_files(&self, path: &StorePath) -> Result<usize>;
}

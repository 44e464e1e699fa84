//! Common error types for Coffer.

use thiserror::Error;

/// Top-level error type for Coffer operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    ///
    /// Committed data that cannot be decrypted or decoded is reported here
    /// with kind [`std::io::ErrorKind::InvalidData`].
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A document was written or read out of schema order.
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not permitted.
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

impl Error {
    /// Build an I/O error for stored bytes that could not be interpreted.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message.into(),
        ))
    }

    /// Whether this error reports corrupted committed data.
    pub fn is_corrupted(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::InvalidData)
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupted_is_io_kind() {
        let err = Error::corrupted("bad frame");
        assert!(err.is_corrupted());
        assert!(matches!(err, Error::Io(_)));
        assert!(!Error::Syntax("x".to_string()).is_corrupted());
    }
}

//! Common types used throughout Coffer.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Opaque, orderable identifier for a stored item.
///
/// References are issued by the caller and are unique within a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reference(u64);

impl Reference {
    /// Create a reference from its raw value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The reference issued after this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Key of a document stored in a directory.
///
/// Either a numeric reference or a plain name for singleton documents
/// such as settings. All references order before all names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Reference(Reference),
    Name(String),
}

impl Key {
    /// Longest accepted name in bytes.
    ///
    /// Names are stored hex-encoded in a single file name, which must fit in
    /// [`StorePath::MAX_COMPONENT_LEN`] bytes.
    pub const MAX_NAME_LEN: usize = 124;

    /// Create a named key.
    ///
    /// # Errors
    /// - Returns error if the name is empty or longer than [`Self::MAX_NAME_LEN`]
    pub fn name(name: impl Into<String>) -> crate::Result<Self> {
        let key = Key::Name(name.into());
        key.validate()?;
        Ok(key)
    }

    /// Check that a named key can be persisted.
    ///
    /// # Errors
    /// - Returns error if the name is empty or longer than [`Self::MAX_NAME_LEN`]
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            Key::Reference(_) => Ok(()),
            Key::Name(name) if name.is_empty() => Err(crate::Error::InvalidInput(
                "Key name cannot be empty".to_string(),
            )),
            Key::Name(name) if name.len() > Self::MAX_NAME_LEN => {
                Err(crate::Error::InvalidInput(format!(
                    "Key name must be at most {} bytes, got {}",
                    Self::MAX_NAME_LEN,
                    name.len()
                )))
            }
            Key::Name(_) => Ok(()),
        }
    }

    /// Create a reference key.
    pub fn reference(value: u64) -> Self {
        Key::Reference(Reference::new(value))
    }
}

impl From<Reference> for Key {
    fn from(reference: Reference) -> Self {
        Key::Reference(reference)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Reference(r) => write!(f, "{}", r),
            Key::Name(n) => write!(f, "'{}'", n),
        }
    }
}

/// A path relative to the root of a storage provider.
///
/// This type represents logical locations (namespaces and documents),
/// not physical filesystem paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorePath {
    components: Vec<String>,
}

impl StorePath {
    /// Longest accepted component in bytes, the common filesystem limit.
    pub const MAX_COMPONENT_LEN: usize = 255;

    /// Create a root path.
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parse a path string into a StorePath.
    ///
    /// Uses '/' as separator.
    pub fn parse(path: &str) -> crate::Result<Self> {
        let path = path.trim_start_matches('/').trim_end_matches('/');
        if path.is_empty() {
            return Ok(Self::root());
        }

        let mut parsed = Self::root();
        for component in path.split('/') {
            parsed = parsed.join(component)?;
        }
        Ok(parsed)
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            let mut components = self.components.clone();
            components.pop();
            Some(Self { components })
        }
    }

    /// Get the last component.
    pub fn name(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }

    /// Join this path with a child component.
    ///
    /// # Errors
    /// - Component is empty, `.` or `..`
    /// - Component contains a path separator
    pub fn join(&self, child: &str) -> crate::Result<Self> {
        if child.is_empty() || child == "." || child == ".." {
            return Err(crate::Error::InvalidInput(format!(
                "Invalid path component: '{}'",
                child
            )));
        }
        if child.len() > Self::MAX_COMPONENT_LEN {
            return Err(crate::Error::InvalidInput(format!(
                "Path component must be at most {} bytes, got {}",
                Self::MAX_COMPONENT_LEN,
                child.len()
            )));
        }
        if child.contains('/') || child.contains('\\') {
            return Err(crate::Error::InvalidInput(
                "Path component cannot contain separators".to_string(),
            ));
        }
        let mut components = self.components.clone();
        components.push(child.to_string());
        Ok(Self { components })
    }

    /// Get the path components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Convert to a string representation.
    pub fn to_string_path(&self) -> String {
        format!("/{}", self.components.join("/"))
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_path())
    }
}

/// Sensitive data wrapper that zeroizes on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveBytes([REDACTED; {} bytes])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ordering() {
        let mut keys = vec![
            Key::name("settings").unwrap(),
            Key::reference(7),
            Key::name("accounts").unwrap(),
            Key::reference(2),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                Key::reference(2),
                Key::reference(7),
                Key::name("accounts").unwrap(),
                Key::name("settings").unwrap(),
            ]
        );
    }

    #[test]
    fn test_empty_key_name_fails() {
        assert!(Key::name("").is_err());
    }

    #[test]
    fn test_key_name_length_limit() {
        assert!(Key::name("x".repeat(Key::MAX_NAME_LEN)).is_ok());
        assert!(matches!(
            Key::name("x".repeat(Key::MAX_NAME_LEN + 1)),
            Err(crate::Error::InvalidInput(_))
        ));
        // Counted in bytes, not characters.
        assert!(Key::name("é".repeat(Key::MAX_NAME_LEN / 2)).is_ok());
        assert!(Key::name("é".repeat(Key::MAX_NAME_LEN / 2 + 1)).is_err());

        assert!(Key::Name("x".repeat(200)).validate().is_err());
        assert!(Key::Name(String::new()).validate().is_err());
        assert!(Key::reference(u64::MAX).validate().is_ok());
    }

    #[test]
    fn test_reference_next() {
        assert_eq!(Reference::new(41).next(), Reference::new(42));
    }

    #[test]
    fn test_store_path_root() {
        let path = StorePath::root();
        assert!(path.is_root());
        assert_eq!(path.to_string_path(), "/");
        assert_eq!(StorePath::parse("/").unwrap(), path);
    }

    #[test]
    fn test_store_path_parse() {
        let path = StorePath::parse("/goals/settings").unwrap();
        assert_eq!(path.components(), &["goals", "settings"]);
        assert_eq!(path.to_string_path(), "/goals/settings");
    }

    #[test]
    fn test_store_path_rejects_traversal() {
        assert!(StorePath::root().join("..").is_err());
        assert!(StorePath::root().join("a/b").is_err());
        assert!(StorePath::parse("/a/../b").is_err());
    }

    #[test]
    fn test_store_path_component_length_limit() {
        let longest = "a".repeat(StorePath::MAX_COMPONENT_LEN);
        assert!(StorePath::root().join(&longest).is_ok());
        assert!(matches!(
            StorePath::root().join(&format!("{}a", longest)),
            Err(crate::Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_store_path_parent_and_name() {
        let path = StorePath::parse("/a/b").unwrap();
        assert_eq!(path.name(), Some("b"));
        assert_eq!(path.parent().unwrap().to_string_path(), "/a");
    }

    #[test]
    fn test_sensitive_bytes_debug_redacted() {
        let bytes = SensitiveBytes::new(vec![1, 2, 3]);
        assert_eq!(format!("{:?}", bytes), "SensitiveBytes([REDACTED; 3 bytes])");
    }
}

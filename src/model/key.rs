//! Key type and key-to-object-name mapping

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Longest key accepted, in bytes. S3 caps object names at 1024 bytes and the
/// namespace prefix needs some of that room.
pub const MAX_KEY_LEN: usize = 1000;

/// A user-chosen identifier for an entry
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(String);

impl Key {
    /// Create a key, rejecting empty or unrepresentable names
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::InvalidKey("key must not be empty".into()));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(Error::InvalidKey(format!(
                "key is {} bytes, limit is {}",
                key.len(),
                MAX_KEY_LEN
            )));
        }
        if key.chars().any(char::is_control) {
            return Err(Error::InvalidKey(format!(
                "key {:?} contains control characters",
                key
            )));
        }
        Ok(Key(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anything a store operation accepts as a key
pub trait IntoKey {
    fn into_key(self) -> Result<Key>;
}

impl IntoKey for Key {
    fn into_key(self) -> Result<Key> {
        Ok(self)
    }
}

impl IntoKey for &Key {
    fn into_key(self) -> Result<Key> {
        Ok(self.clone())
    }
}

impl IntoKey for &str {
    fn into_key(self) -> Result<Key> {
        Key::new(self)
    }
}

impl IntoKey for String {
    fn into_key(self) -> Result<Key> {
        Key::new(self)
    }
}

impl IntoKey for &String {
    fn into_key(self) -> Result<Key> {
        Key::new(self.as_str())
    }
}

/// Maps keys to backend object names under a fixed namespace prefix.
///
/// The object name is `"{namespace}/{key}"`. The namespace holds no `/`, so
/// its prefix never overlaps another namespace's. With the key appended
/// verbatim, the mapping is injective and [`Namespace::key_for`] is its exact
/// inverse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim_matches('/');
        if name.is_empty() {
            return Err(Error::Configuration("namespace must not be empty".into()));
        }
        if name.contains('/') {
            return Err(Error::Configuration(format!(
                "namespace {} must not contain '/'",
                name
            )));
        }
        Ok(Namespace {
            prefix: format!("{}/", name),
        })
    }

    /// The listing prefix, including the trailing slash
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn object_name(&self, key: &Key) -> String {
        format!("{}{}", self.prefix, key.as_str())
    }

    /// Reverse mapping; `None` for names outside this namespace
    pub fn key_for(&self, object_name: &str) -> Option<Key> {
        object_name
            .strip_prefix(&self.prefix)
            .and_then(|rest| Key::new(rest).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected() {
        let err = Key::new("").unwrap_err();
        assert!(matches!(err, Error::InvalidKey(_)));
    }

    #[test]
    fn test_control_chars_rejected() {
        assert!(Key::new("bad\nkey").is_err());
        assert!(Key::new("bad\0key").is_err());
    }

    #[test]
    fn test_long_key_rejected() {
        assert!(Key::new("k".repeat(MAX_KEY_LEN)).is_ok());
        assert!(Key::new("k".repeat(MAX_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn test_object_name_roundtrip() {
        let ns = Namespace::new("alice").unwrap();
        for raw in ["my_name", "runs/2024/loss", "with space", "ünïcode"] {
            let key = Key::new(raw).unwrap();
            let name = ns.object_name(&key);
            assert!(name.starts_with("alice/"));
            assert_eq!(ns.key_for(&name), Some(key));
        }
    }

    #[test]
    fn test_foreign_names_ignored() {
        let ns = Namespace::new("alice").unwrap();
        assert_eq!(ns.key_for("bob/my_name"), None);
        assert_eq!(ns.key_for("alice"), None);
        assert_eq!(ns.key_for("alice/"), None);
    }

    #[test]
    fn test_namespace_slashes_trimmed() {
        let ns = Namespace::new("/alice/").unwrap();
        assert_eq!(ns.prefix(), "alice/");
        assert!(Namespace::new("//").is_err());
    }

    #[test]
    fn test_nested_namespace_rejected() {
        assert!(matches!(
            Namespace::new("alice/runs"),
            Err(Error::Configuration(_))
        ));

        // "a" with key "b/k" must not reach objects of another namespace
        let ns = Namespace::new("a").unwrap();
        assert_eq!(ns.object_name(&Key::new("b/k").unwrap()), "a/b/k");
        assert!(Namespace::new("a/b").is_err());
    }
}

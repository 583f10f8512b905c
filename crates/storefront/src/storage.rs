//! Client-durable key/value storage.
//!
//! The local cart, the authentication-permission marker and the current user
//! identity each live under their own key. Values are written wholesale on
//! every change (last writer wins).
//!
//! # Backends
//!
//! - [`FileStore`] - One JSON file per key under a data directory (the CLI)
//! - [`MemoryStore`] - Process-local map, shared between clones (tests, embedding)

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

/// Storage keys.
pub mod keys {
    /// Key for the serialized local cart.
    pub const CART: &str = "cart";

    /// Key for the authentication-permission marker.
    pub const AUTH_PERMISSION: &str = "auth_permission";

    /// Key for the current user identity.
    pub const CURRENT_USER: &str = "current_user";
}

/// Errors that can occur when reading or writing client storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error on {key}: {source}")]
    Io {
        /// Storage key being accessed.
        key: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A value could not be serialized before writing.
    #[error("failed to serialize {key}: {source}")]
    Serialize {
        /// Storage key being written.
        key: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The key contains characters that cannot be stored.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}

/// A client-durable key/value store.
///
/// Implementations must make `set` durable before returning.
pub trait KeyValueStore {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the value stored under `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// FileStore
// =============================================================================

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a file store rooted at `dir`. The directory is created lazily
    /// on the first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let io_err = |source| StorageError::Io {
            key: key.to_owned(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(io_err)?;

        // Write-then-rename so a crash never leaves a truncated value behind
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(io_err)?;
        std::fs::rename(&tmp, &path).map_err(io_err)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-memory store. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> T {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut entries)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.with_entries(|entries| entries.get(key).cloned()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.with_entries(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.with_entries(|entries| {
            entries.remove(key);
        });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("data"));

        assert_eq!(store.get(keys::CART).unwrap(), None);

        store.set(keys::CART, "[]").unwrap();
        assert_eq!(store.get(keys::CART).unwrap().as_deref(), Some("[]"));

        store.set(keys::CART, "[1]").unwrap();
        assert_eq!(store.get(keys::CART).unwrap().as_deref(), Some("[1]"));

        store.remove(keys::CART).unwrap();
        assert_eq!(store.get(keys::CART).unwrap(), None);
    }

    #[test]
    fn test_file_store_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.remove(keys::CURRENT_USER).is_ok());
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let result = store.set("../escape", "x");
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_memory_store_clones_share_state() {
        let store = MemoryStore::new();
        let clone = store.clone();

        store.set(keys::AUTH_PERMISSION, "granted").unwrap();
        assert_eq!(
            clone.get(keys::AUTH_PERMISSION).unwrap().as_deref(),
            Some("granted")
        );

        clone.remove(keys::AUTH_PERMISSION).unwrap();
        assert_eq!(store.get(keys::AUTH_PERMISSION).unwrap(), None);
    }
}

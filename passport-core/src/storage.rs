//! Key/value persistence seams for durable and session-scoped state.
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("value could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("storage backend rejected the request: {0}")]
    Backend(String),
}

/// String key/value storage, shaped after browser local/session storage.
///
/// Platform layers provide the implementation; the engine only ever reads
/// and writes whole values.
pub trait KeyValueStore {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// In-memory store; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.borrow().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

/// Directory-backed store writing one `<key>.json` file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{file}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Session-scoped one-shot flags such as "welcome banner already shown".
#[derive(Debug, Clone)]
pub struct SessionFlags<S> {
    store: S,
}

impl<S: KeyValueStore> SessionFlags<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Whether the flag was raised earlier in this session. Read failures
    /// count as "not raised".
    #[must_use]
    pub fn is_set(&self, key: &str) -> bool {
        match self.store.get(key) {
            Ok(value) => value.is_some_and(|v| !v.is_empty()),
            Err(err) => {
                log::warn!("session flag `{key}` unreadable: {err}");
                false
            }
        }
    }

    /// Raise a flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    pub fn set(&self, key: &str) -> Result<(), StorageError> {
        self.store.set(key, "true")
    }

    pub const fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "passport-store-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[test]
    fn memory_store_clones_share_values() {
        let store = MemoryStore::new();
        let twin = store.clone();
        store.set("k", "v").unwrap();
        assert_eq!(twin.get("k").unwrap().as_deref(), Some("v"));
        twin.remove("k").unwrap();
        assert!(store.is_empty());
        twin.remove("k").unwrap();
    }

    #[test]
    fn file_store_roundtrips_and_tolerates_missing_keys() {
        let root = temp_root("roundtrip");
        let store = FileStore::new(&root);
        assert!(store.get("tw_odyssey_stamps").unwrap().is_none());
        store.set("tw_odyssey_stamps", "[\"a\"]").unwrap();
        assert_eq!(
            store.get("tw_odyssey_stamps").unwrap().as_deref(),
            Some("[\"a\"]")
        );
        assert!(root.join("tw_odyssey_stamps.json").exists());
        store.remove("tw_odyssey_stamps").unwrap();
        store.remove("tw_odyssey_stamps").unwrap();
        assert!(store.get("tw_odyssey_stamps").unwrap().is_none());
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn file_store_sanitizes_key_names() {
        let store = FileStore::new("/tmp/passport");
        assert_eq!(
            store.path_for("../escape/me"),
            PathBuf::from("/tmp/passport/___escape_me.json")
        );
    }

    #[test]
    fn session_flags_raise_once() {
        let flags = SessionFlags::new(MemoryStore::new());
        assert!(!flags.is_set("welcome"));
        flags.set("welcome").unwrap();
        assert!(flags.is_set("welcome"));
        assert!(flags.store().contains("welcome"));
    }
}

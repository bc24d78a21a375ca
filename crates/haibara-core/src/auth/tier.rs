//! Storage tiers backing the token store.
//!
//! A tier is a tiny string key/value store. Reads and writes are synchronous
//! and atomic per key; removing a missing key is not an error.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

/// Keychain service name used by [`KeyringTier`]
const KEYRING_SERVICE: &str = "haibara";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

pub trait StorageTier: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process tier. Lives as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageTier for MemoryTier {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileTier {
    dir: PathBuf,
}

impl FileTier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Create the directory if needed and restrict it to the current user.
    ///
    /// Tightening the mode fails on a directory owned by someone else, so a
    /// pre-created shared directory is refused instead of written into.
    fn ensure_private_dir(&self) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.dir.clone(),
            source,
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

            std::fs::DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(&self.dir)
                .map_err(io_err)?;
            std::fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(0o700))
                .map_err(io_err)?;
        }

        #[cfg(not(unix))]
        std::fs::create_dir_all(&self.dir).map_err(io_err)?;

        Ok(())
    }
}

impl StorageTier for FileTier {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.entry_path(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.ensure_private_dir()?;
        let path = self.entry_path(key);

        // Temp file is created 0600 and renamed into place, so a reader never
        // sees a half-written record
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        tmp.write_all(value.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|source| StorageError::Io {
                path: tmp.path().to_path_buf(),
                source,
            })?;
        tmp.persist(&path).map_err(|e| StorageError::Io {
            path,
            source: e.error,
        })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.entry_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

/// OS keychain tier, one entry per key.
#[derive(Debug, Clone)]
pub struct KeyringTier {
    service: String,
}

impl KeyringTier {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl Default for KeyringTier {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageTier for KeyringTier {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entry = Entry::new(&self.service, key)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let entry = Entry::new(&self.service, key)?;
        entry.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let entry = Entry::new(&self.service, key)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => {
                debug!(key = key, "No keychain entry to remove");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_tier_set_get_remove() {
        let tier = MemoryTier::new();
        assert_eq!(tier.get("k").unwrap(), None);
        tier.set("k", "v1").unwrap();
        tier.set("k", "v2").unwrap();
        assert_eq!(tier.get("k").unwrap().as_deref(), Some("v2"));
        tier.remove("k").unwrap();
        tier.remove("k").unwrap();
        assert_eq!(tier.get("k").unwrap(), None);
    }

    #[test]
    fn test_file_tier_creates_directory_lazily() {
        let tmp = tempfile::tempdir().unwrap();
        let tier = FileTier::new(tmp.path().join("nested").join("session"));
        assert_eq!(tier.get("k").unwrap(), None);
        assert!(!tier.dir().exists());

        tier.set("k", r#"{"a":1}"#).unwrap();
        assert!(tier.dir().join("k.json").exists());
        assert_eq!(tier.get("k").unwrap().as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_file_tier_remove_missing_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let tier = FileTier::new(tmp.path());
        tier.remove("missing").unwrap();
        tier.set("k", "v").unwrap();
        tier.remove("k").unwrap();
        assert_eq!(tier.get("k").unwrap(), None);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_tier_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("haibara");
        let tier = FileTier::new(&dir);
        tier.set("k", "secret").unwrap();

        let file_mode = std::fs::metadata(dir.join("k.json")).unwrap().permissions().mode();
        let dir_mode = std::fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_tier_tightens_existing_directory() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("shared");
        std::fs::create_dir(&dir).unwrap();
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o777)).unwrap();

        FileTier::new(&dir).set("k", "secret").unwrap();
        let dir_mode = std::fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }
}

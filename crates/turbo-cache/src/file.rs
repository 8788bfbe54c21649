//! File-backed store, used as the durable backend.

use crate::memory::check_quota;
use crate::{CacheError, StoragePort};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockWriteGuard};

const STORE_FILE: &str = "store.json";

/// Key-value store persisted as a JSON map on disk.
///
/// Every mutation rewrites the file (via a temp file and rename), so the
/// contents survive process restarts.
#[derive(Debug)]
pub struct FileStore {
    name: String,
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl FileStore {
    /// Open (or create) the store inside `dir`.
    ///
    /// A corrupted store file is discarded and the store starts empty.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CacheError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            CacheError::OpenError(format!("cannot create {}: {}", dir.display(), e))
        })?;
        let path = dir.join(STORE_FILE);

        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, String>>(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "discarding corrupted store file");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(CacheError::OpenError(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "opened durable store");

        Ok(Self {
            name: format!("file:{}", dir.display()),
            path,
            entries: RwLock::new(entries),
            quota: None,
        })
    }

    /// Limit the store to `bytes` (sum of key and value lengths).
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, String>>, CacheError> {
        self.entries
            .write()
            .map_err(|_| CacheError::StoreError(format!("{}: lock poisoned", self.name)))
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Apply a mutation and persist it, rolling back memory if the disk write fails.
    fn mutate<F>(&self, f: F) -> Result<(), CacheError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> Result<(), CacheError>,
    {
        let mut entries = self.write()?;
        let before = entries.clone();
        f(&mut entries)?;
        if let Err(e) = self.flush(&entries) {
            *entries = before;
            return Err(e);
        }
        Ok(())
    }
}

impl StoragePort for FileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CacheError::StoreError(format!("{}: lock poisoned", self.name)))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.mutate(|entries| {
            check_quota(entries, key, value, self.quota)?;
            entries.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.mutate(|entries| {
            entries.remove(key);
            Ok(())
        })
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CacheError::StoreError(format!("{}: lock poisoned", self.name)))?;
        Ok(entries.keys().cloned().collect())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.mutate(|entries| {
            entries.clear();
            Ok(())
        })
    }
}

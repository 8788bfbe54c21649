//! In-memory store, used as the ephemeral backend and as a test fake.

use crate::{CacheError, StoragePort};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Default quota for a browser-style store: 5 MiB.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Key-value store held in process memory.
///
/// Contents vanish with the process, which is exactly the lifetime of a
/// browsing session.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    entries: RwLock<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    /// Create an unbounded store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(BTreeMap::new()),
            quota: None,
        }
    }

    /// Limit the store to `bytes` (sum of key and value lengths).
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Bytes currently held.
    pub fn used_bytes(&self) -> usize {
        self.read().map(|m| used_bytes(&m)).unwrap_or(0)
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Check if the store holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, String>>, CacheError> {
        self.entries
            .read()
            .map_err(|_| CacheError::StoreError(format!("{}: lock poisoned", self.name)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, String>>, CacheError> {
        self.entries
            .write()
            .map_err(|_| CacheError::StoreError(format!("{}: lock poisoned", self.name)))
    }
}

impl StoragePort for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.read()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut entries = self.write()?;
        check_quota(&entries, key, value, self.quota)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.write()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.read()?.keys().cloned().collect())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.write()?.clear();
        Ok(())
    }
}

pub(crate) fn used_bytes(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

/// Reject a write that would push the store past its quota.
pub(crate) fn check_quota(
    entries: &BTreeMap<String, String>,
    key: &str,
    value: &str,
    quota: Option<usize>,
) -> Result<(), CacheError> {
    let Some(limit) = quota else {
        return Ok(());
    };
    let replaced = entries.get(key).map(|old| key.len() + old.len()).unwrap_or(0);
    let needed = used_bytes(entries) - replaced + key.len() + value.len();
    if needed > limit {
        return Err(CacheError::CapacityExceeded {
            key: key.to_string(),
            needed,
            limit,
        });
    }
    Ok(())
}

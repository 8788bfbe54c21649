//! The storage port every cache writes through.

use crate::CacheError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two persistence backends a value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Survives process restarts ("stay signed in").
    Durable,
    /// Cleared when the browsing session ends.
    Ephemeral,
}

impl Backend {
    /// Get the backend name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Durable => "durable",
            Backend::Ephemeral => "ephemeral",
        }
    }

    /// The backend that mirrors this one.
    pub fn other(&self) -> Backend {
        match self {
            Backend::Durable => Backend::Ephemeral,
            Backend::Ephemeral => Backend::Durable,
        }
    }

    /// Pick the backend for a login.
    pub fn for_login(remember: bool) -> Backend {
        if remember {
            Backend::Durable
        } else {
            Backend::Ephemeral
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A string key-value store.
///
/// Implementations have overwrite semantics and no multi-key transactions.
/// A write that would exceed the store's quota must fail with
/// [`CacheError::CapacityExceeded`] and leave the previous value in place.
pub trait StoragePort: Send + Sync {
    /// Human-readable store name, used in logs.
    fn name(&self) -> &str;

    /// Get a value. Returns `None` if the key doesn't exist.
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Set a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Delete a value. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Get all keys in the store.
    fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Remove every key.
    fn clear(&self) -> Result<(), CacheError>;

    /// Check if a key exists.
    fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key)?.is_some())
    }
}

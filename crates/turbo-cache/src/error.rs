//! Cache error types.

use thiserror::Error;

/// Errors that can occur when reading from or writing to a storage backend.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Failed to open the store.
    #[error("Failed to open store: {0}")]
    OpenError(String),

    /// Failed to serialize value.
    #[error("Serialization error: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// Failed to perform store operation.
    #[error("Store operation failed: {0}")]
    StoreError(String),

    /// The backend rejected a write because its quota is exhausted.
    #[error("Capacity exceeded writing {key}: needs {needed} bytes, quota {limit}")]
    CapacityExceeded {
        /// Key being written.
        key: String,
        /// Bytes the store would hold after the write.
        needed: usize,
        /// Configured quota in bytes.
        limit: usize,
    },
}

impl CacheError {
    /// Check if the backend rejected the write for lack of space.
    pub fn is_capacity(&self) -> bool {
        matches!(self, CacheError::CapacityExceeded { .. })
    }
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::StoreError(e.to_string())
    }
}

/// A persisted blob could not be turned back into a record.
///
/// Callers treat this exactly like an absent record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The text is not a valid envelope or its payload has the wrong shape.
    #[error("malformed record: {0}")]
    Malformed(String),

    /// The envelope holds a different kind of record.
    #[error("expected a {expected} record, found {found}")]
    WrongKind {
        /// Kind the caller asked for.
        expected: &'static str,
        /// Kind stored in the envelope.
        found: String,
    },

    /// The envelope was written by an incompatible format version.
    #[error("unsupported record version {0}")]
    UnsupportedVersion(u32),

    /// The backend failed while reading the blob.
    #[error("record unreadable: {0}")]
    Unreadable(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Malformed(e.to_string())
    }
}

//! Safe serialization of records onto the storage backends.
//!
//! Every record is wrapped in a self-describing [`Envelope`] before it is
//! written. Oversized payloads are bounded at encode time, and a write the
//! backend rejects for lack of space is retried once with the record's
//! minimal form. None of this ever fails loudly: callers receive a
//! [`WriteOutcome`] carrying a warning instead.

use crate::{Backend, Backends, CacheError, DecodeError, StoragePort};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Current envelope format version.
pub const ENVELOPE_VERSION: u32 = 1;

/// A record type that can be persisted through the [`SafeSerializer`].
pub trait Persist: Serialize + DeserializeOwned + Clone {
    /// Record kind stored in the envelope.
    const KIND: &'static str;

    /// Replace any payload longer than `limit` bytes with a placeholder.
    ///
    /// Returns `true` if something was replaced.
    fn bound_payloads(&mut self, _limit: usize) -> bool {
        false
    }

    /// The smallest form of this record worth keeping when the backend is full.
    fn minimal(&self) -> Option<Self> {
        None
    }
}

/// Wrapper written around every persisted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Record kind, e.g. `"identity"`.
    pub kind: String,
    /// Format version.
    pub version: u32,
    /// When the blob was written (Unix timestamp).
    pub written_at: i64,
    /// The record itself.
    pub data: T,
}

/// Result of writing one record to one backend.
#[derive(Debug)]
pub enum WriteOutcome {
    /// Stored as given.
    Stored,
    /// The backend was full; the minimal form was stored instead.
    Reduced(CacheError),
    /// Nothing was stored.
    Skipped(CacheError),
}

impl WriteOutcome {
    /// Check if some form of the record reached the backend.
    pub fn is_stored(&self) -> bool {
        matches!(self, WriteOutcome::Stored | WriteOutcome::Reduced(_))
    }

    /// The non-fatal warning attached to this outcome, if any.
    pub fn warning(&self) -> Option<&CacheError> {
        match self {
            WriteOutcome::Stored => None,
            WriteOutcome::Reduced(e) | WriteOutcome::Skipped(e) => Some(e),
        }
    }
}

/// Outcomes of an ordered write to both backends.
#[derive(Debug)]
pub struct WriteReport {
    /// Backend written first.
    pub active: Backend,
    /// Outcome on the active backend.
    pub active_outcome: WriteOutcome,
    /// Outcome on the mirror backend.
    pub mirror_outcome: WriteOutcome,
}

impl WriteReport {
    /// Check if the record reached at least one backend.
    pub fn persisted(&self) -> bool {
        self.active_outcome.is_stored() || self.mirror_outcome.is_stored()
    }

    /// All warnings produced by the write.
    pub fn warnings(&self) -> impl Iterator<Item = &CacheError> {
        self.active_outcome
            .warning()
            .into_iter()
            .chain(self.mirror_outcome.warning())
    }
}

/// Encodes records into envelopes and writes them to storage.
#[derive(Debug, Clone, Copy)]
pub struct SafeSerializer {
    payload_limit: usize,
}

impl Default for SafeSerializer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAYLOAD_LIMIT)
    }
}

impl SafeSerializer {
    /// Default payload threshold: 100 kB.
    pub const DEFAULT_PAYLOAD_LIMIT: usize = 100_000;

    /// Create a serializer bounding payloads to `payload_limit` bytes.
    pub fn new(payload_limit: usize) -> Self {
        Self { payload_limit }
    }

    /// The payload threshold in bytes.
    pub fn payload_limit(&self) -> usize {
        self.payload_limit
    }

    /// Encode a record, bounding oversized payloads.
    pub fn encode<T: Persist>(&self, record: &T) -> Result<String, CacheError> {
        let mut bounded = record.clone();
        if bounded.bound_payloads(self.payload_limit) {
            tracing::debug!(kind = T::KIND, limit = self.payload_limit, "replaced oversized payload");
        }
        self.wrap(&bounded)
    }

    fn wrap<T: Persist>(&self, record: &T) -> Result<String, CacheError> {
        let envelope = Envelope {
            kind: T::KIND.to_string(),
            version: ENVELOPE_VERSION,
            written_at: chrono::Utc::now().timestamp(),
            data: record,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Decode a record previously produced by [`encode`](Self::encode).
    pub fn decode<T: Persist>(&self, text: &str) -> Result<T, DecodeError> {
        let envelope: Envelope<serde_json::Value> = serde_json::from_str(text)?;
        if envelope.kind != T::KIND {
            return Err(DecodeError::WrongKind {
                expected: T::KIND,
                found: envelope.kind,
            });
        }
        if envelope.version != ENVELOPE_VERSION {
            return Err(DecodeError::UnsupportedVersion(envelope.version));
        }
        Ok(serde_json::from_value(envelope.data)?)
    }

    /// Write a record to one store.
    ///
    /// A capacity rejection is retried once with [`Persist::minimal`].
    pub fn write<T: Persist>(&self, store: &dyn StoragePort, key: &str, record: &T) -> WriteOutcome {
        let text = match self.encode(record) {
            Ok(text) => text,
            Err(e) => return WriteOutcome::Skipped(e),
        };

        let err = match store.set(key, &text) {
            Ok(()) => {
                tracing::debug!(store = store.name(), key, bytes = text.len(), "record written");
                return WriteOutcome::Stored;
            }
            Err(e) => e,
        };

        if !err.is_capacity() {
            tracing::warn!(store = store.name(), key, error = %err, "write failed");
            return WriteOutcome::Skipped(err);
        }

        let Some(minimal) = record.minimal() else {
            tracing::warn!(store = store.name(), key, error = %err, "backend full, record skipped");
            return WriteOutcome::Skipped(err);
        };

        let retry = self
            .encode(&minimal)
            .and_then(|text| store.set(key, &text));
        match retry {
            Ok(()) => {
                tracing::warn!(store = store.name(), key, error = %err, "backend full, stored minimal record");
                WriteOutcome::Reduced(err)
            }
            Err(retry_err) => {
                tracing::warn!(store = store.name(), key, error = %retry_err, "backend full, minimal record skipped");
                WriteOutcome::Skipped(retry_err)
            }
        }
    }

    /// Write a record to the active backend, then to the mirror.
    pub fn write_ordered<T: Persist>(&self, backends: &Backends, key: &str, record: &T) -> WriteReport {
        let [active, mirror] = backends.write_order();
        let active_outcome = self.write(backends.store(active), key, record);
        let mirror_outcome = self.write(backends.store(mirror), key, record);
        WriteReport {
            active,
            active_outcome,
            mirror_outcome,
        }
    }

    /// Read a record from one store.
    pub fn read<T: Persist>(&self, store: &dyn StoragePort, key: &str) -> Result<Option<T>, DecodeError> {
        let text = store
            .get(key)
            .map_err(|e| DecodeError::Unreadable(e.to_string()))?;
        text.map(|text| self.decode(&text)).transpose()
    }

    /// Read a record, preferring the active backend.
    ///
    /// The first backend holding the key decides the result.
    pub fn read_first<T: Persist>(
        &self,
        backends: &Backends,
        key: &str,
    ) -> Result<Option<(Backend, T)>, DecodeError> {
        for backend in backends.write_order() {
            if let Some(record) = self.read(backends.store(backend), key)? {
                return Ok(Some((backend, record)));
            }
        }
        Ok(None)
    }
}

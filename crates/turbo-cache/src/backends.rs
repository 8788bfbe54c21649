//! The durable/ephemeral backend pair.

use crate::memory::MemoryStore;
use crate::{Backend, CacheError, StoragePort};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared handle to both storage backends.
///
/// Cloning is cheap and every clone sees the same active backend, so the
/// identity, favorites and cart caches can each hold one. Writes always go
/// to the active backend first and the mirror second.
#[derive(Clone)]
pub struct Backends {
    durable: Arc<dyn StoragePort>,
    ephemeral: Arc<dyn StoragePort>,
    durable_active: Arc<AtomicBool>,
}

impl Backends {
    /// Pair two stores. The ephemeral backend starts out active.
    pub fn new(durable: Arc<dyn StoragePort>, ephemeral: Arc<dyn StoragePort>) -> Self {
        Self {
            durable,
            ephemeral,
            durable_active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Two unbounded in-memory stores.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new("durable")),
            Arc::new(MemoryStore::new("ephemeral")),
        )
    }

    /// The backend currently holding the credential.
    pub fn active(&self) -> Backend {
        if self.durable_active.load(Ordering::SeqCst) {
            Backend::Durable
        } else {
            Backend::Ephemeral
        }
    }

    /// Make `backend` the one written first.
    pub fn set_active(&self, backend: Backend) {
        self.durable_active
            .store(backend == Backend::Durable, Ordering::SeqCst);
    }

    /// Get the store for a backend.
    pub fn store(&self, backend: Backend) -> &dyn StoragePort {
        match backend {
            Backend::Durable => self.durable.as_ref(),
            Backend::Ephemeral => self.ephemeral.as_ref(),
        }
    }

    /// Active backend first, mirror second.
    pub fn write_order(&self) -> [Backend; 2] {
        let active = self.active();
        [active, active.other()]
    }

    /// Read a raw value, preferring the active backend.
    pub fn read_first(&self, key: &str) -> Result<Option<(Backend, String)>, CacheError> {
        for backend in self.write_order() {
            if let Some(text) = self.store(backend).get(key)? {
                return Ok(Some((backend, text)));
            }
        }
        Ok(None)
    }

    /// Delete `key` from both backends.
    ///
    /// Both deletes are attempted; the first failure is returned.
    pub fn remove_everywhere(&self, key: &str) -> Result<(), CacheError> {
        let mut first_err = None;
        for backend in self.write_order() {
            if let Err(e) = self.store(backend).delete(key) {
                tracing::warn!(backend = %backend, key, error = %e, "delete failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// End the browsing session: the ephemeral backend forgets everything.
    pub fn end_session(&self) -> Result<(), CacheError> {
        tracing::info!("ending browsing session, clearing ephemeral store");
        self.ephemeral.clear()?;
        self.set_active(Backend::Ephemeral);
        Ok(())
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("durable", &self.durable.name())
            .field("ephemeral", &self.ephemeral.name())
            .field("active", &self.active())
            .finish()
    }
}

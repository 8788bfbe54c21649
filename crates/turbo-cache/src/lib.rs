//! Dual-backend persistence layer for TurboCommerce client state.
//!
//! Client state lives in two independent key-value stores: a durable one that
//! survives restarts and an ephemeral one scoped to the browsing session.
//! This crate provides the [`StoragePort`] both are accessed through, the
//! [`Backends`] pair that orders writes between them, and the
//! [`SafeSerializer`] that turns records into self-describing text blobs.
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_cache::{Backends, Backend, SafeSerializer};
//!
//! let backends = Backends::in_memory();
//! backends.set_active(Backend::Durable);
//!
//! let serializer = SafeSerializer::default();
//! let report = serializer.write_ordered(&backends, &cache_key!("cart", "guest"), &lines);
//! assert!(report.persisted());
//! ```

mod backends;
mod codec;
mod credential;
mod error;
mod file;
mod memory;
mod port;

pub use backends::Backends;
pub use codec::{Envelope, Persist, SafeSerializer, WriteOutcome, WriteReport, ENVELOPE_VERSION};
pub use credential::Credential;
pub use error::{CacheError, DecodeError};
pub use file::FileStore;
pub use memory::{MemoryStore, DEFAULT_QUOTA_BYTES};
pub use port::{Backend, StoragePort};

/// Key of the persisted identity record.
pub const IDENTITY_KEY: &str = "identity";

/// Key of the persisted credential.
pub const CREDENTIAL_KEY: &str = "credential";

/// Helper to build cache keys with namespacing.
///
/// # Example
///
/// ```rust,ignore
/// let key = cache_key!("favorites", namespace);
/// // Returns "favorites:guest"
/// ```
#[macro_export]
macro_rules! cache_key {
    ($prefix:expr, $($part:expr),+) => {{
        let mut key = String::from($prefix);
        $(
            key.push(':');
            key.push_str(&$part.to_string());
        )+
        key
    }};
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Backend, Backends, CacheError, Credential, DecodeError, Persist, SafeSerializer,
        StoragePort, WriteOutcome,
    };
}

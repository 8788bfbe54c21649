//! # TurboCommerce client state
//!
//! Keeps a shopper's identity, session credential, favorites and cart
//! consistent across two key-value storage backends (durable and
//! ephemeral) and a remote profile/favorites service.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use turbo_client::prelude::*;
//!
//! let config = ClientConfig::load("client.toml")?;
//! let mut state = ClientState::open(&config)?;
//! state.initialize();
//!
//! state.add_to_cart(&ProductId::new("layton"), QualityTier::Top)?;
//! state.toggle_favorite(&ProductId::new("haltane")).await;
//!
//! state.login(server_profile, &token, true)?;
//! state.reconcile().await?;
//!
//! let snapshot = state.snapshot();
//! println!("{} items, total {:?}", snapshot.item_count, snapshot.total);
//! ```
//!
//! ## Crates
//!
//! - `turbo-cache`: storage backends and the safe serializer
//! - `turbo-data`: the reconciliation client
//! - `turbo-commerce`: favorites, cart and the price table
//! - `turbo-auth`: the identity cache

mod config;
mod error;
mod events;
mod snapshot;
mod state;

pub use config::{ClientConfig, RemoteConfig, StorageConfig};
pub use error::ClientError;
pub use events::{Notice, StateEvent, StateListener};
pub use snapshot::Snapshot;
pub use state::ClientState;

// Re-export the building blocks
pub use turbo_auth;
pub use turbo_cache;
pub use turbo_commerce;
pub use turbo_data;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{ClientConfig, ClientError, ClientState, Notice, Snapshot, StateEvent, StateListener};

    pub use turbo_auth::{AuthError, AuthPhase, ClientProfile, IdentityRecord, IdentityShape, UploadResult};
    pub use turbo_cache::{Backend, Backends, SafeSerializer};
    pub use turbo_commerce::{Catalog, Money, Namespace, ProductId, QualityTier};
    pub use turbo_data::{ReconciliationClient, ServerProfile};
}

//! Reconciliation client for TurboCommerce client state.
//!
//! The remote profile/favorites service is the source of truth for a signed-in
//! user. This crate defines the [`ReconciliationClient`] contract the caches
//! depend on, the wire types the service speaks, and an HTTP implementation
//! that sends JSON requests through a host-provided [`Transport`].
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_data::{HttpReconciliationClient, ReconciliationClient};
//!
//! let client = HttpReconciliationClient::new("https://api.example.com", transport);
//!
//! let profile = client.fetch_profile(&credential).await?;
//! let favorites = client.fetch_favorites(&credential).await?;
//! let toggle = client.toggle_favorite(&credential, "layton").await?;
//! ```

mod client;
mod error;
mod http;
mod wire;

pub use client::{HttpReconciliationClient, ReconciliationClient};
pub use error::RemoteError;
pub use http::{HttpRequest, HttpResponse, Method, Transport};
pub use wire::{FavoriteToggle, ServerProfile};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{FavoriteToggle, ReconciliationClient, RemoteError, ServerProfile};
}

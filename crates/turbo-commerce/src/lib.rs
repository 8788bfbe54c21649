//! Favorites and cart caches for TurboCommerce client state.
//!
//! Both caches partition their data by [`Namespace`]: one per signed-in
//! identity plus a shared guest partition. They read and write through a
//! [`turbo_cache::SafeSerializer`] onto both storage backends.
//!
//! - **Favorites**: favorited products, copied from guest to user on login
//! - **Cart**: priced line items, swapped (never merged) on login/logout
//! - **Catalog**: the static price table the cart prices lines from
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_commerce::prelude::*;
//!
//! let backends = Backends::in_memory();
//! let mut cart = Cart::new(backends.clone(), SafeSerializer::default(), Arc::new(Catalog::default()));
//!
//! cart.add_item(&ProductId::new("layton"), QualityTier::Top)?;
//! cart.add_item(&ProductId::new("layton"), QualityTier::Top)?;
//! println!("{} items, total {}", cart.item_count(), cart.total()?.display());
//!
//! let mut favorites = Favorites::new(backends, SafeSerializer::default());
//! favorites.toggle_local(&ProductId::new("haltane"), "Haltane");
//! favorites.on_login(Namespace::for_email("jane@example.com"));
//! ```

pub mod error;
pub mod ids;
pub mod money;
pub mod namespace;

pub mod cart;
pub mod catalog;
pub mod favorites;

pub use cart::{Cart, CartLine, MAX_QUANTITY_PER_LINE};
pub use catalog::{Catalog, CatalogEntry, PriceQuote, QualityTier};
pub use error::CommerceError;
pub use favorites::{FavoriteEntry, FavoriteSet, FavoriteSource, Favorites, MigrationOutcome, ToggleOutcome};
pub use ids::*;
pub use money::{Currency, Money};
pub use namespace::Namespace;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::CommerceError;
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};
    pub use crate::namespace::Namespace;

    // Price table
    pub use crate::catalog::{Catalog, CatalogEntry, QualityTier};

    // Caches
    pub use crate::cart::{Cart, CartLine};
    pub use crate::favorites::{FavoriteEntry, Favorites, MigrationOutcome, ToggleOutcome};
}

//! What the UI renderer reads after every change.

use serde::Serialize;
use turbo_auth::{AuthPhase, IdentityRecord};
use turbo_commerce::{CartLine, FavoriteEntry, Money, Namespace};

/// A consistent view of the client state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Identity cache phase.
    pub phase: AuthPhase,
    /// The signed-in identity.
    pub identity: Option<IdentityRecord>,
    /// The active namespace.
    pub namespace: Namespace,
    /// Favorites of the active namespace.
    pub favorites: Vec<FavoriteEntry>,
    /// Cart lines of the active namespace.
    pub cart: Vec<CartLine>,
    /// Sum of cart quantities.
    pub item_count: i64,
    /// Cart total. `None` if it overflowed.
    pub total: Option<Money>,
}

impl Snapshot {
    /// Check if an identity is active.
    pub fn is_logged_in(&self) -> bool {
        self.identity.is_some()
    }
}

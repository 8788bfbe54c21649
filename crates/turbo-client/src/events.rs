//! Change notifications for the UI renderer.

use crate::snapshot::Snapshot;

/// What changed.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    /// Sign in, sign out, restore or profile update.
    IdentityChanged,
    /// The active favorite set changed.
    FavoritesChanged,
    /// The active cart changed.
    CartChanged,
    /// A transient message for the user.
    Notice(Notice),
}

/// A user-visible warning.
///
/// Only validation and network failures produce notices. Stale or corrupt
/// persisted data is recovered silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Input was rejected.
    Validation(String),
    /// The remote service could not be reached; cached data is shown.
    Network(String),
}

/// Receives [`StateEvent`]s together with the state after the change.
pub trait StateListener: Send + Sync {
    /// Called after every change.
    fn on_state_event(&self, event: &StateEvent, snapshot: &Snapshot);
}

//! Notifications for collaborators that render identity state.

use crate::identity::IdentityRecord;

/// A change to the signed-in identity.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// A user signed in or a persisted session was restored.
    SignedIn(IdentityRecord),
    /// The signed-in user's record changed.
    Updated(IdentityRecord),
    /// Identity data was cleared.
    SignedOut,
}

/// Receives [`AuthEvent`]s from an [`AuthState`](crate::AuthState).
pub trait AuthListener: Send + Sync {
    /// Called after every successful state change.
    fn on_auth_event(&self, event: &AuthEvent);
}

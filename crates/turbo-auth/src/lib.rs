//! Identity cache for TurboCommerce.
//!
//! Holds the signed-in user's identity record and session credential,
//! validates and normalizes identity input from either naming convention,
//! detects and purges stale persisted state, and reconciles with the
//! profile service.

mod error;
mod events;
mod identity;
mod state;

pub use error::{AuthError, StaleReason, ValidationError};
pub use events::{AuthEvent, AuthListener};
pub use identity::{validate, AvatarRef, ClientProfile, IdentityRecord, IdentityShape, PLACEHOLDER_TOKEN};
pub use state::{AuthPhase, AuthState, RefreshOutcome, UploadResult};

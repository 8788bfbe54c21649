//! Per-identity partitions of favorites and cart data.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical partition of client data, keyed by the active identity.
///
/// Signed-in users get a namespace derived from their email; everyone else
/// shares the reserved [`Namespace::GUEST`] partition. An email always
/// contains `@`, so it can never collide with the guest sentinel.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// The guest sentinel.
    pub const GUEST: &'static str = "guest";

    /// The guest namespace.
    pub fn guest() -> Self {
        Self(Self::GUEST.to_string())
    }

    /// Namespace for an identity's email (case-insensitive).
    pub fn for_email(email: &str) -> Self {
        Self(email.trim().to_lowercase())
    }

    /// Namespace for an optional identity; `None` means guest.
    pub fn for_identity(email: Option<&str>) -> Self {
        match email {
            Some(email) if !email.trim().is_empty() => Self::for_email(email),
            _ => Self::guest(),
        }
    }

    /// Check if this is the guest namespace.
    pub fn is_guest(&self) -> bool {
        self.0 == Self::GUEST
    }

    /// Get the namespace as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::guest()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

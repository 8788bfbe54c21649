//! Session credential.

use crate::codec::Persist;
use crate::Backend;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque bearer token and the backend it was written to.
///
/// `subject` names the identity the token was issued for, so a credential
/// left over from an earlier sign-in never pairs with a newer identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    token: String,
    backend: Backend,
    #[serde(default)]
    subject: String,
}

impl Credential {
    /// Create a new credential.
    pub fn new(token: impl Into<String>, backend: Backend) -> Self {
        Self {
            token: token.into(),
            backend,
            subject: String::new(),
        }
    }

    /// Bind the credential to the identity it was issued for.
    pub fn for_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// The identity this credential belongs to. Empty if never bound.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Check if this credential was issued for `subject`.
    pub fn belongs_to(&self, subject: &str) -> bool {
        !self.subject.is_empty() && self.subject == subject
    }

    /// The bearer token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The backend holding this credential.
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Check if the token is blank.
    pub fn is_blank(&self) -> bool {
        self.token.trim().is_empty()
    }

    /// Record which backend the credential was actually read from.
    pub fn located_in(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }
}

// Tokens never reach logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("backend", &self.backend)
            .field("subject", &self.subject)
            .finish()
    }
}

impl Persist for Credential {
    const KIND: &'static str = "credential";
}

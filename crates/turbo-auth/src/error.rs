//! Authentication errors.

use thiserror::Error;
use turbo_cache::DecodeError;
use turbo_data::RemoteError;

/// Identity input that cannot be turned into an [`IdentityRecord`](crate::IdentityRecord).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No email was supplied.
    #[error("email is required")]
    MissingEmail,

    /// The email is not of the form `local@domain.tld`.
    #[error("malformed email: {0}")]
    MalformedEmail(String),

    /// The login response carried no token.
    #[error("credential token is empty")]
    MissingCredential,
}

/// Why persisted identity data was judged stale.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StaleReason {
    /// An identity record exists but no credential does.
    #[error("identity record without credential")]
    IdentityWithoutCredential,

    /// A credential exists but no identity record does.
    #[error("credential without identity record")]
    CredentialWithoutIdentity,

    /// The stored credential is empty.
    #[error("blank credential")]
    BlankCredential,

    /// The stored credential was issued for a different identity.
    #[error("credential issued for {credential_subject:?}, identity is {identity:?}")]
    CredentialMismatch {
        credential_subject: String,
        identity: String,
    },

    /// A stored blob could not be decoded.
    #[error("undecodable {kind}: {source}")]
    Undecodable {
        kind: &'static str,
        source: DecodeError,
    },

    /// The stored record no longer validates.
    #[error("invalid identity record: {0}")]
    Invalid(ValidationError),
}

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Identity input failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Persisted identity data was stale and has been purged.
    #[error("stale identity data: {0}")]
    StaleState(StaleReason),

    /// The operation needs a signed-in identity.
    #[error("not logged in")]
    NotLoggedIn,

    /// Remote service call failed.
    #[error("network error: {0}")]
    Network(#[from] RemoteError),

    /// Cache error.
    #[error("cache error: {0}")]
    Cache(#[from] turbo_cache::CacheError),
}

impl AuthError {
    /// Check if this is an authentication failure.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            AuthError::NotLoggedIn => true,
            AuthError::Network(e) => e.is_auth_failure(),
            _ => false,
        }
    }

    /// Check if the user should not be told about this error.
    ///
    /// Stale data and storage failures are recoverable inconsistencies the
    /// user did not cause; they surface only as a signed-out UI.
    pub fn is_silent(&self) -> bool {
        matches!(self, AuthError::StaleState(_) | AuthError::Cache(_))
    }

    /// Check if this is a network-class failure.
    pub fn is_network(&self) -> bool {
        matches!(self, AuthError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let validation = AuthError::from(ValidationError::MissingEmail);
        assert!(!validation.is_silent());
        assert!(!validation.is_network());

        let stale = AuthError::StaleState(StaleReason::IdentityWithoutCredential);
        assert!(stale.is_silent());

        let network = AuthError::from(RemoteError::Timeout);
        assert!(network.is_network());
        assert!(!network.is_auth_failure());

        let unauthorized = AuthError::from(RemoteError::Http {
            status: 401,
            message: "expired".to_string(),
        });
        assert!(unauthorized.is_auth_failure());
    }
}

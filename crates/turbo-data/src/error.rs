//! Reconciliation client error types.

use thiserror::Error;

/// Errors that can occur when talking to the remote service.
///
/// Every variant is a network-class failure: callers keep their cached state
/// and surface a warning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The request never produced a response.
    #[error("Request failed: {0}")]
    Transport(String),

    /// HTTP error response.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Failed to parse response body.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Request timeout.
    #[error("Request timed out")]
    Timeout,

    /// The service is not configured or switched off.
    #[error("Remote service unavailable")]
    Unavailable,
}

impl RemoteError {
    /// Check if the server rejected the credential.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, RemoteError::Http { status: 401 | 403, .. })
    }

    /// Check if retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport(_) | RemoteError::Timeout => true,
            RemoteError::Http { status, .. } => *status >= 500,
            RemoteError::Parse(_) | RemoteError::Unavailable => false,
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Parse(e.to_string())
    }
}

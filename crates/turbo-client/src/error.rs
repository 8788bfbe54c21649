//! Client errors.

use thiserror::Error;
use turbo_auth::AuthError;
use turbo_commerce::CommerceError;

/// Errors from operations spanning more than one cache.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Identity cache error.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Favorites or cart error.
    #[error(transparent)]
    Commerce(#[from] CommerceError),
}

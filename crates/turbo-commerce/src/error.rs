//! Commerce error types.

use thiserror::Error;

/// Errors that can occur in favorites and cart operations.
#[derive(Error, Debug)]
pub enum CommerceError {
    /// Product not found in the price table.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// The product exists but has no price for the requested tier.
    #[error("No {tier} price for product {product_id}")]
    TierNotPriced { product_id: String, tier: String },

    /// Unknown quality tier name.
    #[error("Unknown quality tier: {0}")]
    UnknownTier(String),

    /// Arithmetic overflow.
    #[error("Arithmetic overflow in money calculation")]
    Overflow,

    /// Quantity exceeds maximum allowed.
    #[error("Quantity {0} exceeds maximum allowed ({1})")]
    QuantityExceedsLimit(i64, i64),

    /// Remote service call failed.
    #[error("Network error: {0}")]
    Network(#[from] turbo_data::RemoteError),

    /// Cache error.
    #[error("Cache error: {0}")]
    Cache(#[from] turbo_cache::CacheError),
}

impl CommerceError {
    /// Check if this is a network-class failure.
    pub fn is_network(&self) -> bool {
        matches!(self, CommerceError::Network(_))
    }
}

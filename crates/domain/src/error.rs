//! Domain error types.

use common::Money;
use thiserror::Error;

/// Errors raised while building or validating domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A required request field was empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A cart line had a zero quantity.
    #[error("Invalid quantity {quantity}: must be positive")]
    InvalidQuantity { quantity: u32 },

    /// The product variant is not one the storefront sells.
    #[error("Unknown product variant: {0}")]
    UnknownVariant(String),

    /// The payment gateway reported a status this service does not know.
    #[error("Unknown payment status: {0}")]
    UnknownPaymentStatus(String),

    /// A stored print job status could not be read.
    #[error("Unknown print job status: {0}")]
    UnknownPrintJobStatus(String),

    /// A session id or file name would escape its directory.
    #[error("Unsafe {field}: {value:?}")]
    UnsafePathElement { field: &'static str, value: String },

    /// A cart with no lines cannot be priced.
    #[error("Cart is empty")]
    EmptyCart,

    /// The cart priced to a non-positive amount.
    #[error("Invalid order amount: {0}")]
    InvalidAmount(Money),
}

/// Convenience type alias for domain results.
pub type Result<T> = std::result::Result<T, DomainError>;

//! Domain error types.

use thiserror::Error;

/// Rejection of a caller-supplied request. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Product name is empty or whitespace.
    #[error("Product name must not be empty")]
    EmptyName,

    /// Price is zero, negative or not a finite number.
    #[error("Invalid price: {price} (must be greater than 0)")]
    InvalidPrice { price: f64 },

    /// Quantity is negative or does not fit the inventory counter.
    #[error("Invalid quantity: {quantity} (must be between 0 and {max})")]
    InvalidQuantity { quantity: i64, max: u32 },
}

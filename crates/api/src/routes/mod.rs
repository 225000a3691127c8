//! HTTP route handlers.

pub mod inventory;
pub mod ops;
pub mod products;
pub mod reconciliation;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses an identifier from a path segment.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what} id: {raw}")))
}

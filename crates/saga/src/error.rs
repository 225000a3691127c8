//! Saga error types.

use common::{InventoryId, ProductId};
use domain::ValidationError;
use event_bus::BusError;
use store::StoreError;
use thiserror::Error;

/// Coarse classification of a [`SagaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input. Never retried.
    Validation,
    /// Another writer won an optimistic-concurrency race. Re-read and retry.
    ConcurrentModification,
    /// The addressed record does not exist.
    NotFound,
    /// A store or bus operation exceeded its deadline.
    Timeout,
    /// Store fault.
    Store,
    /// Bus fault.
    Bus,
    /// An event body could not be encoded or decoded.
    Serialization,
}

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The request was rejected by validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The inventory record changed since the caller read it.
    #[error(
        "Inventory {id} was modified concurrently (expected version {expected_version}, found {actual_version})"
    )]
    ConcurrentModification {
        id: InventoryId,
        expected_version: i64,
        actual_version: i64,
    },

    /// No inventory record with this id.
    #[error("Inventory not found: {0}")]
    InventoryNotFound(InventoryId),

    /// No product with this id.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Bus error.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaError {
    /// Returns the error's classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SagaError::Validation(_) => ErrorKind::Validation,
            SagaError::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
            SagaError::InventoryNotFound(_) | SagaError::ProductNotFound(_) => ErrorKind::NotFound,
            SagaError::Store(e) if e.is_timeout() => ErrorKind::Timeout,
            SagaError::Store(_) => ErrorKind::Store,
            SagaError::Bus(BusError::Timeout { .. }) => ErrorKind::Timeout,
            SagaError::Bus(_) => ErrorKind::Bus,
            SagaError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Returns true if repeating the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConcurrentModification
                | ErrorKind::Timeout
                | ErrorKind::Store
                | ErrorKind::Bus
        )
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_validation_is_not_retryable() {
        let err = SagaError::from(ValidationError::EmptyName);
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_concurrent_modification_is_retryable() {
        let err = SagaError::ConcurrentModification {
            id: InventoryId::new(),
            expected_version: 1,
            actual_version: 2,
        };
        assert_eq!(err.kind(), ErrorKind::ConcurrentModification);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_timeouts_are_classified_as_timeout() {
        let store = SagaError::from(StoreError::Timeout {
            operation: "product.insert",
            after: Duration::from_secs(10),
        });
        let bus = SagaError::from(BusError::Timeout {
            topic: "product".to_string(),
            after: Duration::from_secs(10),
        });
        assert_eq!(store.kind(), ErrorKind::Timeout);
        assert_eq!(bus.kind(), ErrorKind::Timeout);
        assert!(store.is_retryable());
    }

    #[test]
    fn test_not_found_kinds() {
        assert_eq!(
            SagaError::ProductNotFound(ProductId::new()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            SagaError::InventoryNotFound(InventoryId::new()).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_infra_faults() {
        let err = SagaError::from(BusError::Unavailable("down".to_string()));
        assert_eq!(err.kind(), ErrorKind::Bus);
        assert!(err.is_retryable());
    }
}

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when publishing to or consuming from the bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The broker did not acknowledge a publish within the deadline.
    #[error("Publish to topic '{topic}' timed out after {after:?}")]
    Timeout { topic: String, after: Duration },

    /// The broker rejected or could not accept the request.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// A partition outside the topic's partition range was addressed.
    #[error("Unknown partition {partition} for topic '{topic}'")]
    UnknownPartition { topic: String, partition: u32 },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

use common::OrderId;
use thiserror::Error;

/// Errors that can occur when reading or writing orders.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// An order with this ID is already stored.
    #[error("Order already exists: {0}")]
    Duplicate(OrderId),

    /// The store refused the write or cannot be reached.
    #[error("Order store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be turned back into an order.
    #[error("Corrupt order record {id}: {reason}")]
    Corrupt { id: OrderId, reason: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;

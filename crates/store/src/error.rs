use common::{OrderId, ProductId};
use domain::{OrderError, OrderStatus, TerminalStatus};
use thiserror::Error;

/// Errors that can occur when interacting with the catalog or order ledger.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No product with this ID exists in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// No order matched the lookup.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The order already reached a terminal status that conflicts with the
    /// requested one.
    #[error("Order {order_id} is {current}; refusing to mark it {target}")]
    StateConflict {
        order_id: OrderId,
        current: OrderStatus,
        target: TerminalStatus,
    },

    /// Saving would move a stored terminal status to a different status.
    #[error("Order {order_id} is already {current}; refusing to overwrite it with {attempted}")]
    TerminalOverwrite {
        order_id: OrderId,
        current: OrderStatus,
        attempted: OrderStatus,
    },

    /// A stored row could not be turned back into a domain value.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// An injected failure, used by tests to exercise rollback.
    #[error("Injected failure: {0}")]
    Injected(&'static str),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true for lookup misses.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::ProductNotFound(_) | StoreError::OrderNotFound(_)
        )
    }
}

impl From<OrderError> for StoreError {
    fn from(err: OrderError) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

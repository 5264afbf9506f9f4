//! Order aggregate and related types.

mod aggregate;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use state::{OrderStatus, StatusChange, TerminalStatus};
pub use value_objects::{MAX_QUANTITY, OrderItem, validate_email};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// The order is already in a conflicting terminal status.
    #[error("Invalid state transition: cannot move from {current} to {target}")]
    InvalidStateTransition {
        current: OrderStatus,
        target: TerminalStatus,
    },

    /// Items can only be added while the order is pending.
    #[error("Order is {status}; items can no longer be added")]
    ItemsLocked { status: OrderStatus },

    /// Quantity is zero or a line would exceed `MAX_QUANTITY`.
    #[error("Invalid quantity: {quantity} (must be between 1 and {max})", max = MAX_QUANTITY)]
    InvalidQuantity { quantity: u32 },

    /// Customer email is missing or malformed.
    #[error("Invalid customer email: {0:?}")]
    InvalidEmail(String),

    /// The payment session identifier is assigned once.
    #[error("Payment session already assigned: {existing}")]
    PaymentSessionAlreadyAssigned { existing: String },

    /// Stored status string is not a known status.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}

//! Domain layer for the storefront.
//!
//! This crate provides the core domain types:
//! - Product records and the seeded catalog
//! - The session-scoped shopping cart
//! - The Order aggregate with its status state machine

pub mod cart;
pub mod order;
pub mod product;

pub use cart::{Cart, CartItem, coerce_quantity};
pub use common::{Money, OrderId, ProductId};
pub use order::{
    MAX_QUANTITY, Order, OrderError, OrderItem, OrderStatus, StatusChange, TerminalStatus,
    validate_email,
};
pub use product::{Product, ProductError, default_catalog};

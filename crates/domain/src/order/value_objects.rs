//! Value objects for the order domain.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use super::OrderError;

/// Largest quantity a single cart or order line may hold.
///
/// Fits the `INTEGER` quantity column.
pub const MAX_QUANTITY: u32 = 999;

/// An item in an order.
///
/// A snapshot of the product at the time the order was placed, so later
/// catalog changes do not rewrite order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Human-readable product name.
    pub product_name: String,

    /// Quantity ordered.
    pub quantity: u32,

    /// Price per unit.
    pub unit_price: Money,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns the total price for this item (quantity * unit_price).
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Validates and normalizes a customer email address.
///
/// Only the shape is checked: a non-empty local part, an `@`, and a
/// non-empty domain.
pub fn validate_email(raw: &str) -> Result<String, OrderError> {
    let email = raw.trim();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(email.to_string())
        }
        _ => Err(OrderError::InvalidEmail(raw.to_string())),
    }
}

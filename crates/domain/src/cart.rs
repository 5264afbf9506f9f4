//! Session-scoped shopping cart.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::order::MAX_QUANTITY;
use crate::product::Product;

/// A selected product and its quantity.
///
/// The unit price is captured when the product is first added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    /// Returns `unit_price * quantity`.
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Shopping cart holding at most one line per product.
///
/// The cart has no persistence of its own; the session store keeps it
/// between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `quantity` units of `product`, merging into an existing line.
    ///
    /// A quantity of zero is treated as one; a line never holds more than
    /// `MAX_QUANTITY`.
    pub fn add(&mut self, product: &Product, quantity: u32) {
        let quantity = quantity.clamp(1, MAX_QUANTITY);

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product.id)
        {
            existing.quantity = existing.quantity.saturating_add(quantity).min(MAX_QUANTITY);
            return;
        }

        self.items.push(CartItem {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity,
            unit_price: product.price,
        });
    }

    /// Removes the line for `product_id`. Returns false if there was none.
    pub fn remove(&mut self, product_id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.product_id != product_id);
        self.items.len() != before
    }

    /// Recomputes the total from the current lines.
    pub fn total(&self) -> Money {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    /// Removes every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn get(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct products in the cart.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Sum of quantities across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Coerces a raw form quantity to a usable value.
///
/// Missing, unparsable, and non-positive input become 1; anything above
/// `MAX_QUANTITY` becomes `MAX_QUANTITY`.
pub fn coerce_quantity(raw: Option<&str>) -> u32 {
    raw.map(str::trim)
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|q| *q >= 1)
        .map(|q| u32::try_from(q.min(i64::from(MAX_QUANTITY))).unwrap_or(MAX_QUANTITY))
        .unwrap_or(1)
}

//! Catalog products.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder image used by the seeded catalog.
pub const PLACEHOLDER_IMAGE: &str = "/static/img/placeholder.svg";

/// Errors raised when building a product record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProductError {
    /// Product prices must not be negative.
    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: i64 },
}

/// An item available for purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub image_url: String,
}

impl Product {
    /// Creates a product, rejecting negative prices.
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        description: impl Into<String>,
        price: Money,
        image_url: impl Into<String>,
    ) -> Result<Self, ProductError> {
        if price.is_negative() {
            return Err(ProductError::InvalidPrice {
                price: price.cents(),
            });
        }

        Ok(Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            price,
            image_url: image_url.into(),
        })
    }

    /// Returns the price formatted for display, e.g. `$29.99`.
    pub fn formatted_price(&self) -> String {
        self.price.to_string()
    }
}

/// The fixed set of products seeded into an empty catalog at startup.
pub fn default_catalog() -> Vec<Product> {
    vec![
        Product {
            id: ProductId::new("prod_1"),
            name: "Premium T-Shirt".to_string(),
            description: "High quality cotton t-shirt with logo".to_string(),
            price: Money::from_cents(2999),
            image_url: PLACEHOLDER_IMAGE.to_string(),
        },
        Product {
            id: ProductId::new("prod_2"),
            name: "Designer Jeans".to_string(),
            description: "Comfortable jeans for everyday wear".to_string(),
            price: Money::from_cents(8999),
            image_url: PLACEHOLDER_IMAGE.to_string(),
        },
        Product {
            id: ProductId::new("prod_3"),
            name: "Running Shoes".to_string(),
            description: "Lightweight shoes for optimal performance".to_string(),
            price: Money::from_cents(11999),
            image_url: PLACEHOLDER_IMAGE.to_string(),
        },
    ]
}

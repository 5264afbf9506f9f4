//! Shared identifier and money types used across the storefront crates.

mod money;
mod types;

pub use money::Money;
pub use types::{OrderId, ProductId};

use async_trait::async_trait;
use common::{OrderId, ProductId};
use domain::{Order, Product, StatusChange, TerminalStatus};

use crate::{Result, StoreError};

/// Read-mostly access to product records.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Returns every product, ordered by ID. An empty catalog is not an error.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Returns the product with the given ID.
    ///
    /// Fails with `ProductNotFound` if there is none.
    async fn get_product(&self, id: &ProductId) -> Result<Product>;

    /// Inserts each product whose ID is not already present.
    ///
    /// Returns the number of products inserted.
    async fn seed_products(&self, products: &[Product]) -> Result<usize>;
}

/// Durable record of orders and their line items.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Upserts the order and replaces its items in one transaction.
    ///
    /// Either the order row and all of its items are written, or nothing is.
    /// Saving never moves a stored terminal status to a different status;
    /// that fails with `TerminalOverwrite`.
    async fn save(&self, order: &Order) -> Result<()>;

    /// Loads an order by ID.
    async fn find_by_id(&self, id: OrderId) -> Result<Order>;

    /// Loads the order linked to a hosted payment session.
    async fn find_by_payment_session_id(&self, session_id: &str) -> Result<Order>;

    /// Atomically moves a pending order to `target`.
    ///
    /// Returns `Unchanged` if the order already has that status and fails
    /// with `StateConflict` if it has the other terminal status.
    async fn update_status(&self, id: OrderId, target: TerminalStatus) -> Result<StatusChange>;
}

/// Extension trait providing convenience lookups for order ledgers.
#[async_trait]
pub trait OrderLedgerExt: OrderLedger {
    /// Like `find_by_payment_session_id`, but maps a miss to `None`.
    async fn try_find_by_payment_session_id(&self, session_id: &str) -> Result<Option<Order>> {
        match self.find_by_payment_session_id(session_id).await {
            Ok(order) => Ok(Some(order)),
            Err(StoreError::OrderNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// Blanket implementation for all OrderLedger implementations
impl<T: OrderLedger + ?Sized> OrderLedgerExt for T {}

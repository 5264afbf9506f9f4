use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId};
use domain::{Order, OrderItem, OrderStatus, Product, StatusChange, TerminalStatus};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{CatalogStore, OrderLedger},
};

/// Order columns, kept apart from the item rows like the relational schema.
#[derive(Debug, Clone)]
struct OrderRow {
    customer_email: String,
    status: OrderStatus,
    payment_session_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    orders: HashMap<OrderId, OrderRow>,
    order_items: HashMap<OrderId, Vec<OrderItem>>,
}

impl Tables {
    fn load_order(&self, id: OrderId) -> Option<Order> {
        let row = self.orders.get(&id)?;
        let items = self.order_items.get(&id).cloned().unwrap_or_default();
        Some(Order::restore(
            id,
            row.customer_email.clone(),
            items,
            row.status,
            row.payment_session_id.clone(),
            row.created_at,
            row.updated_at,
        ))
    }
}

/// In-memory catalog and order ledger for testing and local runs.
///
/// This implementation keeps all rows in memory and provides the same
/// interface and guarantees as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    fail_next_item_write: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `save` fail after staging the order row but before
    /// writing its items.
    pub fn fail_next_item_write(&self) {
        self.fail_next_item_write.store(true, Ordering::SeqCst);
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        Ok(tables.products.values().cloned().collect())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Product> {
        let tables = self.tables.read().await;
        tables
            .products
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ProductNotFound(id.clone()))
    }

    async fn seed_products(&self, products: &[Product]) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let mut inserted = 0;
        for product in products {
            if !tables.products.contains_key(&product.id) {
                tables.products.insert(product.id.clone(), product.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[async_trait]
impl OrderLedger for InMemoryStore {
    async fn save(&self, order: &Order) -> Result<()> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.orders.get(&order.id())
            && existing.status.is_terminal()
            && existing.status != order.status()
        {
            return Err(StoreError::TerminalOverwrite {
                order_id: order.id(),
                current: existing.status,
                attempted: order.status(),
            });
        }

        if let Some(session_id) = order.payment_session_id()
            && let Some((other, _)) = tables
                .orders
                .iter()
                .find(|(id, row)| {
                    **id != order.id() && row.payment_session_id.as_deref() == Some(session_id)
                })
        {
            return Err(StoreError::Corrupt(format!(
                "payment session {session_id} already linked to order {other}"
            )));
        }

        // Stage the upsert; nothing is visible until both parts are written.
        let created_at = tables
            .orders
            .get(&order.id())
            .map(|row| row.created_at)
            .unwrap_or(order.created_at());
        let row = OrderRow {
            customer_email: order.customer_email().to_string(),
            status: order.status(),
            payment_session_id: order.payment_session_id().map(String::from),
            created_at,
            updated_at: Utc::now(),
        };

        if self.fail_next_item_write.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Injected("order item insert"));
        }

        tables.orders.insert(order.id(), row);
        tables.order_items.insert(order.id(), order.items().to_vec());
        metrics::counter!("order_ledger_saves_total").increment(1);
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Order> {
        let tables = self.tables.read().await;
        tables
            .load_order(id)
            .ok_or_else(|| StoreError::OrderNotFound(id.to_string()))
    }

    async fn find_by_payment_session_id(&self, session_id: &str) -> Result<Order> {
        let tables = self.tables.read().await;
        tables
            .orders
            .iter()
            .find(|(_, row)| row.payment_session_id.as_deref() == Some(session_id))
            .and_then(|(id, _)| tables.load_order(*id))
            .ok_or_else(|| StoreError::OrderNotFound(format!("payment session {session_id}")))
    }

    async fn update_status(&self, id: OrderId, target: TerminalStatus) -> Result<StatusChange> {
        let mut tables = self.tables.write().await;
        let row = tables
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::OrderNotFound(id.to_string()))?;

        let change = row
            .status
            .transition(target)
            .map_err(|_| StoreError::StateConflict {
                order_id: id,
                current: row.status,
                target,
            })?;

        if change == StatusChange::Applied {
            row.status = target.into();
            row.updated_at = Utc::now();
        }
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use common::Money;
    use domain::default_catalog;

    use super::*;

    fn product(id: &str, cents: i64) -> Product {
        Product::new(id, format!("Product {id}"), "", Money::from_cents(cents), "").unwrap()
    }

    async fn saved_order(store: &InMemoryStore, session: Option<&str>) -> Order {
        let mut order = Order::new("a@b.com");
        order.add_item(&product("a", 1000), 2).unwrap();
        if let Some(session) = session {
            order.attach_payment_session(session).unwrap();
        }
        store.save(&order).await.unwrap();
        order
    }

    #[tokio::test]
    async fn empty_catalog_lists_nothing() {
        let store = InMemoryStore::new();
        assert!(store.list_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_missing_product_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .get_product(&ProductId::new("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ProductNotFound(_)));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn seed_inserts_only_missing_products() {
        let store = InMemoryStore::new();
        assert_eq!(store.seed_products(&default_catalog()).await.unwrap(), 3);
        assert_eq!(store.seed_products(&default_catalog()).await.unwrap(), 0);

        let products = store.list_products().await.unwrap();
        let ids: Vec<_> = products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["prod_1", "prod_2", "prod_3"]);
    }

    #[tokio::test]
    async fn save_and_find_round_trip() {
        let store = InMemoryStore::new();
        let order = saved_order(&store, Some("cs_1")).await;

        let by_id = store.find_by_id(order.id()).await.unwrap();
        assert_eq!(by_id.items(), order.items());
        assert_eq!(by_id.total_amount(), Money::from_cents(2000));

        let by_session = store.find_by_payment_session_id("cs_1").await.unwrap();
        assert_eq!(by_session.id(), order.id());
        assert!(matches!(
            store.find_by_payment_session_id("cs_x").await,
            Err(StoreError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn save_replaces_items() {
        let store = InMemoryStore::new();
        let mut order = saved_order(&store, None).await;

        order.add_item(&product("b", 500), 1).unwrap();
        store.save(&order).await.unwrap();

        let loaded = store.find_by_id(order.id()).await.unwrap();
        assert_eq!(loaded.item_count(), 2);
        assert_eq!(loaded.total_amount(), Money::from_cents(2500));
    }

    #[tokio::test]
    async fn failed_save_leaves_prior_state() {
        let store = InMemoryStore::new();
        let mut order = saved_order(&store, None).await;

        order.add_item(&product("b", 500), 1).unwrap();
        order.attach_payment_session("cs_2").unwrap();
        store.fail_next_item_write();
        assert!(matches!(
            store.save(&order).await,
            Err(StoreError::Injected(_))
        ));

        let loaded = store.find_by_id(order.id()).await.unwrap();
        assert_eq!(loaded.item_count(), 1);
        assert!(loaded.payment_session_id().is_none());
    }

    #[tokio::test]
    async fn update_status_is_idempotent_and_monotonic() {
        let store = InMemoryStore::new();
        let order = saved_order(&store, Some("cs_1")).await;

        assert_eq!(
            store
                .update_status(order.id(), TerminalStatus::Completed)
                .await
                .unwrap(),
            StatusChange::Applied
        );
        let first = store.find_by_id(order.id()).await.unwrap();

        assert_eq!(
            store
                .update_status(order.id(), TerminalStatus::Completed)
                .await
                .unwrap(),
            StatusChange::Unchanged
        );
        assert!(matches!(
            store.update_status(order.id(), TerminalStatus::Failed).await,
            Err(StoreError::StateConflict { .. })
        ));

        let after = store.find_by_id(order.id()).await.unwrap();
        assert_eq!(after, first);
    }

    #[tokio::test]
    async fn save_does_not_overwrite_terminal_status() {
        let store = InMemoryStore::new();
        let order = saved_order(&store, None).await;
        store
            .update_status(order.id(), TerminalStatus::Failed)
            .await
            .unwrap();

        // A stale pending copy must not resurrect the order.
        assert!(matches!(
            store.save(&order).await,
            Err(StoreError::TerminalOverwrite { .. })
        ));
        assert_eq!(
            store.find_by_id(order.id()).await.unwrap().status(),
            OrderStatus::Failed
        );
    }

    #[tokio::test]
    async fn update_status_unknown_order_is_not_found() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store
                .update_status(OrderId::new(), TerminalStatus::Completed)
                .await,
            Err(StoreError::OrderNotFound(_))
        ));
    }
}

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{Money, OrderId, ProductId};
use domain::{Order, OrderItem, OrderStatus, Product, StatusChange, TerminalStatus};
use sqlx::{PgConnection, PgPool, Row, postgres::PgPoolOptions, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{CatalogStore, OrderLedger},
};

const ORDER_COLUMNS: &str =
    "id, customer_email, status, payment_session_id, created_at, updated_at";

/// PostgreSQL-backed catalog and order ledger.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store from an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool whose connection acquisition is bounded by
    /// `acquire_timeout`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            image_url: row.try_get("image_url")?,
        })
    }

    fn row_to_item(row: PgRow) -> Result<OrderItem> {
        let quantity: i32 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity)
            .map_err(|_| StoreError::Corrupt(format!("negative quantity {quantity}")))?;

        Ok(OrderItem::new(
            row.try_get::<String, _>("product_id")?,
            row.try_get::<String, _>("product_name")?,
            quantity,
            Money::from_cents(row.try_get("unit_price_cents")?),
        ))
    }

    /// Loads the items for an order row and assembles the aggregate.
    ///
    /// Must run on the connection that read `row` under `FOR SHARE`, so a
    /// concurrent `save` cannot commit new items in between.
    async fn hydrate(conn: &mut PgConnection, row: PgRow) -> Result<Order> {
        let id: Uuid = row.try_get("id")?;
        let status: String = row.try_get("status")?;

        let items = sqlx::query(
            r#"
            SELECT product_id, product_name, quantity, unit_price_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(Self::row_to_item)
        .collect::<Result<Vec<_>>>()?;

        Ok(Order::restore(
            OrderId::from_uuid(id),
            row.try_get("customer_email")?,
            items,
            status.parse::<OrderStatus>()?,
            row.try_get("payment_session_id")?,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        ))
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, image_url
            FROM products
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn get_product(&self, id: &ProductId) -> Result<Product> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, image_url
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None => Err(StoreError::ProductNotFound(id.clone())),
        }
    }

    #[tracing::instrument(skip(self, products), fields(count = products.len()))]
    async fn seed_products(&self, products: &[Product]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for product in products {
            let result = sqlx::query(
                r#"
                INSERT INTO products (id, name, description, price_cents, image_url)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(product.id.as_str())
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price.cents())
            .bind(&product.image_url)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

#[async_trait]
impl OrderLedger for PostgresStore {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    async fn save(&self, order: &Order) -> Result<()> {
        let order_id = order.id().as_uuid();

        // Dropping the transaction without commit rolls everything back.
        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some(current) = current {
            let current: OrderStatus = current.parse()?;
            if current.is_terminal() && current != order.status() {
                return Err(StoreError::TerminalOverwrite {
                    order_id: order.id(),
                    current,
                    attempted: order.status(),
                });
            }
        }

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_email, total_amount_cents, status, payment_session_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                customer_email = EXCLUDED.customer_email,
                total_amount_cents = EXCLUDED.total_amount_cents,
                status = EXCLUDED.status,
                payment_session_id = EXCLUDED.payment_session_id,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(order_id)
        .bind(order.customer_email())
        .bind(order.total_amount().cents())
        .bind(order.status().as_str())
        .bind(order.payment_session_id())
        .bind(order.created_at())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        for item in order.items() {
            let quantity = i32::try_from(item.quantity)
                .map_err(|_| StoreError::Corrupt(format!("quantity {} too large", item.quantity)))?;

            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order_id)
            .bind(item.product_id.as_str())
            .bind(&item.product_name)
            .bind(quantity)
            .bind(item.unit_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        metrics::counter!("order_ledger_saves_total").increment(1);
        tracing::debug!(items = order.item_count(), "order saved");
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR SHARE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        let order = match row {
            Some(row) => Self::hydrate(&mut tx, row).await?,
            None => return Err(StoreError::OrderNotFound(id.to_string())),
        };
        tx.commit().await?;
        Ok(order)
    }

    async fn find_by_payment_session_id(&self, session_id: &str) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_session_id = $1 FOR SHARE"
        ))
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?;

        let order = match row {
            Some(row) => Self::hydrate(&mut tx, row).await?,
            None => {
                return Err(StoreError::OrderNotFound(format!(
                    "payment session {session_id}"
                )));
            }
        };
        tx.commit().await?;
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(&self, id: OrderId, target: TerminalStatus) -> Result<StatusChange> {
        let target_status = OrderStatus::from(target);

        // Guarded by the current status so concurrent deliveries cannot both
        // apply conflicting terminal transitions.
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $1, updated_at = $2
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(target_status.as_str())
        .bind(Utc::now())
        .bind(id.as_uuid())
        .bind(OrderStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(StatusChange::Applied);
        }

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        let current: OrderStatus = current
            .ok_or_else(|| StoreError::OrderNotFound(id.to_string()))?
            .parse()?;

        current
            .transition(target)
            .map_err(|_| StoreError::StateConflict {
                order_id: id,
                current,
                target,
            })
    }
}

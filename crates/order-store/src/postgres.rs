use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Money, Order, OrderLineItem};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{OrderRepository, PersistenceError, Result};

/// PostgreSQL-backed order repository.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Creates a new PostgreSQL order repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` with a small pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_line_item(id: OrderId, row: &PgRow) -> Result<OrderLineItem> {
        let corrupt = |reason: String| PersistenceError::Corrupt { id, reason };

        let sku_code: String = row.try_get("sku_code")?;
        let quantity: i64 = row.try_get("quantity")?;
        let price_cents: i64 = row.try_get("price_cents")?;

        let quantity = u32::try_from(quantity)
            .map_err(|_| corrupt(format!("quantity {quantity} out of range")))?;

        OrderLineItem::new(sku_code, quantity, Money::from_cents(price_cents))
            .map_err(|e| corrupt(e.to_string()))
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id(), items = order.item_count()))]
    async fn save(&self, order: Order) -> Result<()> {
        let id = order.id();

        // Dropping the transaction without commit rolls everything back.
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO orders (id, created_at) VALUES ($1, $2)")
            .bind(id.as_uuid())
            .bind(order.created_at())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return PersistenceError::Duplicate(id);
                }
                PersistenceError::Database(e)
            })?;

        for (position, item) in order.line_items().iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| PersistenceError::Corrupt {
                id,
                reason: "too many line items".to_string(),
            })?;

            sqlx::query(
                r#"
                INSERT INTO order_line_items (order_id, position, sku_code, quantity, price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(id.as_uuid())
            .bind(position)
            .bind(item.sku_code().as_str())
            .bind(i64::from(item.quantity()))
            .bind(item.unit_price().cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!("order persisted");
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let created_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT created_at FROM orders WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        let Some(created_at) = created_at else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT sku_code, quantity, price_cents
            FROM order_line_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let line_items = rows
            .iter()
            .map(|row| Self::row_to_line_item(id, row))
            .collect::<Result<Vec<_>>>()?;

        let order = Order::from_parts(id, line_items, created_at).map_err(|e| {
            PersistenceError::Corrupt {
                id,
                reason: e.to_string(),
            }
        })?;
        Ok(Some(order))
    }
}

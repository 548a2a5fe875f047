//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::OrderId;
use domain::{Money, Order, OrderLineItem};
use order_store::{OrderRepository, PersistenceError, PostgresOrderRepository};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_orders_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh repository with its own pool and cleared tables
async fn get_test_repository() -> PostgresOrderRepository {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_line_items, orders")
        .execute(&pool)
        .await
        .unwrap();

    PostgresOrderRepository::new(pool)
}

fn line(sku: &str, quantity: u32, cents: i64) -> OrderLineItem {
    OrderLineItem::new(sku, quantity, Money::from_cents(cents)).unwrap()
}

async fn count(repo: &PostgresOrderRepository, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(repo.pool())
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
async fn test_save_and_load_order() {
    let repo = get_test_repository().await;
    let order = Order::new(vec![
        line("iphone_13", 1, 120_000),
        line("iphone_13_red", 2, 110_050),
        line("case", 3, 999),
    ])
    .unwrap();

    repo.save(order.clone()).await.unwrap();

    let loaded = repo.find_by_id(order.id()).await.unwrap().unwrap();
    assert_eq!(loaded.id(), order.id());
    assert_eq!(loaded.line_items(), order.line_items());
    assert_eq!(loaded.total_amount(), order.total_amount());
    let drift = (loaded.created_at() - order.created_at()).num_milliseconds().abs();
    assert!(drift < 1);
}

#[tokio::test]
#[serial]
async fn test_find_unknown_order() {
    let repo = get_test_repository().await;

    let loaded = repo.find_by_id(OrderId::new()).await.unwrap();

    assert!(loaded.is_none());
}

#[tokio::test]
#[serial]
async fn test_duplicate_id_writes_nothing_more() {
    let repo = get_test_repository().await;
    let order = Order::new(vec![line("phone", 1, 100)]).unwrap();
    repo.save(order.clone()).await.unwrap();

    let clash =
        Order::from_parts(order.id(), vec![line("tablet", 4, 500)], order.created_at()).unwrap();
    let result = repo.save(clash).await;

    assert!(matches!(result, Err(PersistenceError::Duplicate(id)) if id == order.id()));
    assert_eq!(count(&repo, "orders").await, 1);
    assert_eq!(count(&repo, "order_line_items").await, 1);
}

#[tokio::test]
#[serial]
async fn test_failed_line_item_rolls_back_order_row() {
    let repo = get_test_repository().await;
    // Makes the second line item fail after the order row is written.
    sqlx::query(
        "ALTER TABLE order_line_items ADD CONSTRAINT no_forbidden_sku CHECK (sku_code <> 'forbidden')",
    )
    .execute(repo.pool())
    .await
    .unwrap();

    let order = Order::new(vec![line("phone", 1, 100), line("forbidden", 1, 100)]).unwrap();
    let result = repo.save(order.clone()).await;

    sqlx::query("ALTER TABLE order_line_items DROP CONSTRAINT no_forbidden_sku")
        .execute(repo.pool())
        .await
        .unwrap();

    assert!(matches!(result, Err(PersistenceError::Database(_))));
    assert!(repo.find_by_id(order.id()).await.unwrap().is_none());
    assert_eq!(count(&repo, "orders").await, 0);
    assert_eq!(count(&repo, "order_line_items").await, 0);
}

#[tokio::test]
#[serial]
async fn test_concurrent_saves_are_independent() {
    let repo = get_test_repository().await;

    let mut handles = vec![];
    for i in 0..10 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            let order = Order::new(vec![line(&format!("sku-{i}"), 1, 100)]).unwrap();
            repo.save(order).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(count(&repo, "orders").await, 10);
    assert_eq!(count(&repo, "order_line_items").await, 10);
}

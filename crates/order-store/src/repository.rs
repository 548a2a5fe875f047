use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use domain::Order;

use crate::Result;

/// Storage for accepted orders.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Stores the order and its line items atomically.
    ///
    /// Fails with `Duplicate` if the ID is already taken; nothing is written
    /// in that case.
    async fn save(&self, order: Order) -> Result<()>;

    /// Loads an order with its line items in their original order.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>>;
}

#[async_trait]
impl<T: OrderRepository + ?Sized> OrderRepository for Arc<T> {
    async fn save(&self, order: Order) -> Result<()> {
        (**self).save(order).await
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        (**self).find_by_id(id).await
    }
}

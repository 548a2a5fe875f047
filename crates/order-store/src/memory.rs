use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::OrderId;
use domain::Order;
use tokio::sync::RwLock;

use crate::{OrderRepository, PersistenceError, Result};

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: HashMap<OrderId, Order>,
    fail_on_save: bool,
}

/// In-memory order repository for testing and local runs.
///
/// Provides the same interface as the PostgreSQL implementation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    state: Arc<RwLock<InMemoryOrderState>>,
    save_calls: Arc<AtomicUsize>,
}

impl InMemoryOrderRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every save fail with `Unavailable` while set.
    pub async fn set_fail_on_save(&self, fail: bool) {
        self.state.write().await.fail_on_save = fail;
    }

    /// Returns how many times `save` was called, failed calls included.
    pub fn save_count(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns all stored orders, oldest first.
    pub async fn orders(&self) -> Vec<Order> {
        let mut orders: Vec<_> = self.state.read().await.orders.values().cloned().collect();
        orders.sort_by_key(|order| order.created_at());
        orders
    }

    /// Removes all stored orders.
    pub async fn clear(&self) {
        self.state.write().await.orders.clear();
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: Order) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;

        if state.fail_on_save {
            return Err(PersistenceError::Unavailable(
                "in-memory store rejected the write".to_string(),
            ));
        }

        match state.orders.entry(order.id()) {
            Entry::Occupied(_) => Err(PersistenceError::Duplicate(order.id())),
            Entry::Vacant(slot) => {
                slot.insert(order);
                Ok(())
            }
        }
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }
}

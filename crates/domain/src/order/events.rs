//! Order domain events.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};

/// Notification that an order has been durably committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlacedEvent {
    /// The committed order.
    pub order_id: OrderId,

    /// When the event was created.
    pub occurred_at: DateTime<Utc>,
}

impl OrderPlacedEvent {
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            occurred_at: Utc::now(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        "OrderPlaced"
    }
}

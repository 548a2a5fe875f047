use std::sync::Arc;

use async_trait::async_trait;
use domain::OrderPlacedEvent;

use crate::PublishError;

/// Sink for placed-order notifications.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hands `event` to the bus. Returns once the bus has accepted it.
    async fn publish(&self, event: OrderPlacedEvent) -> Result<(), PublishError>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, event: OrderPlacedEvent) -> Result<(), PublishError> {
        (**self).publish(event).await
    }
}

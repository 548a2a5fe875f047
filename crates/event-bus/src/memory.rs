use std::sync::Arc;

use async_trait::async_trait;
use domain::OrderPlacedEvent;
use tokio::sync::RwLock;

use crate::{EventPublisher, PublishError};

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    events: Vec<OrderPlacedEvent>,
    attempts: usize,
    fail_on_publish: bool,
}

/// Publisher that records events for inspection in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every publish fail with `Unavailable` while set.
    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().await.fail_on_publish = fail;
    }

    /// Returns the events accepted so far, oldest first.
    pub async fn events(&self) -> Vec<OrderPlacedEvent> {
        self.state.read().await.events.clone()
    }

    /// Returns how many times `publish` was called, failed calls included.
    pub async fn publish_attempts(&self) -> usize {
        self.state.read().await.attempts
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: OrderPlacedEvent) -> Result<(), PublishError> {
        let mut state = self.state.write().await;
        state.attempts += 1;

        if state.fail_on_publish {
            return Err(PublishError::Unavailable(
                "in-memory publisher rejected the event".to_string(),
            ));
        }

        state.events.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::OrderId;

    #[tokio::test]
    async fn test_records_events_in_order() {
        let publisher = InMemoryEventPublisher::new();
        let first = OrderPlacedEvent::new(OrderId::new());
        let second = OrderPlacedEvent::new(OrderId::new());

        publisher.publish(first.clone()).await.unwrap();
        publisher.publish(second.clone()).await.unwrap();

        assert_eq!(publisher.events().await, vec![first, second]);
    }

    #[tokio::test]
    async fn test_fail_on_publish() {
        let publisher = InMemoryEventPublisher::new();
        publisher.set_fail_on_publish(true).await;

        let result = publisher.publish(OrderPlacedEvent::new(OrderId::new())).await;

        assert!(matches!(result, Err(PublishError::Unavailable(_))));
        assert!(publisher.events().await.is_empty());
        assert_eq!(publisher.publish_attempts().await, 1);
    }
}

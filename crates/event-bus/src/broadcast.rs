use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use domain::OrderPlacedEvent;
use tokio::sync::mpsc;

use crate::{EventPublisher, PublishError};

const DEFAULT_CAPACITY: usize = 1024;
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Receiving end of one subscription to the topic.
pub type Subscription = mpsc::Receiver<OrderPlacedEvent>;

/// In-process topic with one bounded queue per subscriber.
///
/// `publish` returns `Ok` only once every live subscriber has queued the
/// event. A subscriber whose queue stays full for longer than the send
/// timeout fails the publish instead of silently losing the event.
/// Dropping every publisher handle closes all subscriptions.
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<OrderPlacedEvent>>>>,
    capacity: usize,
    send_timeout: Duration,
}

impl BroadcastEventPublisher {
    /// Creates a topic whose subscribers each buffer up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// How long `publish` waits for a full subscriber queue to free up.
    #[must_use]
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Returns a subscription to events published from now on.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.lock().push(sender);
        receiver
    }

    pub fn subscriber_count(&self) -> usize {
        self.live_senders().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::Sender<OrderPlacedEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops closed subscriptions and returns handles to the rest.
    fn live_senders(&self) -> Vec<mpsc::Sender<OrderPlacedEvent>> {
        let mut subscribers = self.lock();
        subscribers.retain(|sender| !sender.is_closed());
        subscribers.clone()
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    #[tracing::instrument(skip(self, event), fields(order_id = %event.order_id))]
    async fn publish(&self, event: OrderPlacedEvent) -> Result<(), PublishError> {
        let senders = self.live_senders();
        let mut delivered = 0usize;

        for sender in &senders {
            match sender.send_timeout(event.clone(), self.send_timeout).await {
                Ok(()) => delivered += 1,
                Err(mpsc::error::SendTimeoutError::Closed(_)) => {}
                Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                    tracing::warn!(
                        timeout = ?self.send_timeout,
                        "order notification not accepted by a subscriber"
                    );
                    metrics::counter!("order_notifications_backpressured_total").increment(1);
                    return Err(PublishError::Backpressure(self.send_timeout));
                }
            }
        }

        if delivered == 0 {
            tracing::warn!("order notification dropped, no subscribers");
            return Err(PublishError::NoSubscribers);
        }

        tracing::debug!(receivers = delivered, "order notification published");
        metrics::counter!("order_notifications_published_total").increment(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::OrderId;

    #[tokio::test]
    async fn test_every_subscriber_receives_the_event() {
        let publisher = BroadcastEventPublisher::default();
        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();
        let event = OrderPlacedEvent::new(OrderId::new());

        publisher.publish(event.clone()).await.unwrap();

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_fails() {
        let publisher = BroadcastEventPublisher::default();

        let result = publisher.publish(OrderPlacedEvent::new(OrderId::new())).await;

        assert_eq!(result, Err(PublishError::NoSubscribers));
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_not_counted() {
        let publisher = BroadcastEventPublisher::new(4);
        let receiver = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);

        drop(receiver);

        assert_eq!(publisher.subscriber_count(), 0);
        let result = publisher.publish(OrderPlacedEvent::new(OrderId::new())).await;
        assert_eq!(result, Err(PublishError::NoSubscribers));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_subscriber_fails_publish_instead_of_dropping() {
        let publisher =
            BroadcastEventPublisher::new(2).with_send_timeout(Duration::from_millis(100));
        let mut receiver = publisher.subscribe();

        let mut acknowledged = Vec::new();
        let mut refused = 0;
        for _ in 0..5 {
            let event = OrderPlacedEvent::new(OrderId::new());
            match publisher.publish(event.clone()).await {
                Ok(()) => acknowledged.push(event.order_id),
                Err(err) => {
                    assert_eq!(err, PublishError::Backpressure(Duration::from_millis(100)));
                    refused += 1;
                }
            }
        }
        drop(publisher);

        let mut delivered = Vec::new();
        while let Some(event) = receiver.recv().await {
            delivered.push(event.order_id);
        }
        assert_eq!(refused, 3);
        assert_eq!(delivered, acknowledged);
    }

    #[tokio::test]
    async fn test_dropping_publisher_closes_subscriptions() {
        let publisher = BroadcastEventPublisher::new(4);
        let mut receiver = publisher.subscribe();

        drop(publisher);

        assert_eq!(receiver.recv().await, None);
    }
}

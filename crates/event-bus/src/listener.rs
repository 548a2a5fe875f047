//! Consumer side of the order notification topic.

use domain::OrderPlacedEvent;
use tokio::task::JoinHandle;

use crate::Subscription;

/// Feeds every event from `subscription` to `on_event` until the topic
/// closes. Returns the number of events handled.
pub async fn listen<F>(mut subscription: Subscription, mut on_event: F) -> u64
where
    F: FnMut(&OrderPlacedEvent),
{
    let mut handled: u64 = 0;

    while let Some(event) = subscription.recv().await {
        on_event(&event);
        handled += 1;
    }

    tracing::info!(handled, "notification topic closed");
    handled
}

/// Spawns a task that logs each placed order it hears about.
pub fn spawn_notification_listener(subscription: Subscription) -> JoinHandle<u64> {
    tokio::spawn(listen(subscription, |event| {
        tracing::info!(
            order_id = %event.order_id,
            occurred_at = %event.occurred_at,
            "received order placed notification"
        );
        metrics::counter!("order_notifications_received_total").increment(1);
    }))
}

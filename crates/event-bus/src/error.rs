use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when handing an event to the bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Nobody is listening on the topic, so the event was dropped.
    #[error("No subscribers for the order notification topic")]
    NoSubscribers,

    /// A subscriber's queue stayed full for the whole send timeout.
    #[error("A subscriber did not accept the event within {0:?}")]
    Backpressure(Duration),

    /// The bus refused the event.
    #[error("Event bus unavailable: {0}")]
    Unavailable(String),
}

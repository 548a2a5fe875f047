//! Placed-order notifications.
//!
//! Events go out on an in-process topic that gives each subscriber its own
//! bounded queue. Publishing succeeds once every live subscriber has queued
//! the event, so an acknowledged event is never dropped on the way to a
//! subscriber.

pub mod broadcast;
pub mod error;
pub mod listener;
pub mod memory;
pub mod publisher;

pub use broadcast::{BroadcastEventPublisher, Subscription};
pub use error::PublishError;
pub use listener::{listen, spawn_notification_listener};
pub use memory::InMemoryEventPublisher;
pub use publisher::EventPublisher;

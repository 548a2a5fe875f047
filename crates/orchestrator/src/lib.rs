//! Order placement workflow.
//!
//! A request is validated and turned into an order, every SKU is checked
//! against inventory through the resilience policy, and only a fully
//! in-stock order is saved. A saved order is announced with an
//! `OrderPlacedEvent`; failing to announce it never undoes the save.

pub mod error;
pub mod observer;
pub mod orchestrator;

pub use error::{OrderRejection, RejectionReason};
pub use observer::{MetricsObserver, NoopObserver, OrderObserver};
pub use orchestrator::{OrderConfirmation, OrderOrchestrator, PublishMode};

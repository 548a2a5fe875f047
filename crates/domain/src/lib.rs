//! Domain layer for order placement.
//!
//! This crate provides the types the order workflow passes between its
//! collaborators:
//! - Order and OrderLineItem, built from a validated OrderRequest
//! - SkuAvailability and the pure all-in-stock evaluation
//! - OrderPlacedEvent, announced once an order is committed

pub mod availability;
pub mod order;

pub use availability::{AvailabilityVerdict, SkuAvailability, evaluate_availability};
pub use common::OrderId;
pub use order::{
    LineItemRequest, Money, MoneyParseError, Order, OrderError, OrderLineItem, OrderPlacedEvent,
    OrderRequest, SkuCode,
};

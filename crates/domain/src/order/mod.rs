//! Order aggregate and related types.

mod aggregate;
mod events;
mod request;
mod value_objects;

pub use aggregate::{Order, OrderLineItem};
pub use events::OrderPlacedEvent;
pub use request::{LineItemRequest, OrderRequest};
pub use value_objects::{Money, MoneyParseError, SkuCode};

use thiserror::Error;

/// Errors raised while turning a request into an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Order has no line items.
    #[error("Order has no line items")]
    NoItems,

    /// A line item carries a blank SKU code.
    #[error("Line item {position} has an empty SKU code")]
    EmptySkuCode { position: usize },

    /// Invalid quantity.
    #[error("Invalid quantity for {sku}: {quantity} (must be greater than 0)")]
    InvalidQuantity { sku: SkuCode, quantity: i64 },

    /// Invalid price.
    #[error("Invalid price for {sku}: {price} (must not be negative)")]
    InvalidPrice { sku: SkuCode, price: Money },

    /// Price times quantity does not fit the money range.
    #[error("Line total for {quantity} x {sku} at {price} is out of range")]
    LineTotalOutOfRange {
        sku: SkuCode,
        quantity: u32,
        price: Money,
    },

    /// The sum of the line totals does not fit the money range.
    #[error("Order total is out of range")]
    TotalOutOfRange,
}

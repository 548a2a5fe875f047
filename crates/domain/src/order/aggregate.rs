//! Order aggregate implementation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::OrderId;

use super::{Money, OrderError, SkuCode};

/// A single product line of an order.
///
/// Fields are only readable; a line item cannot change once it is part of
/// an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineItem {
    sku_code: SkuCode,
    quantity: u32,
    unit_price: Money,
    total_price: Money,
}

impl OrderLineItem {
    /// Creates a line item, rejecting blank SKUs, zero quantities, negative
    /// prices and line totals beyond the money range.
    pub fn new(
        sku_code: impl Into<SkuCode>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, OrderError> {
        let sku_code = sku_code.into();
        if sku_code.is_blank() {
            return Err(OrderError::EmptySkuCode { position: 0 });
        }
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                sku: sku_code,
                quantity: 0,
            });
        }
        if unit_price.is_negative() {
            return Err(OrderError::InvalidPrice {
                sku: sku_code,
                price: unit_price,
            });
        }

        let total_price = unit_price
            .checked_mul(quantity)
            .ok_or_else(|| OrderError::LineTotalOutOfRange {
                sku: sku_code.clone(),
                quantity,
                price: unit_price,
            })?;

        Ok(Self {
            sku_code,
            quantity,
            unit_price,
            total_price,
        })
    }

    pub fn sku_code(&self) -> &SkuCode {
        &self.sku_code
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    /// Returns the total price for this line (quantity * unit_price).
    pub fn total_price(&self) -> Money {
        self.total_price
    }
}

/// Order aggregate root.
///
/// Built by the orchestrator before inventory is consulted. It only becomes
/// durable once handed to a repository after every SKU is confirmed in stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    line_items: Vec<OrderLineItem>,
    total_amount: Money,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new order with a freshly generated ID.
    pub fn new(line_items: Vec<OrderLineItem>) -> Result<Self, OrderError> {
        Self::from_parts(OrderId::new(), line_items, Utc::now())
    }

    /// Rebuilds an order from stored parts.
    ///
    /// Fails if there are no line items or the order total is out of range.
    pub fn from_parts(
        id: OrderId,
        line_items: Vec<OrderLineItem>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if line_items.is_empty() {
            return Err(OrderError::NoItems);
        }
        let total_amount = line_items
            .iter()
            .try_fold(Money::zero(), |acc, item| acc.checked_add(item.total_price))
            .ok_or(OrderError::TotalOutOfRange)?;

        Ok(Self {
            id,
            line_items,
            total_amount,
            created_at,
        })
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn line_items(&self) -> &[OrderLineItem] {
        &self.line_items
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn item_count(&self) -> usize {
        self.line_items.len()
    }

    /// Returns each SKU of the order once, in ascending order.
    pub fn distinct_skus(&self) -> BTreeSet<SkuCode> {
        self.line_items
            .iter()
            .map(|item| item.sku_code.clone())
            .collect()
    }

    /// Returns the sum of all line totals.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }
}

//! Inbound order request and its validation.

use serde::{Deserialize, Serialize};

use super::{Money, Order, OrderError, OrderLineItem, SkuCode};

/// One requested product line, as supplied by the caller.
///
/// Quantity is signed so that negative input reaches validation instead of
/// failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub sku_code: String,
    pub quantity: i64,
    pub price: Money,
}

impl LineItemRequest {
    pub fn new(sku_code: impl Into<String>, quantity: i64, price: Money) -> Self {
        Self {
            sku_code: sku_code.into(),
            quantity,
            price,
        }
    }
}

/// A purchase request, not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub line_items: Vec<LineItemRequest>,
}

impl OrderRequest {
    pub fn new(line_items: Vec<LineItemRequest>) -> Self {
        Self { line_items }
    }

    /// Adds a line to the request.
    pub fn with_line(mut self, sku_code: impl Into<String>, quantity: i64, price: Money) -> Self {
        self.line_items
            .push(LineItemRequest::new(sku_code, quantity, price));
        self
    }

    /// Checks every line and converts the request into order line items.
    ///
    /// The first offending line decides the error.
    pub fn validate(&self) -> Result<Vec<OrderLineItem>, OrderError> {
        if self.line_items.is_empty() {
            return Err(OrderError::NoItems);
        }

        self.line_items
            .iter()
            .enumerate()
            .map(|(position, line)| {
                let sku = SkuCode::new(line.sku_code.clone());
                if sku.is_blank() {
                    return Err(OrderError::EmptySkuCode { position });
                }
                let quantity = u32::try_from(line.quantity)
                    .ok()
                    .filter(|q| *q > 0)
                    .ok_or_else(|| OrderError::InvalidQuantity {
                        sku: sku.clone(),
                        quantity: line.quantity,
                    })?;
                OrderLineItem::new(sku, quantity, line.price)
            })
            .collect()
    }

    /// Validates the request and builds an order draft with a fresh ID.
    pub fn into_order(self) -> Result<Order, OrderError> {
        Order::new(self.validate()?)
    }
}

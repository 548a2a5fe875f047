use std::fmt;

use domain::{OrderError, SkuCode};
use resilience::Fallback;
use serde::Serialize;
use thiserror::Error;

/// Message returned when some SKUs are not in stock.
pub const OUT_OF_STOCK_MESSAGE: &str = "Product is not in stock, please try again later";

/// Message returned when an in-stock order could not be saved.
pub const PERSISTENCE_FAILED_MESSAGE: &str = "Order could not be saved, please try again later";

/// Why an order was not placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    /// The request failed validation.
    InvalidRequest,
    /// Inventory could not be consulted; the fallback answered instead.
    ServiceDegraded,
    /// At least one SKU is not in stock.
    InsufficientStock,
    /// The order was in stock but could not be saved.
    PersistenceFailed,
}

impl RejectionReason {
    /// Stable code for clients and metric tags.
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::InvalidRequest => "INVALID_REQUEST",
            RejectionReason::ServiceDegraded => "SERVICE_DEGRADED",
            RejectionReason::InsufficientStock => "INSUFFICIENT_STOCK",
            RejectionReason::PersistenceFailed => "PERSISTENCE_FAILED",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An order that was not placed. Nothing was persisted or published.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: {message}")]
pub struct OrderRejection {
    pub reason: RejectionReason,
    /// Out-of-stock SKUs in ascending order; empty for other reasons.
    pub skus: Vec<SkuCode>,
    pub message: String,
}

impl OrderRejection {
    pub fn invalid_request(error: &OrderError) -> Self {
        Self {
            reason: RejectionReason::InvalidRequest,
            skus: Vec::new(),
            message: error.to_string(),
        }
    }

    pub fn service_degraded(fallback: &Fallback) -> Self {
        Self {
            reason: RejectionReason::ServiceDegraded,
            skus: Vec::new(),
            message: fallback.message().to_string(),
        }
    }

    pub fn insufficient_stock(skus: Vec<SkuCode>) -> Self {
        Self {
            reason: RejectionReason::InsufficientStock,
            skus,
            message: OUT_OF_STOCK_MESSAGE.to_string(),
        }
    }

    pub fn persistence_failed() -> Self {
        Self {
            reason: RejectionReason::PersistenceFailed,
            skus: Vec::new(),
            message: PERSISTENCE_FAILED_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_stable() {
        assert_eq!(RejectionReason::InvalidRequest.code(), "INVALID_REQUEST");
        assert_eq!(RejectionReason::ServiceDegraded.code(), "SERVICE_DEGRADED");
        assert_eq!(RejectionReason::InsufficientStock.code(), "INSUFFICIENT_STOCK");
        assert_eq!(RejectionReason::PersistenceFailed.code(), "PERSISTENCE_FAILED");
    }

    #[test]
    fn test_rejection_display() {
        let rejection = OrderRejection::insufficient_stock(vec![SkuCode::new("iphone_13_red")]);
        assert_eq!(
            rejection.to_string(),
            "INSUFFICIENT_STOCK: Product is not in stock, please try again later"
        );
    }

    #[test]
    fn test_invalid_request_carries_validation_message() {
        let rejection = OrderRejection::invalid_request(&OrderError::NoItems);
        assert_eq!(rejection.reason, RejectionReason::InvalidRequest);
        assert_eq!(rejection.message, "Order has no line items");
        assert!(rejection.skus.is_empty());
    }
}

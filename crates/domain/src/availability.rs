//! Stock availability as reported by inventory, and the all-in-stock rule.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::order::SkuCode;

/// Stock status of one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuAvailability {
    pub sku_code: SkuCode,
    pub in_stock: bool,
}

impl SkuAvailability {
    pub fn new(sku_code: impl Into<SkuCode>, in_stock: bool) -> Self {
        Self {
            sku_code: sku_code.into(),
            in_stock,
        }
    }
}

/// Outcome of checking a request's SKUs against reported availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityVerdict {
    /// Every requested SKU is confirmed in stock.
    AllInStock,
    /// The listed SKUs (ascending) are out of stock or were not reported.
    OutOfStock(Vec<SkuCode>),
}

impl AvailabilityVerdict {
    pub fn is_all_in_stock(&self) -> bool {
        matches!(self, AvailabilityVerdict::AllInStock)
    }
}

/// Decides whether every requested SKU is in stock.
///
/// A SKU without any entry counts as out of stock, as does a SKU with
/// conflicting entries. Entries for SKUs that were not requested are
/// ignored.
pub fn evaluate_availability(
    requested: &BTreeSet<SkuCode>,
    availability: &[SkuAvailability],
) -> AvailabilityVerdict {
    let out_of_stock: Vec<SkuCode> = requested
        .iter()
        .filter(|sku| {
            let mut entries = availability.iter().filter(|a| &a.sku_code == *sku).peekable();
            entries.peek().is_none() || entries.any(|a| !a.in_stock)
        })
        .cloned()
        .collect();

    if out_of_stock.is_empty() {
        AvailabilityVerdict::AllInStock
    } else {
        AvailabilityVerdict::OutOfStock(out_of_stock)
    }
}

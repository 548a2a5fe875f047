//! Inventory client trait.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{SkuAvailability, SkuCode};

use crate::error::InventoryError;

/// Asks the inventory service whether products are in stock.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Returns the stock status of every SKU in `skus` using one remote call.
    ///
    /// On success the result holds exactly one entry per requested SKU, in
    /// any order.
    async fn check_availability(
        &self,
        skus: &BTreeSet<SkuCode>,
    ) -> Result<Vec<SkuAvailability>, InventoryError>;
}

#[async_trait]
impl<T: InventoryClient + ?Sized> InventoryClient for Arc<T> {
    async fn check_availability(
        &self,
        skus: &BTreeSet<SkuCode>,
    ) -> Result<Vec<SkuAvailability>, InventoryError> {
        (**self).check_availability(skus).await
    }
}

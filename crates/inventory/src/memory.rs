//! In-memory inventory client.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use domain::{SkuAvailability, SkuCode};
use tokio::sync::RwLock;

use crate::client::InventoryClient;
use crate::error::InventoryError;

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    stock: HashMap<SkuCode, bool>,
    scripted_failures: VecDeque<InventoryError>,
    fail_always: Option<InventoryError>,
    latency: Option<Duration>,
    requests: Vec<BTreeSet<SkuCode>>,
}

/// In-memory inventory for tests and local runs.
///
/// Unknown SKUs are reported out of stock. Failures can be queued one call
/// at a time or made permanent, and every call can be delayed.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryClient {
    state: Arc<RwLock<InMemoryInventoryState>>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryInventoryClient {
    /// Creates a new in-memory inventory with no stock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an inventory from `(sku, in_stock)` pairs.
    pub async fn with_stock<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<SkuCode>,
    {
        let client = Self::new();
        for (sku, in_stock) in entries {
            client.set_stock(sku, in_stock).await;
        }
        client
    }

    /// Sets the stock status reported for a SKU.
    pub async fn set_stock(&self, sku: impl Into<SkuCode>, in_stock: bool) {
        self.state.write().await.stock.insert(sku.into(), in_stock);
    }

    /// Queues a failure for the next call that has not been scripted yet.
    pub async fn push_failure(&self, error: InventoryError) {
        self.state.write().await.scripted_failures.push_back(error);
    }

    /// Makes every call fail with `error` until cleared with `None`.
    pub async fn set_fail_always(&self, error: Option<InventoryError>) {
        self.state.write().await.fail_always = error;
    }

    /// Delays every call by `latency` before answering.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.state.write().await.latency = latency;
    }

    /// Returns the number of calls received, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the SKU sets of all calls received, oldest first.
    pub async fn requests(&self) -> Vec<BTreeSet<SkuCode>> {
        self.state.read().await.requests.clone()
    }
}

#[async_trait]
impl InventoryClient for InMemoryInventoryClient {
    async fn check_availability(
        &self,
        skus: &BTreeSet<SkuCode>,
    ) -> Result<Vec<SkuAvailability>, InventoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let (latency, outcome) = {
            let mut state = self.state.write().await;
            state.requests.push(skus.clone());

            let failure = state
                .scripted_failures
                .pop_front()
                .or_else(|| state.fail_always.clone());

            let outcome = match failure {
                Some(error) => Err(error),
                None => Ok(skus
                    .iter()
                    .map(|sku| {
                        let in_stock = state.stock.get(sku).copied().unwrap_or(false);
                        SkuAvailability::new(sku.clone(), in_stock)
                    })
                    .collect()),
            };
            (state.latency, outcome)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skus(codes: &[&str]) -> BTreeSet<SkuCode> {
        codes.iter().map(|c| SkuCode::new(*c)).collect()
    }

    #[tokio::test]
    async fn test_reports_configured_stock() {
        let client =
            InMemoryInventoryClient::with_stock([("phone", true), ("other_phone", false)]).await;

        let mut result = client
            .check_availability(&skus(&["phone", "other_phone", "unknown"]))
            .await
            .unwrap();
        result.sort_by(|a, b| a.sku_code.cmp(&b.sku_code));

        assert_eq!(
            result,
            vec![
                SkuAvailability::new("other_phone", false),
                SkuAvailability::new("phone", true),
                SkuAvailability::new("unknown", false),
            ]
        );
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failures_run_in_order() {
        let client = InMemoryInventoryClient::with_stock([("phone", true)]).await;
        client
            .push_failure(InventoryError::RemoteUnavailable("down".into()))
            .await;
        client
            .push_failure(InventoryError::RemoteTimeout(Duration::from_secs(1)))
            .await;

        let request = skus(&["phone"]);
        assert!(matches!(
            client.check_availability(&request).await,
            Err(InventoryError::RemoteUnavailable(_))
        ));
        assert!(matches!(
            client.check_availability(&request).await,
            Err(InventoryError::RemoteTimeout(_))
        ));
        assert!(client.check_availability(&request).await.is_ok());
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_fail_always_until_cleared() {
        let client = InMemoryInventoryClient::new();
        client
            .set_fail_always(Some(InventoryError::MalformedResponse("junk".into())))
            .await;

        let request = skus(&["phone"]);
        assert!(client.check_availability(&request).await.is_err());
        assert!(client.check_availability(&request).await.is_err());

        client.set_fail_always(None).await;
        assert!(client.check_availability(&request).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_the_answer() {
        let client = InMemoryInventoryClient::new();
        client.set_latency(Some(Duration::from_secs(5))).await;

        let started = tokio::time::Instant::now();
        client.check_availability(&skus(&["phone"])).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_requests_are_recorded() {
        let client = InMemoryInventoryClient::new();
        client.check_availability(&skus(&["b", "a"])).await.unwrap();

        let requests = client.requests().await;
        assert_eq!(requests, vec![skus(&["a", "b"])]);
    }
}

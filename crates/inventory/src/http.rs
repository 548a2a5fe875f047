//! HTTP implementation of the inventory client.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use domain::{SkuAvailability, SkuCode};
use serde::{Deserialize, Serialize};

use crate::client::InventoryClient;
use crate::error::InventoryError;

/// One entry of the inventory service's JSON reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResponse {
    pub sku_code: String,
    pub is_in_stock: bool,
}

/// Calls `GET {base_url}/api/inventory?skuCode=..&skuCode=..`.
#[derive(Debug, Clone)]
pub struct HttpInventoryClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpInventoryClient {
    /// Creates a client with its own connection pool.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, InventoryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InventoryError::RemoteUnavailable(e.to_string()))?;
        Ok(Self::with_client(client, base_url, timeout))
    }

    /// Creates a client on top of an existing `reqwest` client.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/api/inventory", self.base_url)
    }

    fn transport_error(&self, err: reqwest::Error) -> InventoryError {
        if err.is_timeout() {
            InventoryError::RemoteTimeout(self.timeout)
        } else {
            InventoryError::RemoteUnavailable(err.to_string())
        }
    }
}

/// Folds the reply into exactly one entry per requested SKU.
///
/// Entries for unrequested SKUs are dropped and duplicates collapse with
/// "any out of stock wins". A requested SKU with no entry makes the whole
/// reply malformed.
fn reconcile(
    requested: &BTreeSet<SkuCode>,
    body: &[InventoryResponse],
) -> Result<Vec<SkuAvailability>, InventoryError> {
    requested
        .iter()
        .map(|sku| {
            let mut entries = body
                .iter()
                .filter(|entry| entry.sku_code == sku.as_str())
                .peekable();
            if entries.peek().is_none() {
                return Err(InventoryError::MalformedResponse(format!(
                    "no stock entry for {sku}"
                )));
            }
            let in_stock = entries.all(|entry| entry.is_in_stock);
            Ok(SkuAvailability::new(sku.clone(), in_stock))
        })
        .collect()
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    #[tracing::instrument(skip(self), fields(base_url = %self.base_url, sku_count = skus.len()))]
    async fn check_availability(
        &self,
        skus: &BTreeSet<SkuCode>,
    ) -> Result<Vec<SkuAvailability>, InventoryError> {
        if skus.is_empty() {
            return Ok(Vec::new());
        }

        let query: Vec<(&str, &str)> = skus.iter().map(|sku| ("skuCode", sku.as_str())).collect();

        let response = self
            .client
            .get(self.endpoint())
            .query(&query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(InventoryError::RemoteUnavailable(format!(
                "inventory service returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(InventoryError::MalformedResponse(format!(
                "unexpected status {status}"
            )));
        }

        let body: Vec<InventoryResponse> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                InventoryError::RemoteTimeout(self.timeout)
            } else {
                InventoryError::MalformedResponse(e.to_string())
            }
        })?;

        tracing::debug!(entries = body.len(), "inventory response received");
        reconcile(skus, &body)
    }
}

//! Inventory client error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while asking inventory for stock levels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// The service could not be reached or answered with a server error.
    #[error("Inventory service unavailable: {0}")]
    RemoteUnavailable(String),

    /// The call did not finish within its deadline.
    #[error("Inventory call timed out after {0:?}")]
    RemoteTimeout(Duration),

    /// The service answered, but not with a usable stock report.
    #[error("Malformed inventory response: {0}")]
    MalformedResponse(String),
}

impl InventoryError {
    /// Returns true for failures that may succeed when tried again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            InventoryError::RemoteUnavailable(_) | InventoryError::RemoteTimeout(_)
        )
    }

    /// Short label used in logs and metric tags.
    pub fn kind(&self) -> &'static str {
        match self {
            InventoryError::RemoteUnavailable(_) => "unavailable",
            InventoryError::RemoteTimeout(_) => "timeout",
            InventoryError::MalformedResponse(_) => "malformed",
        }
    }
}

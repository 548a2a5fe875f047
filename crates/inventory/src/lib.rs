//! Client side of the remote inventory service.
//!
//! A single call asks for the stock status of a whole SKU set. The
//! [`InventoryClient`] trait is the seam the resilience layer wraps;
//! [`HttpInventoryClient`] talks to the real service and
//! [`InMemoryInventoryClient`] stands in for it in tests and local runs.

pub mod client;
pub mod error;
pub mod http;
pub mod memory;

pub use client::InventoryClient;
pub use error::InventoryError;
pub use http::{HttpInventoryClient, InventoryResponse};
pub use memory::InMemoryInventoryClient;

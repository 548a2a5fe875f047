//! Shared identifiers used across the order placement crates.

mod types;

pub use types::OrderId;

//! Durable storage for accepted orders.
//!
//! An order is written together with all of its line items or not at all.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use error::{PersistenceError, Result};
pub use memory::InMemoryOrderRepository;
pub use postgres::PostgresOrderRepository;
pub use repository::OrderRepository;

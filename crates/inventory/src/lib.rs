//! Inventory domain module.
//!
//! This crate contains the business rules for product stock and its audit
//! trail, implemented purely as deterministic domain logic (no IO, no
//! storage, no locking).

pub mod error;
pub mod product;
pub mod stock_change;

pub use error::StockError;
pub use product::Product;
pub use stock_change::{NewStockChange, StockChangeRecord};

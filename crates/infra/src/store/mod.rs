//! Product and stock change storage boundary.
//!
//! Defines the repository contracts the ledger consumes, and an in-memory
//! implementation for tests/dev. Both entities are written through one
//! [`UnitOfWork`] so a quantity change and its audit record commit together.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::{InMemoryLedgerStore, InMemoryUnit};
pub use r#trait::{LedgerStore, ProductStore, StockChangeStore, StoreError, UnitOfWork};

//! Infrastructure layer: storage, the ledger service, config, caching.

pub mod cache;
pub mod config;
pub mod ledger;
pub mod store;


pub use config::LedgerConfig;
pub use ledger::{InventoryLedger, LedgerError};
pub use store::{InMemoryLedgerStore, LedgerStore, StoreError};

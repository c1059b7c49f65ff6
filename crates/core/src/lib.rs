//! `stockledger-core`: identifiers, domain errors and the version check
//! shared by the inventory model and its stores.
//!
//! No I/O and no shared state live here.

pub mod concurrency;
pub mod entity;
pub mod error;
pub mod id;

pub use concurrency::ExpectedVersion;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ProductId, StockChangeId};

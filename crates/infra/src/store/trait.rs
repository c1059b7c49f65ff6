use std::sync::Arc;

use thiserror::Error;

use stockledger_core::{DomainError, ProductId};
use stockledger_inventory::{NewStockChange, Product, StockChangeRecord};

/// Store operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// domain errors (validation, invariants). Whatever the variant, a unit of
/// work that fails leaves nothing behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A staged save was based on a version that is no longer current.
    #[error("optimistic concurrency check failed for product {product_id}: {source}")]
    Conflict {
        product_id: ProductId,
        source: DomainError,
    },

    /// The backend failed during read, write or commit.
    #[error("store backend failure: {0}")]
    Backend(String),

    #[error("store lock poisoned")]
    Poisoned,

    /// Input rejected by the domain before reaching storage.
    #[error(transparent)]
    Rejected(#[from] DomainError),
}

impl StoreError {
    /// Whether repeating the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Conflict { source, .. } | StoreError::Rejected(source) => {
                source.is_retryable()
            }
            StoreError::Backend(_) | StoreError::Poisoned => false,
        }
    }
}

/// Product access within a unit of work.
pub trait ProductStore {
    /// Load the current state of a product, including its version.
    ///
    /// Reads observe writes already staged in the same unit.
    fn load_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Stage a product write.
    ///
    /// The product's `version()` is the expectation checked at commit: if
    /// another writer committed in between, the commit fails with
    /// [`StoreError::Conflict`].
    fn save(&mut self, product: Product) -> Result<(), StoreError>;
}

/// Audit trail access within a unit of work.
pub trait StockChangeStore {
    /// Stage an append-only stock change record.
    fn append(&mut self, change: NewStockChange) -> Result<(), StoreError>;

    /// Committed records for a product, ordered by id (creation order).
    fn list_by_product_id(&self, id: ProductId) -> Result<Vec<StockChangeRecord>, StoreError>;
}

/// A set of staged product saves and stock change appends.
///
/// `commit` makes all of them visible at once or none of them. Dropping the
/// unit without committing discards everything it staged.
pub trait UnitOfWork: ProductStore + StockChangeStore {
    /// Apply every staged write atomically, returning the appended records
    /// with their store-assigned ids in append order.
    fn commit(self) -> Result<Vec<StockChangeRecord>, StoreError>;
}

/// Durable store for products and their stock change history.
///
/// Implementations must:
/// - check every staged save's version against the committed state on commit
/// - apply saves and appends of one unit all or nothing
/// - assign record ids from one increasing sequence
/// - never update or delete stock change records
pub trait LedgerStore: Send + Sync {
    type Unit: UnitOfWork;

    /// Open a new unit of work.
    fn begin(&self) -> Result<Self::Unit, StoreError>;

    /// Committed records for a product, outside of any unit of work.
    fn list_by_product_id(&self, id: ProductId) -> Result<Vec<StockChangeRecord>, StoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    type Unit = S::Unit;

    fn begin(&self) -> Result<Self::Unit, StoreError> {
        (**self).begin()
    }

    fn list_by_product_id(&self, id: ProductId) -> Result<Vec<StockChangeRecord>, StoreError> {
        (**self).list_by_product_id(id)
    }
}

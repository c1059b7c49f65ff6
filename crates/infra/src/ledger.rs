//! Inventory ledger: serialized, audited stock changes.
//!
//! The ledger is the only writer of product quantities. Each call runs this
//! pipeline inside one unit of work:
//!
//! ```text
//! decrease(product_id, quantity)
//!   ↓
//! 1. Validate input (no store access)
//!   ↓
//! 2. Load product (current quantity + version)
//!   ↓
//! 3. Check sufficiency and compute the change (pure domain logic)
//!   ↓
//! 4. Stage save + audit append
//!   ↓
//! 5. Commit both atomically (version-checked)
//! ```
//!
//! ## Serialization per product
//!
//! Writes use optimistic concurrency: the save staged in step 4 expects the
//! version loaded in step 2, so a commit fails with a conflict if another
//! writer committed to the same product in between. The sufficiency check and
//! the write therefore always see the same quantity. Conflicting attempts are
//! retried from step 2, with jittered exponential backoff, until
//! [`LedgerConfig`]'s timeout (or optional attempt cap) runs out, and then
//! surface as [`LedgerError::Contention`].
//!
//! Calls on different products never conflict. Each call touches exactly one
//! product and holds no lock while it computes.
//!
//! A unit of work that does not reach commit (error, panic, abandoned caller)
//! is dropped together with everything it staged.

use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use stockledger_core::ProductId;
use stockledger_inventory::{StockChangeRecord, StockError};

use crate::config::{LedgerConfig, MAX_BACKOFF_DOUBLINGS};
use crate::store::{LedgerStore, ProductStore, StockChangeStore, StoreError, UnitOfWork};

/// Outcome of a rejected or failed ledger call.
///
/// No variant leaves a quantity change without its audit record or the
/// other way round.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Requested quantity was zero or negative (or would overflow); the store
    /// was not touched.
    #[error("invalid quantity: {requested}")]
    InvalidQuantity { requested: i64 },

    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    #[error(
        "insufficient stock for product {product_name}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_name: String,
        available: i64,
        requested: i64,
    },

    /// Writes to the product could not be serialized within the retry budget.
    /// Nothing was applied; the caller may retry.
    #[error("contention on product {product_id}: gave up after {attempts} attempt(s)")]
    Contention { product_id: ProductId, attempts: u32 },

    /// The store failed; the unit of work was rolled back.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<StockError> for LedgerError {
    fn from(value: StockError) -> Self {
        match value {
            StockError::InvalidQuantity { requested } => LedgerError::InvalidQuantity { requested },
            StockError::Overflow { requested, .. } => LedgerError::InvalidQuantity { requested },
            StockError::InsufficientStock {
                product_name,
                available,
                requested,
            } => LedgerError::InsufficientStock {
                product_name,
                available,
                requested,
            },
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Direction {
    Decrease,
    Increase,
}

/// Stock ledger service over a [`LedgerStore`].
///
/// Holds no state besides its store handle and configuration: every call
/// re-reads the product, so the ledger can be shared freely across threads
/// (e.g. behind an `Arc`).
#[derive(Debug)]
pub struct InventoryLedger<S> {
    store: S,
    config: LedgerConfig,
}

impl<S> InventoryLedger<S> {
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}

impl<S> InventoryLedger<S>
where
    S: LedgerStore,
{
    /// Take `quantity` units of a product out of stock and record the change.
    ///
    /// On success returns the new audit record (delta = `-quantity`).
    /// Requesting exactly the available quantity succeeds and leaves zero.
    #[instrument(name = "ledger.decrease", skip_all, fields(%product_id, requested = quantity))]
    pub fn decrease(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<StockChangeRecord, LedgerError> {
        self.execute(product_id, quantity, Direction::Decrease)
    }

    /// Put `quantity` units of a product back into stock and record the change.
    #[instrument(name = "ledger.increase", skip_all, fields(%product_id, requested = quantity))]
    pub fn increase(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<StockChangeRecord, LedgerError> {
        self.execute(product_id, quantity, Direction::Increase)
    }

    /// Committed audit trail of a product, oldest first.
    pub fn history(&self, product_id: ProductId) -> Result<Vec<StockChangeRecord>, LedgerError> {
        Ok(self.store.list_by_product_id(product_id)?)
    }

    fn execute(
        &self,
        product_id: ProductId,
        quantity: i64,
        direction: Direction,
    ) -> Result<StockChangeRecord, LedgerError> {
        if quantity <= 0 {
            warn!("rejected non-positive quantity");
            return Err(LedgerError::InvalidQuantity { requested: quantity });
        }

        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts = attempts.saturating_add(1);
            match self.attempt(product_id, quantity, direction) {
                Ok(record) => {
                    info!(change_id = %record.id(), delta = record.delta(), attempts, "stock change committed");
                    return Ok(record);
                }
                Err(LedgerError::Store(err)) if err.is_retryable() => {
                    if self.budget_exhausted(attempts, started) {
                        warn!(attempts, error = %err, "giving up on conflicting writes");
                        return Err(LedgerError::Contention {
                            product_id,
                            attempts,
                        });
                    }
                    debug!(attempts, error = %err, "write conflict; retrying");
                    self.back_off(attempts, started);
                }
                Err(err) => {
                    warn!(error = %err, "stock change rejected");
                    return Err(err);
                }
            }
        }
    }

    /// One read-check-write pass. The unit is dropped (rolled back) on any
    /// early return.
    fn attempt(
        &self,
        product_id: ProductId,
        quantity: i64,
        direction: Direction,
    ) -> Result<StockChangeRecord, LedgerError> {
        let mut unit = self.store.begin()?;

        let mut product = unit
            .load_by_id(product_id)?
            .ok_or(LedgerError::ProductNotFound(product_id))?;

        let change = match direction {
            Direction::Decrease => product.decrease(quantity)?,
            Direction::Increase => product.increase(quantity)?,
        };

        unit.save(product)?;
        unit.append(change)?;

        let mut committed = unit.commit()?;
        committed.pop().ok_or_else(|| {
            LedgerError::Store(StoreError::Backend(
                "commit returned no stock change record".to_string(),
            ))
        })
    }

    fn budget_exhausted(&self, attempts: u32, started: Instant) -> bool {
        let capped = self
            .config
            .max_attempts
            .is_some_and(|max| attempts >= max.max(1));
        capped || started.elapsed() >= self.config.timeout
    }

    /// Sleep a random share of an exponentially growing window, never past
    /// the call's deadline.
    fn back_off(&self, attempts: u32, started: Instant) {
        let base = self.config.retry_backoff;
        if base.is_zero() {
            std::thread::yield_now();
            return;
        }

        let doublings = attempts.saturating_sub(1).min(MAX_BACKOFF_DOUBLINGS);
        let window = base.saturating_mul(1 << doublings);
        let jittered = Duration::from_nanos(
            rand::thread_rng().gen_range(0..=u64::try_from(window.as_nanos()).unwrap_or(u64::MAX)),
        );
        let remaining = self.config.timeout.saturating_sub(started.elapsed());
        std::thread::sleep(jittered.min(remaining));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    use stockledger_core::DomainError;
    use stockledger_inventory::{NewStockChange, Product};

    use super::*;
    use crate::store::{InMemoryLedgerStore, InMemoryUnit};

    /// Failure modes injected into the wrapped in-memory store.
    #[derive(Debug, Default, Clone, Copy)]
    struct Faults {
        fail_append: bool,
        always_conflict: bool,
        fail_load: bool,
        /// Pause before every commit, widening the window for races.
        commit_delay: Duration,
    }

    /// In-memory store with fault injection and access counting.
    #[derive(Debug, Default)]
    struct FaultyStore {
        inner: InMemoryLedgerStore,
        faults: Faults,
        begins: AtomicUsize,
    }

    struct FaultyUnit {
        inner: InMemoryUnit,
        faults: Faults,
    }

    impl LedgerStore for FaultyStore {
        type Unit = FaultyUnit;

        fn begin(&self) -> Result<Self::Unit, StoreError> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            Ok(FaultyUnit {
                inner: self.inner.begin()?,
                faults: self.faults,
            })
        }

        fn list_by_product_id(&self, id: ProductId) -> Result<Vec<StockChangeRecord>, StoreError> {
            LedgerStore::list_by_product_id(&self.inner, id)
        }
    }

    impl ProductStore for FaultyUnit {
        fn load_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
            if self.faults.fail_load {
                return Err(StoreError::Backend("read failed".to_string()));
            }
            self.inner.load_by_id(id)
        }

        fn save(&mut self, product: Product) -> Result<(), StoreError> {
            self.inner.save(product)
        }
    }

    impl StockChangeStore for FaultyUnit {
        fn append(&mut self, change: NewStockChange) -> Result<(), StoreError> {
            if self.faults.fail_append {
                return Err(StoreError::Backend("audit write failed".to_string()));
            }
            self.inner.append(change)
        }

        fn list_by_product_id(&self, id: ProductId) -> Result<Vec<StockChangeRecord>, StoreError> {
            StockChangeStore::list_by_product_id(&self.inner, id)
        }
    }

    impl UnitOfWork for FaultyUnit {
        fn commit(self) -> Result<Vec<StockChangeRecord>, StoreError> {
            if self.faults.always_conflict {
                return Err(StoreError::Conflict {
                    product_id: ProductId::default(),
                    source: DomainError::conflict(0, 1),
                });
            }
            if !self.faults.commit_delay.is_zero() {
                thread::sleep(self.faults.commit_delay);
            }
            self.inner.commit()
        }
    }

    fn faulty(faults: Faults) -> (InventoryLedger<Arc<FaultyStore>>, ProductId) {
        faulty_with(faults, 10, LedgerConfig::default())
    }

    fn faulty_with(
        faults: Faults,
        stock: i64,
        config: LedgerConfig,
    ) -> (InventoryLedger<Arc<FaultyStore>>, ProductId) {
        let store = Arc::new(FaultyStore {
            faults,
            ..FaultyStore::default()
        });
        let id = store.inner.create_product("Widget", stock).unwrap().id_typed();
        (InventoryLedger::new(store, config), id)
    }

    fn quantity(ledger: &InventoryLedger<Arc<FaultyStore>>, id: ProductId) -> i64 {
        ledger.store().inner.get_product(id).unwrap().unwrap().quantity()
    }

    #[test]
    fn non_positive_quantity_is_rejected_before_store_access() {
        let (ledger, id) = faulty(Faults::default());

        for requested in [0, -1, i64::MIN] {
            assert_eq!(
                ledger.decrease(id, requested),
                Err(LedgerError::InvalidQuantity { requested })
            );
        }
        assert_eq!(ledger.increase(id, 0), Err(LedgerError::InvalidQuantity { requested: 0 }));
        assert_eq!(ledger.store().begins.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_audit_append_leaves_quantity_unchanged() {
        let (ledger, id) = faulty(Faults {
            fail_append: true,
            ..Faults::default()
        });

        let err = ledger.decrease(id, 4).unwrap_err();
        assert!(matches!(err, LedgerError::Store(StoreError::Backend(_))));
        assert_eq!(quantity(&ledger, id), 10);
        assert!(ledger.history(id).unwrap().is_empty());
    }

    #[test]
    fn failed_read_surfaces_store_error() {
        let (ledger, id) = faulty(Faults {
            fail_load: true,
            ..Faults::default()
        });

        assert!(matches!(ledger.decrease(id, 1), Err(LedgerError::Store(_))));
        assert_eq!(ledger.store().begins.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attempt_cap_surfaces_as_contention() {
        let (ledger, id) = faulty_with(
            Faults {
                always_conflict: true,
                ..Faults::default()
            },
            10,
            LedgerConfig {
                max_attempts: Some(5),
                retry_backoff: Duration::ZERO,
                ..LedgerConfig::default()
            },
        );

        assert_eq!(
            ledger.decrease(id, 1),
            Err(LedgerError::Contention {
                product_id: id,
                attempts: 5,
            })
        );
        assert_eq!(ledger.config().max_attempts, Some(5));
        assert_eq!(ledger.store().begins.load(Ordering::SeqCst), 5);
        assert_eq!(quantity(&ledger, id), 10);
        assert!(ledger.history(id).unwrap().is_empty());
    }

    #[test]
    fn exhausted_timeout_surfaces_as_contention() {
        let (ledger, id) = faulty_with(
            Faults {
                always_conflict: true,
                ..Faults::default()
            },
            10,
            LedgerConfig {
                max_attempts: None,
                timeout: Duration::ZERO,
                retry_backoff: Duration::ZERO,
            },
        );

        assert_eq!(
            ledger.decrease(id, 1),
            Err(LedgerError::Contention {
                product_id: id,
                attempts: 1,
            })
        );
    }

    #[test]
    fn uncapped_retries_run_until_the_timeout() {
        let timeout = Duration::from_millis(50);
        let (ledger, id) = faulty_with(
            Faults {
                always_conflict: true,
                ..Faults::default()
            },
            10,
            LedgerConfig {
                max_attempts: None,
                timeout,
                retry_backoff: Duration::from_millis(1),
            },
        );

        let started = Instant::now();
        let err = ledger.decrease(id, 1).unwrap_err();

        assert!(started.elapsed() >= timeout);
        assert!(matches!(err, LedgerError::Contention { attempts, .. } if attempts > 1));
        assert_eq!(quantity(&ledger, id), 10);
    }

    #[test]
    fn more_racing_callers_than_any_fixed_cap_all_succeed_on_a_slow_store() {
        const CALLERS: usize = 48;

        let (ledger, id) = faulty_with(
            Faults {
                commit_delay: Duration::from_millis(1),
                ..Faults::default()
            },
            CALLERS as i64,
            LedgerConfig::default(),
        );
        let barrier = Barrier::new(CALLERS);

        let results: Vec<_> = thread::scope(|s| {
            let (ledger, barrier) = (&ledger, &barrier);
            let handles: Vec<_> = (0..CALLERS)
                .map(|_| {
                    s.spawn(move || {
                        barrier.wait();
                        ledger.decrease(id, 1)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let contended = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(contended, 0, "{results:?}");
        assert_eq!(quantity(&ledger, id), 0);
        assert_eq!(ledger.history(id).unwrap().len(), CALLERS);
    }

    #[test]
    fn insufficient_stock_is_not_retried() {
        let (ledger, id) = faulty(Faults::default());

        let err = ledger.decrease(id, 11).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                product_name: "Widget".to_string(),
                available: 10,
                requested: 11,
            }
        );
        assert!(err.to_string().contains("Widget"));
        assert_eq!(ledger.store().begins.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn increase_records_positive_delta() {
        let (ledger, id) = faulty(Faults::default());

        let record = ledger.increase(id, 5).unwrap();
        assert_eq!(record.delta(), 5);
        assert_eq!(quantity(&ledger, id), 15);
    }

    #[test]
    fn overflowing_increase_is_invalid_quantity() {
        let (ledger, id) = faulty(Faults::default());

        assert_eq!(
            ledger.increase(id, i64::MAX),
            Err(LedgerError::InvalidQuantity { requested: i64::MAX })
        );
        assert_eq!(quantity(&ledger, id), 10);
    }
}

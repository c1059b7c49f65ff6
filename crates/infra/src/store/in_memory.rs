use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use stockledger_core::{Entity, ExpectedVersion, ProductId, StockChangeId};
use stockledger_inventory::{NewStockChange, Product, StockChangeRecord};

use super::r#trait::{LedgerStore, ProductStore, StockChangeStore, StoreError, UnitOfWork};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    /// Append-only, in id order.
    changes: Vec<StockChangeRecord>,
    last_change_id: u64,
}

impl State {
    fn current_version(&self, id: ProductId) -> u64 {
        self.products.get(&id).map(|p| p.version()).unwrap_or(0)
    }

    fn changes_for(&self, id: ProductId) -> Vec<StockChangeRecord> {
        self.changes
            .iter()
            .filter(|r| r.product_id() == id)
            .cloned()
            .collect()
    }
}

/// In-memory, single-node ledger store.
///
/// Intended for tests/dev. A commit holds the write lock only while it
/// validates and applies its own staged writes; reads and staging never
/// block other units.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a product with an initial quantity, assigning its id.
    pub fn create_product(
        &self,
        name: impl Into<String>,
        quantity: i64,
    ) -> Result<Product, StoreError> {
        let product = Product::new(ProductId::new(), name, quantity)?;
        let id = product.id_typed();

        let mut unit = self.begin()?;
        unit.stage(product, ExpectedVersion::Any);
        unit.commit()?;
        debug!(product_id = %id, quantity, "product created");

        self.get_product(id)?
            .ok_or_else(|| StoreError::Backend(format!("created product {id} is missing")))
    }

    /// Committed state of a product.
    pub fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.products.get(&id).cloned())
    }
}

impl LedgerStore for InMemoryLedgerStore {
    type Unit = InMemoryUnit;

    fn begin(&self) -> Result<Self::Unit, StoreError> {
        Ok(InMemoryUnit {
            state: Arc::clone(&self.state),
            products: Vec::new(),
            changes: Vec::new(),
        })
    }

    fn list_by_product_id(&self, id: ProductId) -> Result<Vec<StockChangeRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.changes_for(id))
    }
}

/// Unit of work over [`InMemoryLedgerStore`].
///
/// Writes are buffered locally until [`UnitOfWork::commit`].
#[derive(Debug)]
pub struct InMemoryUnit {
    state: Arc<RwLock<State>>,
    products: Vec<(Product, ExpectedVersion)>,
    changes: Vec<NewStockChange>,
}

impl InMemoryUnit {
    fn is_empty(&self) -> bool {
        self.products.is_empty() && self.changes.is_empty()
    }

    /// A second save of the same product keeps the first expectation.
    fn stage(&mut self, product: Product, expected: ExpectedVersion) {
        match self
            .products
            .iter_mut()
            .find(|(p, _)| p.id_typed() == product.id_typed())
        {
            Some((staged, _)) => *staged = product,
            None => self.products.push((product, expected)),
        }
    }
}

impl ProductStore for InMemoryUnit {
    fn load_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        if let Some((staged, _)) = self.products.iter().find(|(p, _)| p.id_typed() == id) {
            return Ok(Some(staged.clone()));
        }
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.products.get(&id).cloned())
    }

    fn save(&mut self, product: Product) -> Result<(), StoreError> {
        let expected = ExpectedVersion::Exact(product.version());
        self.stage(product, expected);
        Ok(())
    }
}

impl StockChangeStore for InMemoryUnit {
    fn append(&mut self, change: NewStockChange) -> Result<(), StoreError> {
        self.changes.push(change);
        Ok(())
    }

    fn list_by_product_id(&self, id: ProductId) -> Result<Vec<StockChangeRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.changes_for(id))
    }
}

impl UnitOfWork for InMemoryUnit {
    fn commit(mut self) -> Result<Vec<StockChangeRecord>, StoreError> {
        if self.is_empty() {
            return Ok(vec![]);
        }

        let products = std::mem::take(&mut self.products);
        let changes = std::mem::take(&mut self.changes);

        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;

        // Validate everything before applying anything.
        let mut next = Vec::with_capacity(products.len());
        for (product, expected) in &products {
            let product_id = product.id_typed();
            let current = state.current_version(product_id);
            expected
                .check(current)
                .map_err(|source| StoreError::Conflict { product_id, source })?;
            next.push(Product::restore(
                product_id,
                product.name(),
                product.quantity(),
                current + 1,
            )?);
        }
        for change in &changes {
            let known = state.products.contains_key(&change.product_id)
                || products.iter().any(|(p, _)| p.id_typed() == change.product_id);
            if !known {
                return Err(StoreError::Backend(format!(
                    "stock change references unknown product {}",
                    change.product_id
                )));
            }
        }

        for product in next {
            state.products.insert(product.id_typed(), product);
        }

        let mut committed = Vec::with_capacity(changes.len());
        for change in changes {
            state.last_change_id += 1;
            let record = change.into_record(StockChangeId::new(state.last_change_id));
            state.changes.push(record.clone());
            committed.push(record);
        }

        Ok(committed)
    }
}

impl Drop for InMemoryUnit {
    fn drop(&mut self) {
        if !self.is_empty() {
            debug!(
                staged_products = self.products.len(),
                staged_changes = self.changes.len(),
                "unit of work dropped without commit; staged writes discarded"
            );
        }
    }
}

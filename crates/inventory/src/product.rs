use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, Entity, ProductId};

use crate::error::StockError;
use crate::stock_change::NewStockChange;

/// A stocked product.
///
/// `quantity` is never negative. Mutations go through [`Product::decrease`]
/// and [`Product::increase`], which check the invariant before touching
/// state and describe the change as a [`NewStockChange`] for the audit trail.
///
/// Deserialization runs the same checks as [`Product::restore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProductRecord")]
pub struct Product {
    id: ProductId,
    name: String,
    quantity: i64,
    version: u64,
}

impl Product {
    /// Build a not-yet-persisted product.
    pub fn new(id: ProductId, name: impl Into<String>, quantity: i64) -> Result<Self, DomainError> {
        let name = name.into();
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if quantity < 0 {
            return Err(DomainError::invariant("quantity cannot be negative"));
        }
        Ok(Self {
            id,
            name: name.to_string(),
            quantity,
            version: 0,
        })
    }

    /// Rebuild a product from persisted state at the given `version`.
    ///
    /// Applies the same validation as [`Product::new`]; stores call this
    /// with the version they assign on commit.
    pub fn restore(
        id: ProductId,
        name: impl Into<String>,
        quantity: i64,
        version: u64,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            version,
            ..Self::new(id, name, quantity)?
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    /// Take `requested` units out of stock.
    ///
    /// Taking exactly the available quantity is allowed and leaves zero.
    pub fn decrease(&mut self, requested: i64) -> Result<NewStockChange, StockError> {
        ensure_positive(requested)?;
        if self.quantity < requested {
            return Err(StockError::InsufficientStock {
                product_name: self.name.clone(),
                available: self.quantity,
                requested,
            });
        }
        self.quantity -= requested;
        Ok(NewStockChange::new(self.id, -requested))
    }

    /// Put `requested` units back into stock.
    pub fn increase(&mut self, requested: i64) -> Result<NewStockChange, StockError> {
        ensure_positive(requested)?;
        self.quantity = self
            .quantity
            .checked_add(requested)
            .ok_or(StockError::Overflow {
                available: self.quantity,
                requested,
            })?;
        Ok(NewStockChange::new(self.id, requested))
    }
}

fn ensure_positive(requested: i64) -> Result<(), StockError> {
    if requested <= 0 {
        return Err(StockError::InvalidQuantity { requested });
    }
    Ok(())
}

/// Wire shape of a [`Product`], validated on the way in.
#[derive(Deserialize)]
struct ProductRecord {
    id: ProductId,
    name: String,
    quantity: i64,
    version: u64,
}

impl TryFrom<ProductRecord> for Product {
    type Error = DomainError;

    fn try_from(record: ProductRecord) -> Result<Self, Self::Error> {
        Product::restore(record.id, record.name, record.quantity, record.version)
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, StockChangeId};

/// A stock change ready to be appended (not yet assigned an id).
///
/// The creation timestamp is taken when the change is constructed; callers
/// never supply it. The store assigns the [`StockChangeId`] on commit,
/// turning this into a [`StockChangeRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockChange {
    pub product_id: ProductId,
    /// Signed change in quantity (negative for a decrease).
    pub delta: i64,
    pub created_at: DateTime<Utc>,
}

impl NewStockChange {
    pub fn new(product_id: ProductId, delta: i64) -> Self {
        Self {
            product_id,
            delta,
            created_at: Utc::now(),
        }
    }

    /// Attach the store-assigned identity.
    pub fn into_record(self, id: StockChangeId) -> StockChangeRecord {
        StockChangeRecord {
            id,
            product_id: self.product_id,
            delta: self.delta,
            created_at: self.created_at,
        }
    }
}

/// Immutable audit entry for one committed quantity change.
///
/// Records are append-only: the store never updates or deletes them. They are
/// looked up by `product_id`; the product keeps no back-reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChangeRecord {
    id: StockChangeId,
    product_id: ProductId,
    delta: i64,
    created_at: DateTime<Utc>,
}

impl StockChangeRecord {
    pub fn id(&self) -> StockChangeId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn delta(&self) -> i64 {
        self.delta
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

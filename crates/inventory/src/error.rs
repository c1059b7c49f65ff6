use thiserror::Error;

/// Rejection of a stock change by the product's invariants.
///
/// Every variant is raised before the product is mutated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// Requested quantity was zero or negative.
    #[error("invalid quantity: {requested} (must be positive)")]
    InvalidQuantity { requested: i64 },

    #[error(
        "insufficient stock for product {product_name}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_name: String,
        available: i64,
        requested: i64,
    },

    /// The resulting quantity would not fit the quantity type.
    #[error("stock overflow: available {available}, requested {requested}")]
    Overflow { available: i64, requested: i64 },
}

//! Tracing and logging setup shared by every process embedding the ledger.

pub mod tracing;

pub use self::tracing::{DEFAULT_FILTER, init_with_filter};

/// Install JSON logging filtered by `RUST_LOG`. Later calls do nothing.
pub fn init() {
    self::tracing::init();
}

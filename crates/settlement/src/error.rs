//! Settlement error types.

use common::{InvalidQuantity, ProductId};
use inventory::InventoryError;
use ledger::LedgerError;
use thiserror::Error;

/// A checkout request that cannot be settled at all.
///
/// Raised while building a [`crate::CheckoutRequest`]; once a request
/// exists, settling it never fails as a whole.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettlementError {
    /// The checkout has no line items.
    #[error("Checkout has no items")]
    EmptyCheckout,

    /// A line item asked for zero or a negative number of units.
    #[error("Item {index}: {source}")]
    InvalidQuantity {
        index: usize,
        #[source]
        source: InvalidQuantity,
    },

    /// A price or total was below zero.
    #[error("Negative amount for {0}")]
    NegativeAmount(String),
}

/// Failures of the direct single-item sale path.
#[derive(Debug, Error)]
pub enum SaleError {
    #[error(transparent)]
    InvalidQuantity(#[from] InvalidQuantity),

    /// The product identifier is not in the store's key format.
    #[error("Invalid product identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Insufficient stock for product {product_id}: requested {requested}")]
    StockInsufficient { product_id: ProductId, requested: u32 },

    /// Storage failed or timed out.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures while reading sales history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),
}

/// Convenience type alias for history reads.
pub type Result<T> = std::result::Result<T, HistoryError>;

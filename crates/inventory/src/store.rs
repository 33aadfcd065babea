use std::sync::Arc;

use async_trait::async_trait;
use common::{ProductId, Quantity};

use crate::{NewProduct, Product, Result};

/// Outcome of a conditional stock decrement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// Stock was decremented. Carries the product as it is after the decrement.
    Reserved(Product),
    /// The product exists but holds fewer units than requested. Nothing changed.
    InsufficientStock,
    /// No product with that id exists.
    NotFound,
}

impl Reservation {
    pub fn is_reserved(&self) -> bool {
        matches!(self, Reservation::Reserved(_))
    }

    /// Remaining stock after a successful reservation.
    pub fn new_quantity(&self) -> Option<u32> {
        match self {
            Reservation::Reserved(product) => Some(product.quantity),
            _ => None,
        }
    }

    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Reservation::Reserved(_) => "reserved",
            Reservation::InsufficientStock => "insufficient_stock",
            Reservation::NotFound => "not_found",
        }
    }
}

/// Authoritative store of per-product available quantity.
///
/// All implementations must be thread-safe (Send + Sync) and must implement
/// [`InventoryStore::try_reserve`] as one indivisible compare-and-decrement:
/// under any number of concurrent callers the total reserved quantity never
/// exceeds the stock present when the window opened.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Decrements the product's quantity by `quantity` if and only if at least
    /// that many units are available.
    async fn try_reserve(&self, id: ProductId, quantity: Quantity) -> Result<Reservation>;

    /// Loads a product by its storage key.
    async fn get(&self, id: ProductId) -> Result<Option<Product>>;

    /// Finds a product whose name matches exactly, ignoring case and surrounding
    /// whitespace. When several match, the oldest one wins.
    async fn find_by_name(&self, name: &str) -> Result<Option<Product>>;

    /// Loads every product whose id is in `ids`. Unknown ids are skipped.
    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Stores a new catalog product.
    async fn insert(&self, product: NewProduct) -> Result<Product>;
}

// Shared handles (including `Arc<dyn InventoryStore>`) are stores too.
#[async_trait]
impl<T: InventoryStore + ?Sized> InventoryStore for Arc<T> {
    async fn try_reserve(&self, id: ProductId, quantity: Quantity) -> Result<Reservation> {
        (**self).try_reserve(id, quantity).await
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        (**self).get(id).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Product>> {
        (**self).find_by_name(name).await
    }

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        (**self).get_many(ids).await
    }

    async fn insert(&self, product: NewProduct) -> Result<Product> {
        (**self).insert(product).await
    }
}

pub(crate) fn record_reservation(id: ProductId, quantity: Quantity, outcome: &Reservation) {
    metrics::counter!("inventory_reservations_total", "outcome" => outcome.label()).increment(1);
    tracing::debug!(
        product_id = %id,
        quantity = quantity.get(),
        outcome = outcome.label(),
        remaining = outcome.new_quantity(),
        "reservation attempted"
    );
}

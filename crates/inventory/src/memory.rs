use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{ProductId, Quantity};
use tokio::sync::RwLock;

use crate::store::{InventoryStore, Reservation, record_reservation};
use crate::{InventoryError, NewProduct, Product, Result};

#[derive(Debug, Default)]
struct FaultState {
    fail_on_reserve: bool,
    reserve_delay: Option<Duration>,
}

/// In-memory inventory store.
///
/// The compare-and-decrement runs entirely under one write guard of the
/// product map, so concurrent reservations are serialized.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    faults: Arc<RwLock<FaultState>>,
}

impl InMemoryInventoryStore {
    /// Creates a new empty in-memory inventory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current stock of a product, if it exists.
    pub async fn quantity_of(&self, id: ProductId) -> Option<u32> {
        self.products.read().await.get(&id).map(|p| p.quantity)
    }

    /// Returns the number of products stored.
    pub async fn product_count(&self) -> usize {
        self.products.read().await.len()
    }

    /// Renames a product in place, standing in for a catalog edit.
    pub async fn rename(&self, id: ProductId, name: impl Into<String>) -> bool {
        match self.products.write().await.get_mut(&id) {
            Some(product) => {
                product.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Makes every subsequent `try_reserve` fail with a storage error.
    pub async fn set_fail_on_reserve(&self, fail: bool) {
        self.faults.write().await.fail_on_reserve = fail;
    }

    /// Delays every subsequent `try_reserve` before it takes the lock.
    pub async fn set_reserve_delay(&self, delay: Option<Duration>) {
        self.faults.write().await.reserve_delay = delay;
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn try_reserve(&self, id: ProductId, quantity: Quantity) -> Result<Reservation> {
        let (fail, delay) = {
            let faults = self.faults.read().await;
            (faults.fail_on_reserve, faults.reserve_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(InventoryError::Unavailable(
                "reservation rejected by fault injection".to_string(),
            ));
        }

        let mut products = self.products.write().await;
        let outcome = match products.get_mut(&id) {
            None => Reservation::NotFound,
            Some(product) if product.quantity < quantity.get() => Reservation::InsufficientStock,
            Some(product) => {
                product.quantity -= quantity.get();
                Reservation::Reserved(product.clone())
            }
        };
        drop(products);

        record_reservation(id, quantity, &outcome);
        Ok(outcome)
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products
            .values()
            .filter(|p| p.name_matches(name))
            .min_by_key(|p| (p.created_at, p.id))
            .cloned())
    }

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn insert(&self, product: NewProduct) -> Result<Product> {
        product.validate()?;
        let product = product.into_product(Utc::now());

        let mut products = self.products.write().await;
        if products.contains_key(&product.id) {
            return Err(InventoryError::InvalidProduct(format!(
                "product {} already exists",
                product.id
            )));
        }
        products.insert(product.id, product.clone());
        Ok(product)
    }
}

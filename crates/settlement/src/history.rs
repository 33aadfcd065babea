//! Sales history with product details joined at read time.

use std::collections::HashMap;

use common::{BuyerId, CheckoutId};
use inventory::InventoryStore;
use ledger::{SaleLedger, SaleRecord};

use crate::error::Result;
use crate::outcome::SaleView;

pub const RECENT_DEFAULT_LIMIT: usize = 50;
pub const RECENT_MAX_LIMIT: usize = 200;

/// Read side of the ledger.
///
/// Records only snapshot price and quantity; names, descriptions and images
/// are looked up when the history is read, so a renamed product shows its
/// current name.
pub struct SalesHistory<I, L>
where
    I: InventoryStore,
    L: SaleLedger,
{
    inventory: I,
    ledger: L,
}

impl<I, L> SalesHistory<I, L>
where
    I: InventoryStore,
    L: SaleLedger,
{
    pub fn new(inventory: I, ledger: L) -> Self {
        Self { inventory, ledger }
    }

    /// Every sale of one buyer, most recent first.
    #[tracing::instrument(skip(self, buyer), fields(buyer = %buyer))]
    pub async fn for_buyer(&self, buyer: &BuyerId) -> Result<Vec<SaleView>> {
        let records = self.ledger.list_by_buyer(buyer).await?;
        self.join(records).await
    }

    /// The most recent sales across all buyers. `limit` is clamped to
    /// `1..=RECENT_MAX_LIMIT`; `None` means [`RECENT_DEFAULT_LIMIT`].
    #[tracing::instrument(skip(self))]
    pub async fn recent(&self, limit: Option<usize>) -> Result<Vec<SaleView>> {
        let limit = clamp_limit(limit);
        let records = self.ledger.list_recent(limit).await?;
        self.join(records).await
    }

    /// The records of one checkout attempt, in item order.
    #[tracing::instrument(skip(self))]
    pub async fn for_checkout(&self, checkout_id: CheckoutId) -> Result<Vec<SaleView>> {
        let records = self.ledger.list_by_checkout(checkout_id).await?;
        self.join(records).await
    }

    async fn join(&self, records: Vec<SaleRecord>) -> Result<Vec<SaleView>> {
        let mut ids: Vec<_> = records.iter().filter_map(SaleRecord::product_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let products: HashMap<_, _> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.inventory
                .get_many(&ids)
                .await?
                .into_iter()
                .map(|p| (p.id, p.summary()))
                .collect()
        };

        Ok(records
            .into_iter()
            .map(|record| SaleView {
                product: record.product_id().and_then(|id| products.get(&id).cloned()),
                record,
            })
            .collect())
    }
}

pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(RECENT_DEFAULT_LIMIT)
        .clamp(1, RECENT_MAX_LIMIT)
}

use std::sync::Arc;

use async_trait::async_trait;
use common::{BuyerId, CheckoutId, SaleId};

use crate::{Result, SaleRecord};

/// Append-only store of settlement outcomes.
///
/// Records are never edited or removed. Listings that are "most recent first"
/// order by creation time and break ties by reverse append order.
#[async_trait]
pub trait SaleLedger: Send + Sync {
    /// Appends a record and returns its id.
    async fn append(&self, record: SaleRecord) -> Result<SaleId>;

    /// Loads a single record.
    async fn get(&self, id: SaleId) -> Result<Option<SaleRecord>>;

    /// Every record of one buyer, most recent first.
    async fn list_by_buyer(&self, buyer: &BuyerId) -> Result<Vec<SaleRecord>>;

    /// The `limit` most recent records across all buyers.
    async fn list_recent(&self, limit: usize) -> Result<Vec<SaleRecord>>;

    /// The records written for one checkout attempt, in append order.
    async fn list_by_checkout(&self, checkout_id: CheckoutId) -> Result<Vec<SaleRecord>>;
}

#[async_trait]
impl<T: SaleLedger + ?Sized> SaleLedger for Arc<T> {
    async fn append(&self, record: SaleRecord) -> Result<SaleId> {
        (**self).append(record).await
    }

    async fn get(&self, id: SaleId) -> Result<Option<SaleRecord>> {
        (**self).get(id).await
    }

    async fn list_by_buyer(&self, buyer: &BuyerId) -> Result<Vec<SaleRecord>> {
        (**self).list_by_buyer(buyer).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<SaleRecord>> {
        (**self).list_recent(limit).await
    }

    async fn list_by_checkout(&self, checkout_id: CheckoutId) -> Result<Vec<SaleRecord>> {
        (**self).list_by_checkout(checkout_id).await
    }
}

pub(crate) fn record_append(record: &SaleRecord) {
    tracing::debug!(
        sale_id = %record.id(),
        checkout_id = ?record.checkout_id(),
        status = %record.status(),
        reason = ?record.reason(),
        "sale appended"
    );
}

use std::cmp::Reverse;
use std::sync::Arc;

use async_trait::async_trait;
use common::{BuyerId, CheckoutId, SaleId};
use tokio::sync::RwLock;

use crate::store::{SaleLedger, record_append};
use crate::{LedgerError, Result, SaleRecord};

#[derive(Debug, Default)]
struct InMemoryLedgerState {
    /// Records in append order.
    records: Vec<SaleRecord>,
    fail_next_appends: usize,
}

/// In-memory sale ledger.
#[derive(Debug, Clone, Default)]
pub struct InMemorySaleLedger {
    state: Arc<RwLock<InMemoryLedgerState>>,
}

impl InMemorySaleLedger {
    /// Creates a new empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of records appended.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Returns every record in append order.
    pub async fn all(&self) -> Vec<SaleRecord> {
        self.state.read().await.records.clone()
    }

    /// Makes the next `count` appends fail with a storage error.
    pub async fn fail_next_appends(&self, count: usize) {
        self.state.write().await.fail_next_appends = count;
    }

    fn newest_first<'a>(records: impl DoubleEndedIterator<Item = &'a SaleRecord>) -> Vec<SaleRecord> {
        let mut out: Vec<SaleRecord> = records.rev().cloned().collect();
        // Stable: equal timestamps keep reverse append order.
        out.sort_by_key(|r| Reverse(r.created_at()));
        out
    }
}

#[async_trait]
impl SaleLedger for InMemorySaleLedger {
    async fn append(&self, record: SaleRecord) -> Result<SaleId> {
        let mut state = self.state.write().await;

        if state.fail_next_appends > 0 {
            state.fail_next_appends -= 1;
            return Err(LedgerError::Unavailable(
                "append rejected by fault injection".to_string(),
            ));
        }

        let id = record.id();
        if state.records.iter().any(|r| r.id() == id) {
            return Err(LedgerError::DuplicateSale(id));
        }
        record_append(&record);
        state.records.push(record);
        Ok(id)
    }

    async fn get(&self, id: SaleId) -> Result<Option<SaleRecord>> {
        let state = self.state.read().await;
        Ok(state.records.iter().find(|r| r.id() == id).cloned())
    }

    async fn list_by_buyer(&self, buyer: &BuyerId) -> Result<Vec<SaleRecord>> {
        let state = self.state.read().await;
        Ok(Self::newest_first(
            state.records.iter().filter(|r| r.buyer() == buyer),
        ))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<SaleRecord>> {
        let state = self.state.read().await;
        let mut records = Self::newest_first(state.records.iter());
        records.truncate(limit);
        Ok(records)
    }

    async fn list_by_checkout(&self, checkout_id: CheckoutId) -> Result<Vec<SaleRecord>> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .filter(|r| r.checkout_id() == Some(checkout_id))
            .cloned()
            .collect())
    }
}

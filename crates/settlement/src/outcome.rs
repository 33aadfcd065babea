//! Settlement results.

use chrono::{DateTime, Utc};
use common::{CheckoutId, Money, Quantity, SaleId};
use inventory::ProductSummary;
use ledger::{FailureReason, SaleRecord, SaleStatus};
use serde::Serialize;

/// How one line item settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    /// The resolved product, if any.
    pub product: Option<ProductSummary>,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub line_total: Money,
    pub status: SaleStatus,
    pub reason: Option<FailureReason>,
    /// Id of the ledger record. `None` only when every append attempt failed.
    pub sale_id: Option<SaleId>,
}

impl ItemOutcome {
    pub fn is_sold(&self) -> bool {
        self.status == SaleStatus::Sold
    }

    pub fn is_recorded(&self) -> bool {
        self.sale_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutResult {
    pub checkout_id: CheckoutId,
    /// The payment gate's decision.
    pub approved: bool,
    /// One outcome per requested item, in request order.
    pub items: Vec<ItemOutcome>,
    /// Total as declared by the client. Echoed, never enforced.
    pub declared_total: Money,
    pub shipping_cost: Money,
    /// Sum of the line totals of sold items.
    pub computed_total: Money,
}

impl CheckoutResult {
    pub fn sold_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_sold()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.items.len() - self.sold_count()
    }
}

/// Confirmation of a direct single-item sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectSaleReceipt {
    pub sale_id: Option<SaleId>,
    pub product: ProductSummary,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub total: Money,
    /// Stock left right after this sale.
    pub remaining_quantity: u32,
    pub created_at: DateTime<Utc>,
}

/// A ledger record joined with the product's current display fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleView {
    #[serde(flatten)]
    pub record: SaleRecord,
    pub product: Option<ProductSummary>,
}

use chrono::{DateTime, Utc};
use common::{BuyerId, CheckoutId, Money, ProductId, Quantity, SaleId};
use serde::{Deserialize, Serialize};

/// Final status of one settled line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Sold,
    Failed,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Sold => "sold",
            SaleStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sold" => Some(SaleStatus::Sold),
            "failed" => Some(SaleStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a line item was not sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The payment gate declined the whole checkout.
    PaymentDeclined,
    /// Neither the identifier nor the name matched a product.
    ProductNotFound,
    /// The product had fewer units than requested at reservation time.
    StockInsufficient,
    /// Storage failed or timed out while reserving.
    InternalError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::PaymentDeclined => "payment_declined",
            FailureReason::ProductNotFound => "product_not_found",
            FailureReason::StockInsufficient => "stock_insufficient",
            FailureReason::InternalError => "internal_error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payment_declined" => Some(FailureReason::PaymentDeclined),
            "product_not_found" => Some(FailureReason::ProductNotFound),
            "stock_insufficient" => Some(FailureReason::StockInsufficient),
            "internal_error" => Some(FailureReason::InternalError),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The point-in-time facts of a line item that a record snapshots.
#[derive(Debug, Clone)]
pub struct SaleLine {
    pub checkout_id: Option<CheckoutId>,
    pub product_id: Option<ProductId>,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub buyer: BuyerId,
}

impl SaleLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity.get())
    }
}

/// Immutable ledger entry describing how one line item settled.
///
/// Only constructible through [`SaleRecord::sold`] and [`SaleRecord::failed`],
/// so `reason` is present exactly when `status` is [`SaleStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleRecord {
    id: SaleId,
    checkout_id: Option<CheckoutId>,
    product_id: Option<ProductId>,
    quantity: Quantity,
    unit_price: Money,
    line_total: Money,
    buyer: BuyerId,
    status: SaleStatus,
    reason: Option<FailureReason>,
    created_at: DateTime<Utc>,
}

impl SaleRecord {
    /// Records a line item whose stock reservation succeeded.
    pub fn sold(line: SaleLine) -> Self {
        Self::build(line, SaleStatus::Sold, None)
    }

    /// Records a line item that did not sell.
    pub fn failed(line: SaleLine, reason: FailureReason) -> Self {
        Self::build(line, SaleStatus::Failed, Some(reason))
    }

    fn build(line: SaleLine, status: SaleStatus, reason: Option<FailureReason>) -> Self {
        Self {
            id: SaleId::new(),
            line_total: line.line_total(),
            checkout_id: line.checkout_id,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            buyer: line.buyer,
            status,
            reason,
            created_at: Utc::now(),
        }
    }

    /// Rebuilds a persisted record, rejecting rows that break the
    /// reason-iff-failed rule.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: SaleId,
        checkout_id: Option<CheckoutId>,
        product_id: Option<ProductId>,
        quantity: Quantity,
        unit_price: Money,
        line_total: Money,
        buyer: BuyerId,
        status: SaleStatus,
        reason: Option<FailureReason>,
        created_at: DateTime<Utc>,
    ) -> Option<Self> {
        if (status == SaleStatus::Failed) != reason.is_some() {
            return None;
        }
        Some(Self {
            id,
            checkout_id,
            product_id,
            quantity,
            unit_price,
            line_total,
            buyer,
            status,
            reason,
            created_at,
        })
    }

    pub fn id(&self) -> SaleId {
        self.id
    }

    pub fn checkout_id(&self) -> Option<CheckoutId> {
        self.checkout_id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn line_total(&self) -> Money {
        self.line_total
    }

    pub fn buyer(&self) -> &BuyerId {
        &self.buyer
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn reason(&self) -> Option<FailureReason> {
        self.reason
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_sold(&self) -> bool {
        self.status == SaleStatus::Sold
    }
}

//! Checkout orchestrator for settling checkouts and direct sales.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use common::{BuyerId, CheckoutId, IdentifierCheck, Money, ProductId, Quantity, SaleId};
use inventory::{InventoryError, InventoryStore, Product, Reservation};
use ledger::{FailureReason, LedgerError, SaleLedger, SaleLine, SaleRecord, SaleStatus};
use tokio::time::timeout;

use crate::config::SettlementConfig;
use crate::error::SaleError;
use crate::gate::{GateContext, GateDecision, PaymentGate};
use crate::outcome::{CheckoutResult, DirectSaleReceipt, ItemOutcome};
use crate::request::{CheckoutRequest, DirectSaleRequest, LineItem};
use crate::resolve::{Resolution, resolve};
use crate::retry::GaveUp;

/// Settles checkouts item by item against an inventory store, recording
/// every outcome in the sale ledger.
///
/// The payment gate is consulted exactly once per checkout, before any
/// stock is touched. Each item then reserves independently: one item's
/// failure never affects its siblings, and nothing is rolled back.
pub struct CheckoutOrchestrator<I, L, G>
where
    I: InventoryStore,
    L: SaleLedger,
    G: PaymentGate,
{
    inventory: I,
    ledger: L,
    gate: G,
    config: SettlementConfig,
}

/// A storage call that produced no answer.
#[derive(Debug)]
enum StorageFault<E> {
    Failed(E),
    TimedOut(Duration),
}

impl<E: fmt::Display> fmt::Display for StorageFault<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageFault::Failed(e) => e.fmt(f),
            StorageFault::TimedOut(after) => write!(f, "storage call timed out after {after:?}"),
        }
    }
}

impl StorageFault<InventoryError> {
    /// A timed out reservation may still have committed.
    fn outcome_unknown(&self) -> bool {
        match self {
            StorageFault::Failed(e) => e.outcome_unknown(),
            StorageFault::TimedOut(_) => true,
        }
    }
}

impl StorageFault<LedgerError> {
    fn is_transient(&self) -> bool {
        !matches!(self, StorageFault::Failed(LedgerError::DuplicateSale(_)))
    }
}

/// Why a record needs an operator.
#[derive(Debug, Clone, Copy)]
enum Reconcile {
    /// Every append attempt failed.
    AppendExhausted,
    /// Stock may have been decremented for an item recorded as failed.
    ReservationUnknown,
}

impl Reconcile {
    fn as_str(self) -> &'static str {
        match self {
            Reconcile::AppendExhausted => "append_exhausted",
            Reconcile::ReservationUnknown => "reservation_unknown",
        }
    }
}

/// An item's terminal state before it is recorded.
struct Settled {
    product: Option<Product>,
    status: SaleStatus,
    reason: Option<FailureReason>,
    /// Set when the reservation call failed without saying whether it
    /// applied.
    unconfirmed: Option<String>,
}

impl Settled {
    fn sold(product: Product) -> Self {
        Self {
            product: Some(product),
            status: SaleStatus::Sold,
            reason: None,
            unconfirmed: None,
        }
    }

    fn failed(product: Option<Product>, reason: FailureReason) -> Self {
        Self {
            product,
            status: SaleStatus::Failed,
            reason: Some(reason),
            unconfirmed: None,
        }
    }
}

impl<I, L, G> CheckoutOrchestrator<I, L, G>
where
    I: InventoryStore,
    L: SaleLedger,
    G: PaymentGate,
{
    /// Creates a new orchestrator with default settings.
    pub fn new(inventory: I, ledger: L, gate: G) -> Self {
        Self::with_config(inventory, ledger, gate, SettlementConfig::default())
    }

    pub fn with_config(inventory: I, ledger: L, gate: G, config: SettlementConfig) -> Self {
        Self {
            inventory,
            ledger,
            gate,
            config,
        }
    }

    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Settles a checkout.
    ///
    /// Always produces one outcome per requested item, in request order,
    /// and writes one ledger record per item.
    #[tracing::instrument(
        skip(self, request),
        fields(
            buyer = %request.buyer(),
            items = request.items().len(),
            checkout_id = tracing::field::Empty
        )
    )]
    pub async fn settle(&self, request: CheckoutRequest) -> CheckoutResult {
        metrics::counter!("settlement_checkouts_total").increment(1);
        let started = Instant::now();

        let checkout_id = CheckoutId::new();
        tracing::Span::current().record("checkout_id", tracing::field::display(checkout_id));

        let ctx = GateContext {
            checkout_id,
            buyer: request.buyer().clone(),
            declared_total: request.declared_total(),
            shipping_cost: request.shipping_cost(),
        };
        let decision = self.gate.decide(&ctx).await;
        if decision == GateDecision::Declined {
            metrics::counter!("settlement_gate_declined_total").increment(1);
            tracing::warn!("payment declined; no stock will be reserved");
        }

        let mut items = Vec::with_capacity(request.items().len());
        for (index, item) in request.items().iter().enumerate() {
            let outcome = self
                .settle_item(checkout_id, request.buyer(), index, item, decision)
                .await;
            items.push(outcome);
        }

        let computed_total: Money = items
            .iter()
            .filter(|i| i.is_sold())
            .map(|i| i.line_total)
            .sum();

        let result = CheckoutResult {
            checkout_id,
            approved: decision.is_approved(),
            items,
            declared_total: request.declared_total(),
            shipping_cost: request.shipping_cost(),
            computed_total,
        };

        metrics::histogram!("settlement_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            approved = result.approved,
            sold = result.sold_count(),
            failed = result.failed_count(),
            computed_total = %result.computed_total,
            declared_total = %result.declared_total,
            "checkout settled"
        );

        result
    }

    async fn settle_item(
        &self,
        checkout_id: CheckoutId,
        buyer: &BuyerId,
        index: usize,
        item: &LineItem,
        decision: GateDecision,
    ) -> ItemOutcome {
        let resolution = match self.bounded(resolve(&self.inventory, &item.product_ref)).await {
            Ok(resolution) => Ok(resolution),
            Err(e) => {
                tracing::error!(index, error = %e, "product resolution failed");
                Err(e)
            }
        };

        let resolved = match &resolution {
            Ok(Resolution::Resolved(product)) => Some(product.clone()),
            _ => None,
        };
        let unit_price = item
            .asserted_unit_price
            .or_else(|| resolved.as_ref().map(|p| p.unit_price))
            .unwrap_or_default();

        let settled = if !decision.is_approved() {
            Settled::failed(resolved, FailureReason::PaymentDeclined)
        } else {
            match resolution {
                Err(_) => Settled::failed(None, FailureReason::InternalError),
                Ok(Resolution::Unresolved) => Settled::failed(None, FailureReason::ProductNotFound),
                Ok(Resolution::Resolved(product)) => {
                    self.reserve_resolved(index, product, item.quantity).await
                }
            }
        };

        let line = SaleLine {
            checkout_id: Some(checkout_id),
            product_id: settled.product.as_ref().map(|p| p.id),
            quantity: item.quantity,
            unit_price,
            buyer: buyer.clone(),
        };
        let record = match settled.reason {
            None => SaleRecord::sold(line),
            Some(reason) => SaleRecord::failed(line, reason),
        };

        let reason_label = settled.reason.map_or("none", |r| r.as_str());
        metrics::counter!(
            "settlement_items_total",
            "status" => settled.status.as_str(),
            "reason" => reason_label
        )
        .increment(1);
        if let Some(reason) = settled.reason {
            tracing::warn!(index, %reason, "item not sold");
        }

        let sale_id = self.record(&record).await;
        if let Some(error) = &settled.unconfirmed {
            self.reconcile(&record, sale_id, Reconcile::ReservationUnknown, error);
        }

        ItemOutcome {
            product: settled.product.as_ref().map(Product::summary),
            quantity: item.quantity,
            unit_price,
            line_total: record.line_total(),
            status: settled.status,
            reason: settled.reason,
            sale_id,
        }
    }

    async fn reserve_resolved(&self, index: usize, product: Product, quantity: Quantity) -> Settled {
        match self.reserve(product.id, quantity).await {
            Ok(Reservation::Reserved(after)) => Settled::sold(after),
            Ok(Reservation::InsufficientStock) => {
                Settled::failed(Some(product), FailureReason::StockInsufficient)
            }
            // Vanished since resolution; referencing it would dangle.
            Ok(Reservation::NotFound) => Settled::failed(None, FailureReason::ProductNotFound),
            Err(e) => {
                tracing::error!(index, product_id = %product.id, error = %e, "reservation failed");
                let unconfirmed = e.outcome_unknown().then(|| e.to_string());
                Settled {
                    unconfirmed,
                    ..Settled::failed(Some(product), FailureReason::InternalError)
                }
            }
        }
    }

    /// Sells one product outside any checkout.
    ///
    /// Input is validated before storage is touched. Missing products, short
    /// stock and storage failures are recorded as failed sales and then
    /// reported as errors.
    #[tracing::instrument(
        skip(self, request),
        fields(buyer = %request.buyer, product_id = %request.product_id)
    )]
    pub async fn sell(&self, request: DirectSaleRequest) -> Result<DirectSaleReceipt, SaleError> {
        let quantity = Quantity::new(request.quantity)?;
        let product_id = match ProductId::parse(&request.product_id) {
            IdentifierCheck::Valid(id) => id,
            IdentifierCheck::Invalid => {
                return Err(SaleError::InvalidIdentifier(request.product_id));
            }
        };

        let reservation = self.reserve(product_id, quantity).await;

        let mut line = SaleLine {
            checkout_id: None,
            product_id: Some(product_id),
            quantity,
            unit_price: Money::zero(),
            buyer: request.buyer,
        };

        match reservation {
            Ok(Reservation::Reserved(product)) => {
                line.unit_price = product.unit_price;
                let record = SaleRecord::sold(line);
                let sale_id = self.record(&record).await;

                let total = record.line_total();
                tracing::info!(remaining = product.quantity, %total, "direct sale completed");
                Ok(DirectSaleReceipt {
                    sale_id,
                    unit_price: product.unit_price,
                    product: product.summary(),
                    quantity,
                    total,
                    remaining_quantity: product.quantity,
                    created_at: record.created_at(),
                })
            }
            Ok(Reservation::InsufficientStock) => {
                line.unit_price = self.catalog_price(product_id).await;
                self.record(&SaleRecord::failed(line, FailureReason::StockInsufficient))
                    .await;
                tracing::warn!(requested = quantity.get(), "insufficient stock");
                Err(SaleError::StockInsufficient {
                    product_id,
                    requested: quantity.get(),
                })
            }
            Ok(Reservation::NotFound) => {
                line.product_id = None;
                self.record(&SaleRecord::failed(line, FailureReason::ProductNotFound))
                    .await;
                tracing::warn!("product not found");
                Err(SaleError::ProductNotFound(product_id))
            }
            Err(e) => {
                tracing::error!(error = %e, "reservation failed");
                line.unit_price = self.catalog_price(product_id).await;
                let record = SaleRecord::failed(line, FailureReason::InternalError);
                let sale_id = self.record(&record).await;
                if e.outcome_unknown() {
                    self.reconcile(&record, sale_id, Reconcile::ReservationUnknown, &e);
                }
                Err(SaleError::Internal(e.to_string()))
            }
        }
    }

    /// Best-effort catalog price for a failed record. Falls back to zero.
    async fn catalog_price(&self, id: ProductId) -> Money {
        match self.bounded(self.inventory.get(id)).await {
            Ok(Some(product)) => product.unit_price,
            Ok(None) => Money::zero(),
            Err(e) => {
                tracing::warn!(product_id = %id, error = %e, "price lookup failed");
                Money::zero()
            }
        }
    }

    async fn reserve(
        &self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<Reservation, StorageFault<InventoryError>> {
        self.bounded(self.inventory.try_reserve(id, quantity)).await
    }

    /// Runs a storage call under the configured timeout.
    async fn bounded<T, E, F>(&self, call: F) -> Result<T, StorageFault<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        match timeout(self.config.storage_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StorageFault::Failed(e)),
            Err(_) => Err(StorageFault::TimedOut(self.config.storage_timeout)),
        }
    }

    /// Appends a record with retries. Returns `None` when every attempt
    /// failed, after logging everything needed to restore the record by hand.
    async fn record(&self, record: &SaleRecord) -> Option<SaleId> {
        let appended = self
            .config
            .append_retry
            .run(
                |attempt| async move {
                    match self.bounded(self.ledger.append(record.clone())).await {
                        // An earlier attempt landed even though it reported failure.
                        Err(StorageFault::Failed(LedgerError::DuplicateSale(id))) if attempt > 0 => {
                            Ok(id)
                        }
                        Err(e) => {
                            tracing::warn!(attempt, error = %e, "ledger append failed");
                            Err(e)
                        }
                        ok => ok,
                    }
                },
                StorageFault::<LedgerError>::is_transient,
            )
            .await;

        match appended {
            Ok(id) => Some(id),
            Err(GaveUp {
                attempts,
                last_error,
            }) => {
                self.reconcile(
                    record,
                    None,
                    Reconcile::AppendExhausted,
                    &format!("{last_error} (after {attempts} attempts)"),
                );
                None
            }
        }
    }

    /// Logs a record an operator has to check by hand, with every field
    /// needed to restore or correct it.
    fn reconcile(
        &self,
        record: &SaleRecord,
        recorded_as: Option<SaleId>,
        cause: Reconcile,
        error: &dyn fmt::Display,
    ) {
        metrics::counter!("settlement_ledger_reconciliation_total", "cause" => cause.as_str())
            .increment(1);
        tracing::error!(
            reconciliation_required = true,
            cause = cause.as_str(),
            recorded = recorded_as.is_some(),
            sale_id = %record.id(),
            checkout_id = ?record.checkout_id(),
            product_id = ?record.product_id(),
            quantity = record.quantity().get(),
            unit_price_cents = record.unit_price().cents(),
            line_total_cents = record.line_total().cents(),
            buyer = %record.buyer(),
            status = %record.status(),
            reason = ?record.reason(),
            created_at = %record.created_at(),
            %error,
            "sale record needs reconciliation"
        );
    }
}

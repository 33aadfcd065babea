//! End-to-end settlement tests against the in-memory stores.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{BuyerId, CheckoutId, Money, ProductId, Quantity, SaleId};
use inventory::{InMemoryInventoryStore, InventoryStore, NewProduct, Product, Reservation};
use ledger::{FailureReason, InMemorySaleLedger, LedgerError, SaleLedger, SaleRecord, SaleStatus};
use settlement::{
    CheckoutOrchestrator, CheckoutRequest, DirectSaleRequest, FixedGate, LineItem, ProductRef,
    SaleError, SalesHistory, SettlementConfig, StochasticGate,
};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

type Orchestrator<G> = CheckoutOrchestrator<InMemoryInventoryStore, InMemorySaleLedger, G>;

struct Harness<G: settlement::PaymentGate> {
    orchestrator: Arc<Orchestrator<G>>,
    inventory: InMemoryInventoryStore,
    ledger: InMemorySaleLedger,
}

fn harness<G: settlement::PaymentGate>(gate: G) -> Harness<G> {
    harness_with_config(gate, SettlementConfig::default())
}

fn harness_with_config<G: settlement::PaymentGate>(
    gate: G,
    config: SettlementConfig,
) -> Harness<G> {
    let inventory = InMemoryInventoryStore::new();
    let ledger = InMemorySaleLedger::new();
    let orchestrator = Arc::new(CheckoutOrchestrator::with_config(
        inventory.clone(),
        ledger.clone(),
        gate,
        config,
    ));
    Harness {
        orchestrator,
        inventory,
        ledger,
    }
}

async fn seed(inventory: &InMemoryInventoryStore, name: &str, price: i64, qty: u32) -> Product {
    inventory
        .insert(NewProduct::new(name, Money::from_cents(price), qty).image(format!("{name}.png")))
        .await
        .unwrap()
}

fn by_id(product: &Product, qty: i64) -> LineItem {
    LineItem::new(
        ProductRef::by_id(product.id.to_string()),
        Quantity::new(qty).unwrap(),
    )
}

fn checkout(buyer: &str, items: Vec<LineItem>) -> CheckoutRequest {
    CheckoutRequest::new(BuyerId::new(buyer), items, Money::zero(), Money::zero()).unwrap()
}

/// Collects the `cause` of every event flagged `reconciliation_required`.
#[derive(Clone, Default)]
struct Reconciliations(Arc<Mutex<Vec<String>>>);

impl Reconciliations {
    /// Captures events on the current thread until the guard drops.
    fn capture() -> (Self, tracing::subscriber::DefaultGuard) {
        let captured = Self::default();
        let guard = tracing_subscriber::registry()
            .with(captured.clone())
            .set_default();
        (captured, guard)
    }

    fn causes(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct FlagVisitor {
    flagged: bool,
    cause: String,
}

impl Visit for FlagVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "reconciliation_required" {
            self.flagged = value;
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "cause" {
            self.cause = value.to_string();
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
}

impl<S: Subscriber> Layer<S> for Reconciliations {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FlagVisitor::default();
        event.record(&mut visitor);
        if visitor.flagged {
            self.0.lock().unwrap().push(visitor.cause);
        }
    }
}

#[tokio::test]
async fn approved_single_item_checkout_sells_at_catalog_price() {
    let h = harness(FixedGate::approving());
    let p1 = seed(&h.inventory, "P1", 1000, 5).await;

    let result = h.orchestrator.settle(checkout("ana", vec![by_id(&p1, 3)])).await;

    let item = &result.items[0];
    assert_eq!(item.status, SaleStatus::Sold);
    assert_eq!(item.unit_price, Money::from_cents(1000));
    assert_eq!(item.line_total, Money::from_cents(3000));
    assert_eq!(h.inventory.quantity_of(p1.id).await, Some(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_for_the_last_units_sell_once() {
    let h = harness(FixedGate::approving());
    let p1 = seed(&h.inventory, "P1", 1000, 2).await;

    let handles: Vec<_> = (0..2)
        .map(|n| {
            let orchestrator = h.orchestrator.clone();
            let request = checkout(&format!("buyer-{n}"), vec![by_id(&p1, 2)]);
            tokio::spawn(async move { orchestrator.settle(request).await })
        })
        .collect();

    let mut reasons = Vec::new();
    for handle in handles {
        let result = handle.await.unwrap();
        reasons.push((result.items[0].status, result.items[0].reason));
    }
    reasons.sort_by_key(|(status, _)| *status == SaleStatus::Failed);

    assert_eq!(reasons[0], (SaleStatus::Sold, None));
    assert_eq!(
        reasons[1],
        (SaleStatus::Failed, Some(FailureReason::StockInsufficient))
    );
    assert_eq!(h.inventory.quantity_of(p1.id).await, Some(0));
    assert_eq!(h.ledger.record_count().await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn contended_checkouts_never_oversell() {
    let h = harness(FixedGate::approving());
    let p1 = seed(&h.inventory, "P1", 100, 10).await;

    let handles: Vec<_> = (0..40)
        .map(|n| {
            let orchestrator = h.orchestrator.clone();
            let request = checkout(&format!("buyer-{n}"), vec![by_id(&p1, 1)]);
            tokio::spawn(async move { orchestrator.settle(request).await })
        })
        .collect();

    let mut sold = 0;
    for handle in handles {
        sold += handle.await.unwrap().sold_count();
    }

    assert_eq!(sold, 10);
    assert_eq!(h.inventory.quantity_of(p1.id).await, Some(0));
    let records = h.ledger.all().await;
    assert_eq!(records.len(), 40);
    assert_eq!(records.iter().filter(|r| r.is_sold()).count(), 10);
}

#[tokio::test]
async fn declined_gate_fails_every_item_without_touching_stock() {
    let gate = FixedGate::declining();
    let h = harness(gate.clone());
    let p1 = seed(&h.inventory, "P1", 1000, 5).await;
    let p2 = seed(&h.inventory, "P2", 500, 5).await;

    let result = h
        .orchestrator
        .settle(checkout("ana", vec![by_id(&p1, 1), by_id(&p2, 1)]))
        .await;

    assert!(!result.approved);
    assert_eq!(gate.calls(), 1);
    for item in &result.items {
        assert_eq!(item.status, SaleStatus::Failed);
        assert_eq!(item.reason, Some(FailureReason::PaymentDeclined));
    }
    assert_eq!(result.computed_total, Money::zero());
    assert_eq!(h.inventory.quantity_of(p1.id).await, Some(5));
    assert_eq!(h.inventory.quantity_of(p2.id).await, Some(5));
    assert_eq!(h.ledger.record_count().await, 2);
}

#[tokio::test]
async fn unknown_identifier_without_name_is_product_not_found() {
    let h = harness(FixedGate::approving());
    let p1 = seed(&h.inventory, "P1", 1000, 5).await;

    let request = checkout(
        "ana",
        vec![LineItem::new(ProductRef::by_id("zzz"), Quantity::new(1).unwrap())],
    );
    let result = h.orchestrator.settle(request).await;

    assert_eq!(result.items[0].reason, Some(FailureReason::ProductNotFound));
    assert_eq!(h.inventory.quantity_of(p1.id).await, Some(5));
    let records = h.ledger.all().await;
    assert_eq!(records[0].product_id(), None);
}

#[tokio::test]
async fn ledger_listing_joins_current_product_details() {
    let h = harness(FixedGate::approving());
    let p1 = seed(&h.inventory, "P1", 1000, 5).await;
    let p2 = seed(&h.inventory, "P2", 700, 5).await;

    h.orchestrator.settle(checkout("ana", vec![by_id(&p2, 1)])).await;
    let latest = h.orchestrator.settle(checkout("ana", vec![by_id(&p1, 3)])).await;
    h.inventory.rename(p1.id, "P1 Deluxe").await;

    let history = SalesHistory::new(h.inventory.clone(), h.ledger.clone());
    let views = history.for_buyer(&BuyerId::new("ana")).await.unwrap();

    assert_eq!(views.len(), 2);
    assert_eq!(Some(views[0].record.id()), latest.items[0].sale_id);
    let product = views[0].product.as_ref().unwrap();
    assert_eq!(product.name, "P1 Deluxe");
    assert_eq!(product.image, "P1.png");
    assert_eq!(views[0].record.unit_price(), Money::from_cents(1000));
}

#[tokio::test]
async fn mixed_checkout_settles_items_independently() {
    let h = harness(FixedGate::approving());
    let p1 = seed(&h.inventory, "P1", 1000, 5).await;
    let p2 = seed(&h.inventory, "P2", 500, 1).await;

    let request = checkout(
        "ana",
        vec![
            by_id(&p1, 2),
            by_id(&p2, 4),
            LineItem::new(ProductRef::by_name("nope"), Quantity::new(1).unwrap()),
            LineItem::new(ProductRef::by_name(" p2 "), Quantity::new(1).unwrap()),
        ],
    );
    let result = h.orchestrator.settle(request).await;

    let reasons: Vec<_> = result.items.iter().map(|i| i.reason).collect();
    assert_eq!(
        reasons,
        vec![
            None,
            Some(FailureReason::StockInsufficient),
            Some(FailureReason::ProductNotFound),
            None,
        ]
    );
    assert_eq!(result.computed_total, Money::from_cents(2500));
    assert_eq!(h.inventory.quantity_of(p2.id).await, Some(0));

    let records = h.ledger.list_by_checkout(result.checkout_id).await.unwrap();
    let ids: Vec<_> = records.iter().map(|r| Some(r.id())).collect();
    let outcome_ids: Vec<_> = result.items.iter().map(|i| i.sale_id).collect();
    assert_eq!(ids, outcome_ids);
}

#[tokio::test]
async fn gate_is_consulted_once_per_checkout() {
    let gate = FixedGate::approving();
    let h = harness(gate.clone());
    let p1 = seed(&h.inventory, "P1", 100, 50).await;

    for n in 1..=3 {
        let items = (0..n).map(|_| by_id(&p1, 1)).collect();
        h.orchestrator.settle(checkout("ana", items)).await;
    }

    assert_eq!(gate.calls(), 3);
}

#[tokio::test]
async fn sold_items_match_reserved_stock() {
    let h = harness(StochasticGate::seeded(0.5, 11));
    let p1 = seed(&h.inventory, "P1", 100, 30).await;

    let mut sold_units = 0;
    for _ in 0..20 {
        let result = h.orchestrator.settle(checkout("ana", vec![by_id(&p1, 2)])).await;
        sold_units += result
            .items
            .iter()
            .filter(|i| i.is_sold())
            .map(|i| i.quantity.get())
            .sum::<u32>();
    }

    assert_eq!(h.inventory.quantity_of(p1.id).await, Some(30 - sold_units));
    assert_eq!(h.ledger.record_count().await, 20);
}

#[tokio::test(start_paused = true)]
async fn slow_reservation_times_out_as_internal_error() {
    let config = SettlementConfig::new(Duration::from_millis(50), 3);
    let h = harness_with_config(FixedGate::approving(), config);
    let p1 = seed(&h.inventory, "P1", 100, 5).await;
    h.inventory.set_reserve_delay(Some(Duration::from_secs(10))).await;

    let result = h.orchestrator.settle(checkout("ana", vec![by_id(&p1, 1)])).await;

    assert_eq!(result.items[0].reason, Some(FailureReason::InternalError));
    assert!(result.items[0].is_recorded());
    assert_eq!(h.inventory.quantity_of(p1.id).await, Some(5));
}

/// Store whose reservations commit but whose answer arrives too late.
#[derive(Clone, Default)]
struct LateAnswerStore {
    inner: InMemoryInventoryStore,
}

#[async_trait]
impl InventoryStore for LateAnswerStore {
    async fn try_reserve(&self, id: ProductId, quantity: Quantity) -> inventory::Result<Reservation> {
        let outcome = self.inner.try_reserve(id, quantity).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        outcome
    }

    async fn get(&self, id: ProductId) -> inventory::Result<Option<Product>> {
        self.inner.get(id).await
    }

    async fn find_by_name(&self, name: &str) -> inventory::Result<Option<Product>> {
        self.inner.find_by_name(name).await
    }

    async fn get_many(&self, ids: &[ProductId]) -> inventory::Result<Vec<Product>> {
        self.inner.get_many(ids).await
    }

    async fn insert(&self, product: NewProduct) -> inventory::Result<Product> {
        self.inner.insert(product).await
    }
}

#[tokio::test(start_paused = true)]
async fn late_answer_to_a_committed_reservation_is_flagged_for_reconciliation() {
    let (reconciliations, _guard) = Reconciliations::capture();
    let store = LateAnswerStore::default();
    let ledger = InMemorySaleLedger::new();
    let orchestrator = CheckoutOrchestrator::with_config(
        store.clone(),
        ledger.clone(),
        FixedGate::approving(),
        SettlementConfig::new(Duration::from_millis(50), 3),
    );
    let p1 = seed(&store.inner, "P1", 100, 5).await;

    let result = orchestrator.settle(checkout("ana", vec![by_id(&p1, 2)])).await;

    let item = &result.items[0];
    assert_eq!(item.reason, Some(FailureReason::InternalError));
    assert_eq!(store.inner.quantity_of(p1.id).await, Some(3));
    let records = ledger.all().await;
    assert_eq!(records.len(), 1);
    assert_eq!(Some(records[0].id()), item.sale_id);
    assert_eq!(reconciliations.causes(), vec!["reservation_unknown"]);
}

#[tokio::test(start_paused = true)]
async fn direct_sale_with_a_late_reservation_answer_is_recorded_and_flagged() {
    let (reconciliations, _guard) = Reconciliations::capture();
    let store = LateAnswerStore::default();
    let ledger = InMemorySaleLedger::new();
    let orchestrator = CheckoutOrchestrator::with_config(
        store.clone(),
        ledger.clone(),
        FixedGate::approving(),
        SettlementConfig::new(Duration::from_millis(50), 3),
    );
    let p1 = seed(&store.inner, "P1", 100, 5).await;

    let result = orchestrator
        .sell(DirectSaleRequest {
            buyer: BuyerId::new("ana"),
            product_id: p1.id.to_string(),
            quantity: 1,
        })
        .await;

    assert!(matches!(result, Err(SaleError::Internal(_))));
    let records = ledger.all().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reason(), Some(FailureReason::InternalError));
    assert_eq!(records[0].product_id(), Some(p1.id));
    assert_eq!(reconciliations.causes(), vec!["reservation_unknown"]);
}

#[tokio::test]
async fn rejected_reservation_needs_no_reconciliation() {
    let (reconciliations, _guard) = Reconciliations::capture();
    let h = harness(FixedGate::approving());
    let p1 = seed(&h.inventory, "P1", 100, 5).await;
    h.inventory.set_fail_on_reserve(true).await;

    let result = h.orchestrator.settle(checkout("ana", vec![by_id(&p1, 1)])).await;

    assert_eq!(result.items[0].reason, Some(FailureReason::InternalError));
    assert!(reconciliations.causes().is_empty());
}

/// Ledger that stores a record and then reports the append as failed.
#[derive(Clone, Default)]
struct LostAckLedger {
    inner: InMemorySaleLedger,
    lost_acks: Arc<AtomicUsize>,
}

#[async_trait]
impl SaleLedger for LostAckLedger {
    async fn append(&self, record: SaleRecord) -> ledger::Result<SaleId> {
        let id = self.inner.append(record).await?;
        if self
            .lost_acks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(LedgerError::Unavailable("connection reset".to_string()));
        }
        Ok(id)
    }

    async fn get(&self, id: SaleId) -> ledger::Result<Option<SaleRecord>> {
        self.inner.get(id).await
    }

    async fn list_by_buyer(&self, buyer: &BuyerId) -> ledger::Result<Vec<SaleRecord>> {
        self.inner.list_by_buyer(buyer).await
    }

    async fn list_recent(&self, limit: usize) -> ledger::Result<Vec<SaleRecord>> {
        self.inner.list_recent(limit).await
    }

    async fn list_by_checkout(&self, checkout_id: CheckoutId) -> ledger::Result<Vec<SaleRecord>> {
        self.inner.list_by_checkout(checkout_id).await
    }
}

#[tokio::test(start_paused = true)]
async fn append_that_landed_before_failing_is_kept_once() {
    let (reconciliations, _guard) = Reconciliations::capture();
    let inventory = InMemoryInventoryStore::new();
    let ledger = LostAckLedger::default();
    ledger.lost_acks.store(1, Ordering::SeqCst);
    let orchestrator =
        CheckoutOrchestrator::new(inventory.clone(), ledger.clone(), FixedGate::approving());
    let p1 = seed(&inventory, "P1", 100, 5).await;

    let result = orchestrator.settle(checkout("ana", vec![by_id(&p1, 1)])).await;

    let records = ledger.inner.all().await;
    assert_eq!(records.len(), 1);
    assert_eq!(result.items[0].sale_id, Some(records[0].id()));
    assert!(reconciliations.causes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn transient_append_failures_are_retried() {
    let h = harness(FixedGate::approving());
    let p1 = seed(&h.inventory, "P1", 100, 5).await;
    h.ledger.fail_next_appends(2).await;

    let result = h.orchestrator.settle(checkout("ana", vec![by_id(&p1, 1)])).await;

    assert!(result.items[0].is_recorded());
    assert_eq!(h.ledger.record_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_appends_keep_the_sale_but_drop_the_id() {
    let (reconciliations, _guard) = Reconciliations::capture();
    let h = harness(FixedGate::approving());
    let p1 = seed(&h.inventory, "P1", 100, 5).await;
    h.ledger.fail_next_appends(3).await;

    let result = h.orchestrator.settle(checkout("ana", vec![by_id(&p1, 1)])).await;

    let item = &result.items[0];
    assert_eq!(item.status, SaleStatus::Sold);
    assert_eq!(item.sale_id, None);
    assert_eq!(h.inventory.quantity_of(p1.id).await, Some(4));
    assert_eq!(h.ledger.record_count().await, 0);
    assert_eq!(reconciliations.causes(), vec!["append_exhausted"]);
}

/// Store that counts every call made against it.
#[derive(Clone, Default)]
struct CountingStore {
    inner: InMemoryInventoryStore,
    calls: Arc<AtomicUsize>,
}

impl CountingStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl InventoryStore for CountingStore {
    async fn try_reserve(&self, id: ProductId, quantity: Quantity) -> inventory::Result<Reservation> {
        self.tick();
        self.inner.try_reserve(id, quantity).await
    }

    async fn get(&self, id: ProductId) -> inventory::Result<Option<Product>> {
        self.tick();
        self.inner.get(id).await
    }

    async fn find_by_name(&self, name: &str) -> inventory::Result<Option<Product>> {
        self.tick();
        self.inner.find_by_name(name).await
    }

    async fn get_many(&self, ids: &[ProductId]) -> inventory::Result<Vec<Product>> {
        self.tick();
        self.inner.get_many(ids).await
    }

    async fn insert(&self, product: NewProduct) -> inventory::Result<Product> {
        self.inner.insert(product).await
    }
}

#[tokio::test]
async fn direct_sale_rejects_malformed_input_before_storage() {
    let store = CountingStore::default();
    let ledger = InMemorySaleLedger::new();
    let orchestrator =
        CheckoutOrchestrator::new(store.clone(), ledger.clone(), FixedGate::approving());

    let malformed = orchestrator
        .sell(DirectSaleRequest {
            buyer: BuyerId::new("ana"),
            product_id: "not-a-product-key".to_string(),
            quantity: 1,
        })
        .await;
    let zero = orchestrator
        .sell(DirectSaleRequest {
            buyer: BuyerId::new("ana"),
            product_id: ProductId::new().to_string(),
            quantity: 0,
        })
        .await;

    assert!(matches!(malformed, Err(SaleError::InvalidIdentifier(_))));
    assert!(matches!(zero, Err(SaleError::InvalidQuantity(_))));
    assert_eq!(store.calls(), 0);
    assert_eq!(ledger.record_count().await, 0);
}

#[tokio::test]
async fn checkout_with_malformed_id_skips_the_id_lookup() {
    let store = CountingStore::default();
    let orchestrator =
        CheckoutOrchestrator::new(store.clone(), InMemorySaleLedger::new(), FixedGate::approving());

    let request = checkout(
        "ana",
        vec![LineItem::new(ProductRef::by_id("zzz"), Quantity::new(1).unwrap())],
    );
    let result = orchestrator.settle(request).await;

    assert_eq!(result.items[0].reason, Some(FailureReason::ProductNotFound));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn direct_sale_for_unknown_product_records_a_failure() {
    let h = harness(FixedGate::approving());

    let missing = ProductId::new();
    let result = h
        .orchestrator
        .sell(DirectSaleRequest {
            buyer: BuyerId::new("ana"),
            product_id: missing.to_string(),
            quantity: 1,
        })
        .await;

    assert!(matches!(result, Err(SaleError::ProductNotFound(id)) if id == missing));
    let records = h.ledger.all().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reason(), Some(FailureReason::ProductNotFound));
    assert_eq!(records[0].product_id(), None);
}

#[tokio::test]
async fn recent_history_spans_buyers() {
    let h = harness(FixedGate::approving());
    let p1 = seed(&h.inventory, "P1", 100, 10).await;

    for buyer in ["ana", "bob", "cy"] {
        h.orchestrator.settle(checkout(buyer, vec![by_id(&p1, 1)])).await;
    }

    let history = SalesHistory::new(h.inventory.clone(), h.ledger.clone());
    let recent = history.recent(Some(2)).await.unwrap();
    let buyers: Vec<_> = recent.iter().map(|v| v.record.buyer().as_str().to_owned()).collect();
    assert_eq!(buyers, vec!["cy", "bob"]);
}

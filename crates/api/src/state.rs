//! Shared application state.

use std::sync::Arc;

use inventory::InventoryStore;
use ledger::SaleLedger;
use settlement::{CheckoutOrchestrator, PaymentGate, SalesHistory, SettlementConfig};

/// Payment gate as held by the server; chosen at startup.
pub type SharedGate = Arc<dyn PaymentGate>;

/// Shared application state accessible from all handlers.
pub struct AppState<I: InventoryStore, L: SaleLedger> {
    pub orchestrator: CheckoutOrchestrator<I, L, SharedGate>,
    pub history: SalesHistory<I, L>,
}

impl<I, L> AppState<I, L>
where
    I: InventoryStore + Clone,
    L: SaleLedger + Clone,
{
    pub fn new(inventory: I, ledger: L, gate: SharedGate, config: SettlementConfig) -> Self {
        Self {
            history: SalesHistory::new(inventory.clone(), ledger.clone()),
            orchestrator: CheckoutOrchestrator::with_config(inventory, ledger, gate, config),
        }
    }

    pub fn inventory(&self) -> &I {
        self.orchestrator.inventory()
    }

    pub fn ledger(&self) -> &L {
        self.orchestrator.ledger()
    }
}

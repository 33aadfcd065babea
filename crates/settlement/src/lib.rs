//! Checkout settlement.
//!
//! A checkout is settled item by item:
//! 1. Consult the payment gate (once per checkout)
//! 2. Resolve each item to a catalog product
//! 3. Reserve stock with an atomic conditional decrement
//! 4. Append exactly one ledger record per item
//!
//! Items fail independently. There is no compensation: stock that was
//! reserved for a sold item stays reserved, and failed items never touched
//! stock in the first place.

pub mod config;
pub mod error;
pub mod gate;
pub mod history;
pub mod orchestrator;
pub mod outcome;
pub mod request;
pub mod resolve;
pub mod retry;

pub use config::SettlementConfig;
pub use error::{HistoryError, SaleError, SettlementError};
pub use gate::{FixedGate, GateContext, GateDecision, PaymentGate, StochasticGate};
pub use history::{RECENT_DEFAULT_LIMIT, RECENT_MAX_LIMIT, SalesHistory};
pub use orchestrator::CheckoutOrchestrator;
pub use outcome::{CheckoutResult, DirectSaleReceipt, ItemOutcome, SaleView};
pub use request::{CheckoutRequest, DirectSaleRequest, LineItem, ProductRef};
pub use resolve::{Resolution, resolve};
pub use retry::{GaveUp, RetryPolicy};

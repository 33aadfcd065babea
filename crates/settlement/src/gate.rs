//! Payment gate: one approve/decline decision per checkout.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::{BuyerId, CheckoutId, Money};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;

/// Decline probability used when none is configured.
pub const DEFAULT_DECLINE_RATE: f64 = 0.2;

/// What the gate gets to see about a checkout.
#[derive(Debug, Clone)]
pub struct GateContext {
    pub checkout_id: CheckoutId,
    pub buyer: BuyerId,
    pub declared_total: Money,
    pub shipping_cost: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Approved,
    Declined,
}

impl GateDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, GateDecision::Approved)
    }
}

/// Trait for payment authorization.
///
/// Implementations must return a decision for every call; a provider that
/// cannot decide should decline.
#[async_trait]
pub trait PaymentGate: Send + Sync {
    async fn decide(&self, ctx: &GateContext) -> GateDecision;
}

#[async_trait]
impl<T: PaymentGate + ?Sized> PaymentGate for Arc<T> {
    async fn decide(&self, ctx: &GateContext) -> GateDecision {
        (**self).decide(ctx).await
    }
}

/// Stub gate that declines a fixed fraction of checkouts at random.
pub struct StochasticGate {
    decline_rate: f64,
    rng: Mutex<StdRng>,
}

impl StochasticGate {
    /// Creates a gate seeded from OS entropy.
    pub fn new(decline_rate: f64) -> Self {
        Self::with_rng(decline_rate, StdRng::from_entropy())
    }

    /// Creates a gate whose decisions are reproducible for a given seed.
    pub fn seeded(decline_rate: f64, seed: u64) -> Self {
        Self::with_rng(decline_rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(decline_rate: f64, rng: StdRng) -> Self {
        Self {
            decline_rate: clamp_rate(decline_rate),
            rng: Mutex::new(rng),
        }
    }

    pub fn decline_rate(&self) -> f64 {
        self.decline_rate
    }
}

impl Default for StochasticGate {
    fn default() -> Self {
        Self::new(DEFAULT_DECLINE_RATE)
    }
}

/// Clamps a configured rate into `[0, 1]`. Non-finite values fall back to
/// the default.
pub fn clamp_rate(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.clamp(0.0, 1.0)
    } else {
        DEFAULT_DECLINE_RATE
    }
}

#[async_trait]
impl PaymentGate for StochasticGate {
    async fn decide(&self, ctx: &GateContext) -> GateDecision {
        let declined = self.rng.lock().await.gen_bool(self.decline_rate);
        tracing::debug!(checkout_id = %ctx.checkout_id, declined, "payment gate decided");
        if declined {
            GateDecision::Declined
        } else {
            GateDecision::Approved
        }
    }
}

/// Deterministic gate for tests and demos. Counts how often it was asked.
#[derive(Debug, Clone)]
pub struct FixedGate {
    decision: GateDecision,
    calls: Arc<AtomicUsize>,
}

impl FixedGate {
    pub fn approving() -> Self {
        Self::new(GateDecision::Approved)
    }

    pub fn declining() -> Self {
        Self::new(GateDecision::Declined)
    }

    pub fn new(decision: GateDecision) -> Self {
        Self {
            decision,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `decide` calls so far, across all clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGate for FixedGate {
    async fn decide(&self, _ctx: &GateContext) -> GateDecision {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.decision
    }
}

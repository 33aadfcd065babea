//! HTTP API server for checkout settlement.
//!
//! Provides REST endpoints for settling checkouts, direct sales and sales
//! history, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use inventory::{InMemoryInventoryStore, InventoryStore};
use ledger::{InMemorySaleLedger, SaleLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use settlement::StochasticGate;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use state::{AppState, SharedGate};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<I, L>(state: Arc<AppState<I, L>>, metrics_handle: PrometheusHandle) -> Router
where
    I: InventoryStore + Clone + 'static,
    L: SaleLedger + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkout", post(routes::checkout::create::<I, L>))
        .route("/checkout/{id}", get(routes::checkout::get::<I, L>))
        .route("/sales", get(routes::sales::recent::<I, L>))
        .route("/sales", post(routes::sales::create::<I, L>))
        .route("/sales/mine", get(routes::sales::mine::<I, L>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds application state over the given stores, using the stochastic
/// payment gate configured in `config`.
pub fn create_state<I, L>(inventory: I, ledger: L, config: &Config) -> Arc<AppState<I, L>>
where
    I: InventoryStore + Clone,
    L: SaleLedger + Clone,
{
    let gate: SharedGate = Arc::new(StochasticGate::new(config.payment_decline_rate));
    Arc::new(AppState::new(inventory, ledger, gate, config.settlement()))
}

/// Creates the default application state with in-memory stores.
pub fn create_default_state(
    config: &Config,
) -> Arc<AppState<InMemoryInventoryStore, InMemorySaleLedger>> {
    create_state(
        InMemoryInventoryStore::new(),
        InMemorySaleLedger::new(),
        config,
    )
}

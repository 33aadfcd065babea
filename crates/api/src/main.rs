//! API server entry point.

use api::config::{Config, LogFormat};
use inventory::{InventoryStore, PostgresInventoryStore};
use ledger::PostgresSaleLedger;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn seed<I: InventoryStore>(store: &I, config: &Config) {
    let Some(path) = &config.catalog_seed else {
        return;
    };
    match api::seed::seed_from_file(store, path).await {
        Ok(report) => tracing::info!(
            path = %path,
            created = report.created,
            skipped = report.skipped,
            "catalog seeded"
        ),
        Err(e) => tracing::error!(path = %path, error = %e, "catalog seeding failed"),
    }
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Create stores and application state
    let app = match &config.database_url {
        Some(url) => {
            let options = url
                .parse::<PgConnectOptions>()
                .expect("invalid DATABASE_URL")
                .options([("statement_timeout", config.statement_timeout_ms())]);
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect_with(options)
                .await
                .expect("failed to connect to PostgreSQL");
            let inventory = PostgresInventoryStore::new(pool.clone());
            inventory
                .run_migrations()
                .await
                .expect("failed to run migrations");
            let ledger = PostgresSaleLedger::new(pool);
            tracing::info!(
                max_connections = config.database_max_connections,
                statement_timeout_ms = config.statement_timeout_ms(),
                "using PostgreSQL stores"
            );

            seed(&inventory, &config).await;
            api::create_app(api::create_state(inventory, ledger, &config), metrics_handle)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            let state = api::create_default_state(&config);
            seed(state.inventory(), &config).await;
            api::create_app(state, metrics_handle)
        }
    };

    // 4. Start server
    let addr = config.addr();
    tracing::info!(
        %addr,
        decline_rate = config.payment_decline_rate,
        "starting API server"
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

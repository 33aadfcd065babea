//! Application configuration loaded from environment variables.

use std::time::Duration;

use settlement::SettlementConfig;
use settlement::gate::{DEFAULT_DECLINE_RATE, clamp_rate};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset selects in-memory stores
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `PAYMENT_DECLINE_RATE`: stub gate decline probability (default: `0.2`)
/// - `STORAGE_TIMEOUT_MS`: bound on each storage call (default: `5000`)
/// - `LEDGER_APPEND_ATTEMPTS`: append tries before giving up (default: `3`)
/// - `CATALOG_SEED`: optional JSON file of products to create at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub payment_decline_rate: f64,
    pub storage_timeout_ms: u64,
    pub ledger_append_attempts: usize,
    pub catalog_seed: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup. Unparseable values
    /// fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_blank("HOST").unwrap_or(defaults.host),
            port: parsed::<u16>(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: non_blank("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            database_url: non_blank("DATABASE_URL"),
            database_max_connections: parsed::<u32>(&lookup, "DATABASE_MAX_CONNECTIONS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.database_max_connections),
            payment_decline_rate: parsed::<f64>(&lookup, "PAYMENT_DECLINE_RATE")
                .map(clamp_rate)
                .unwrap_or(defaults.payment_decline_rate),
            storage_timeout_ms: parsed::<u64>(&lookup, "STORAGE_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.storage_timeout_ms),
            ledger_append_attempts: parsed::<usize>(&lookup, "LEDGER_APPEND_ATTEMPTS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.ledger_append_attempts),
            catalog_seed: non_blank("CATALOG_SEED"),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Server-side `statement_timeout` for PostgreSQL sessions: four fifths
    /// of the storage timeout.
    pub fn statement_timeout_ms(&self) -> u64 {
        (self.storage_timeout_ms.saturating_mul(4) / 5).max(1)
    }

    /// Settlement tunables derived from this configuration.
    pub fn settlement(&self) -> SettlementConfig {
        SettlementConfig::new(
            Duration::from_millis(self.storage_timeout_ms),
            self.ledger_append_attempts,
        )
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            payment_decline_rate: DEFAULT_DECLINE_RATE,
            storage_timeout_ms: 5000,
            ledger_append_attempts: 3,
            catalog_seed: None,
        }
    }
}

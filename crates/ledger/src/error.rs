use common::SaleId;
use thiserror::Error;

/// Errors that can occur when interacting with the sale ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A record with the same id was already appended.
    #[error("Sale {0} already recorded")]
    DuplicateSale(SaleId),

    /// The ledger could not serve the request.
    #[error("Sale ledger unavailable: {0}")]
    Unavailable(String),

    /// A persisted row held a value outside the domain range.
    #[error("Corrupt sale row: {0}")]
    CorruptRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

use thiserror::Error;

/// Errors that can occur when interacting with the inventory store.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// A product submitted by the catalog failed validation.
    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    /// The store could not serve the request.
    #[error("Inventory store unavailable: {0}")]
    Unavailable(String),

    /// A persisted row held a value outside the domain range.
    #[error("Corrupt product row: {0}")]
    CorruptRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl InventoryError {
    /// True when a write may have been applied even though the call failed:
    /// the connection broke after the statement went out.
    pub fn outcome_unknown(&self) -> bool {
        matches!(
            self,
            InventoryError::Database(sqlx::Error::Io(_) | sqlx::Error::Protocol(_))
        )
    }
}

/// Result type for inventory store operations.
pub type Result<T> = std::result::Result<T, InventoryError>;

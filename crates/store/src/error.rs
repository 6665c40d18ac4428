use thiserror::Error;

/// Errors that can occur when reading or writing the cart tables.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A value does not fit the column it is stored in.
    #[error("Value out of range for column '{column}': {value}")]
    OutOfRange { column: &'static str, value: i64 },

    /// The backing store is unavailable (used by test doubles).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

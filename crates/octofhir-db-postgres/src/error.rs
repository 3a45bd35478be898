//! Error types for the PostgreSQL history backend.

use octofhir_storage::StorageError;
use sqlx_core::error::Error as SqlxError;

/// PostgreSQL error code for undefined table (42P01).
pub const PG_UNDEFINED_TABLE: &str = "42P01";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Checks if a sqlx error is "undefined table" (42P01).
pub fn is_undefined_table(err: &SqlxError) -> bool {
    has_pg_error_code(err, PG_UNDEFINED_TABLE)
}

/// Errors specific to the PostgreSQL history backend.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Error returned by the driver, unchanged.
    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    /// Migration error (generic string for compatibility with different migration tools).
    #[error("Migration error: {0}")]
    Migration(String),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns `true` if the driver could not reach the database.
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::Database(
                SqlxError::PoolTimedOut
                    | SqlxError::PoolClosed
                    | SqlxError::Io(_)
                    | SqlxError::Tls(_)
            )
        )
    }
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        if err.is_connection_failure() {
            return StorageError::connection_error(err.to_string());
        }
        match err {
            PostgresError::Database(e) => StorageError::internal(e.to_string()),
            PostgresError::Migration(e) => StorageError::internal(format!("Migration error: {e}")),
            PostgresError::Config { message } => {
                StorageError::internal(format!("Configuration error: {message}"))
            }
        }
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

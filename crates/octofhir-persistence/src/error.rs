//! Errors surfaced by the persistence facade.

use octofhir_core::CoreError;
use octofhir_db_postgres::PostgresError;
use octofhir_patch::PatchError;
use octofhir_storage::{ErrorCategory, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The configuration sources could not be read or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Document(#[from] CoreError),

    /// The search statement failed in the database.
    #[error("Search failed: {0}")]
    Search(#[from] PostgresError),

    /// Search execution needs a relational backend.
    #[error("Search is not supported by the {backend} backend")]
    SearchUnavailable { backend: &'static str },
}

impl PersistenceError {
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns `true` if the caller can fix the request and retry.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Storage(e) => matches!(
                e.category(),
                ErrorCategory::NotFound | ErrorCategory::Conflict | ErrorCategory::Validation
            ),
            Self::Patch(_) => true,
            Self::Document(e) => e.is_client_error(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

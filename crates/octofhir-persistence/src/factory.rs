//! Builds the configured `VersionStore`.

use std::sync::Arc;

use octofhir_db_postgres::PostgresVersionStore;
use octofhir_storage::DynVersionStore;
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::Result;

/// A constructed backend.
///
/// `postgres` keeps the concrete store so its pool can execute searches.
#[derive(Clone)]
pub struct Backend {
    pub kind: StorageBackend,
    pub store: DynVersionStore,
    pub postgres: Option<PostgresVersionStore>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("kind", &self.kind)
            .field("store", &self.store.backend_name())
            .finish()
    }
}

/// Creates the store selected by `storage.backend`.
///
/// # Errors
///
/// Returns an error if the PostgreSQL pool cannot be created or migrations
/// fail.
pub async fn create_backend(storage: &StorageConfig) -> Result<Backend> {
    let backend = match storage.backend {
        StorageBackend::Memory => Backend {
            kind: StorageBackend::Memory,
            store: octofhir_db_memory::create_version_store(),
            postgres: None,
        },
        StorageBackend::Postgres => {
            let store = PostgresVersionStore::new(storage.postgres.to_postgres_config()).await?;
            Backend {
                kind: StorageBackend::Postgres,
                store: Arc::new(store.clone()),
                postgres: Some(store),
            }
        }
    };
    info!(backend = backend.kind.as_str(), "version store ready");
    Ok(backend)
}

//! PostgreSQL implementation of the `VersionStore` trait.

use async_trait::async_trait;
use sqlx_postgres::PgPool;
use tracing::instrument;

use octofhir_storage::{ResourceKey, StorageError, VersionRecord, VersionStore};

use crate::config::PostgresConfig;
use crate::migrations;
use crate::pool;
use crate::queries::history;

/// PostgreSQL version store.
///
/// The current version of each key lives in `resource_version`; every
/// version, tombstones included, is kept in `resource_history`.
#[derive(Debug, Clone)]
pub struct PostgresVersionStore {
    pool: PgPool,
}

impl PostgresVersionStore {
    /// Creates a new `PostgresVersionStore` with the given configuration.
    ///
    /// Creates the connection pool and runs migrations when
    /// `run_migrations` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created
    /// or if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::create_pool(&config).await?;

        if config.run_migrations {
            migrations::run(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// Creates a store from an existing connection pool.
    ///
    /// Migrations are not run automatically when using this constructor.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl VersionStore for PostgresVersionStore {
    #[instrument(skip(self, record), fields(key = %record.key()))]
    async fn insert_first(&self, record: &VersionRecord) -> Result<(), StorageError> {
        history::insert_first(&self.pool, record).await
    }

    #[instrument(skip(self, record), fields(key = %record.key(), version = record.version_id))]
    async fn append_if_current(
        &self,
        expected: u64,
        record: &VersionRecord,
    ) -> Result<(), StorageError> {
        history::append_if_current(&self.pool, expected, record).await
    }

    async fn history(&self, key: &ResourceKey) -> Result<Vec<VersionRecord>, StorageError> {
        history::history(&self.pool, key).await
    }

    async fn latest(&self, key: &ResourceKey) -> Result<Option<VersionRecord>, StorageError> {
        history::latest(&self.pool, key).await
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

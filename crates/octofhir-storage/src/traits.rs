//! Storage traits for the version tracking layer.
//!
//! This module defines the contract every history backend must implement.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{ResourceKey, VersionRecord};

/// Append-only history store with compare-and-swap on the current version.
///
/// Implementations must be thread-safe (`Send + Sync`). Each write method
/// performs its precondition check and the append as one atomic unit, so two
/// callers racing on the same key never both succeed.
///
/// # Example
///
/// ```ignore
/// use octofhir_storage::{ResourceKey, VersionStore};
///
/// async fn current(store: &dyn VersionStore, key: &ResourceKey) -> Option<u64> {
///     store.latest(key).await.ok().flatten().map(|r| r.version_id)
/// }
/// ```
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Writes the first record of a key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if any record exists for the key.
    async fn insert_first(&self, record: &VersionRecord) -> Result<(), StorageError>;

    /// Appends `record` only if the key's latest record is live and carries
    /// version `expected`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the key has no records or its
    /// latest record is a tombstone.
    /// Returns `StorageError::VersionConflict` if the latest version differs
    /// from `expected`.
    async fn append_if_current(
        &self,
        expected: u64,
        record: &VersionRecord,
    ) -> Result<(), StorageError>;

    /// Returns every record of a key, oldest first.
    ///
    /// An unknown key yields an empty list.
    async fn history(&self, key: &ResourceKey) -> Result<Vec<VersionRecord>, StorageError>;

    /// Returns the most recent record of a key.
    async fn latest(&self, key: &ResourceKey) -> Result<Option<VersionRecord>, StorageError>;

    /// Returns a short name identifying the backend, for logging.
    fn backend_name(&self) -> &'static str;
}

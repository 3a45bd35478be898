//! Optimistic-concurrency version tracker.
//!
//! Per key the lifecycle is `Absent -> Active(1) -> Active(2) -> ... -> Deleted`.
//! A deleted key is terminal: it cannot be updated, deleted again or
//! re-created, and its history is retained.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::StorageError;
use crate::traits::VersionStore;
use crate::types::{ResourceKey, VersionAction, VersionRecord, VersionState};

/// Records create/update/delete events and serves resource history.
#[derive(Clone)]
pub struct VersionTracker {
    store: Arc<dyn VersionStore>,
}

impl std::fmt::Debug for VersionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionTracker")
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

impl VersionTracker {
    /// Creates a tracker over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self { store }
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn VersionStore> {
        &self.store
    }

    /// Records the creation of a resource as version 1.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the key has any history.
    #[instrument(skip(self, snapshot), fields(backend = self.store.backend_name()))]
    pub async fn record_create(
        &self,
        resource_type: &str,
        resource_id: &str,
        snapshot: Value,
    ) -> Result<VersionRecord, StorageError> {
        let key = validated_key(resource_type, resource_id)?;
        let record = VersionRecord::new(
            &key,
            1,
            VersionAction::Create,
            octofhir_core::now_utc(),
            Some(snapshot),
        );
        self.store.insert_first(&record).await?;
        debug!(%key, version = 1, "resource created");
        Ok(record)
    }

    /// Records an update based on `expected_version`, writing the next version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::VersionConflict` if `expected_version` is stale.
    /// Returns `StorageError::NotFound` if the resource is absent or deleted.
    #[instrument(skip(self, snapshot), fields(backend = self.store.backend_name()))]
    pub async fn record_update(
        &self,
        resource_type: &str,
        resource_id: &str,
        expected_version: u64,
        snapshot: Value,
    ) -> Result<VersionRecord, StorageError> {
        self.append(
            resource_type,
            resource_id,
            expected_version,
            VersionAction::Update,
            Some(snapshot),
        )
        .await
    }

    /// Records a delete based on `expected_version`, writing a tombstone.
    ///
    /// # Errors
    ///
    /// Same as [`record_update`](Self::record_update).
    #[instrument(skip(self), fields(backend = self.store.backend_name()))]
    pub async fn record_delete(
        &self,
        resource_type: &str,
        resource_id: &str,
        expected_version: u64,
    ) -> Result<VersionRecord, StorageError> {
        self.append(
            resource_type,
            resource_id,
            expected_version,
            VersionAction::Delete,
            None,
        )
        .await
    }

    async fn append(
        &self,
        resource_type: &str,
        resource_id: &str,
        expected_version: u64,
        action: VersionAction,
        snapshot: Option<Value>,
    ) -> Result<VersionRecord, StorageError> {
        let key = validated_key(resource_type, resource_id)?;
        let Some(next) = expected_version.checked_add(1) else {
            return Err(StorageError::invalid_resource(format!(
                "version {expected_version} cannot be incremented"
            )));
        };
        let record = VersionRecord::new(&key, next, action, octofhir_core::now_utc(), snapshot);
        self.store
            .append_if_current(expected_version, &record)
            .await?;
        debug!(%key, version = next, %action, "resource version recorded");
        Ok(record)
    }

    /// Returns the full history of a resource, oldest first.
    pub async fn history(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<Vec<VersionRecord>, StorageError> {
        let key = validated_key(resource_type, resource_id)?;
        self.store.history(&key).await
    }

    /// Returns the lifecycle state of a resource.
    pub async fn current_state(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<VersionState, StorageError> {
        let key = validated_key(resource_type, resource_id)?;
        let latest = self.store.latest(&key).await?;
        Ok(VersionState::from_latest(latest.as_ref()))
    }

    /// Returns one historical version, tombstones included.
    pub async fn read_version(
        &self,
        resource_type: &str,
        resource_id: &str,
        version_id: u64,
    ) -> Result<Option<VersionRecord>, StorageError> {
        let key = validated_key(resource_type, resource_id)?;
        let history = self.store.history(&key).await?;
        Ok(history.into_iter().find(|r| r.version_id == version_id))
    }
}

fn validated_key(resource_type: &str, resource_id: &str) -> Result<ResourceKey, StorageError> {
    let valid_type = resource_type
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_uppercase())
        && resource_type.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid_type {
        return Err(StorageError::invalid_resource(format!(
            "invalid resource type: {resource_type:?}"
        )));
    }
    octofhir_core::validate_id(resource_id)?;
    Ok(ResourceKey::new(resource_type, resource_id))
}

//! Resource lifecycle on top of the version tracker.
//!
//! Snapshots are stored as submitted, with a missing `resourceType` or `id`
//! filled in from the target. `meta.versionId` and `meta.lastUpdated` are
//! stamped from the version record whenever a document is handed back.

use serde_json::Value;
use tracing::{debug, instrument};

use octofhir_core::{CoreError, generate_id, resource_id, resource_type, stamp_meta};
use octofhir_db_postgres::{SearchPage, execute_search};
use octofhir_patch::{PatchKind, apply_patch_payload};
use octofhir_search::SearchQuery;
use octofhir_storage::{DynVersionStore, StorageError, VersionRecord, VersionState, VersionTracker};

use crate::config::PersistenceConfig;
use crate::error::{PersistenceError, Result};
use crate::factory::{Backend, create_backend};

/// Configured store, tracker and search settings.
#[derive(Debug, Clone)]
pub struct Persistence {
    config: PersistenceConfig,
    backend: Backend,
    tracker: VersionTracker,
}

impl Persistence {
    /// Validates `config` and builds the selected backend.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an inconsistent configuration, or the
    /// backend's error if it cannot be created.
    pub async fn from_config(config: PersistenceConfig) -> Result<Self> {
        config.validate()?;
        let backend = create_backend(&config.storage).await?;
        let tracker = VersionTracker::new(backend.store.clone());
        Ok(Self {
            config,
            backend,
            tracker,
        })
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn store(&self) -> &DynVersionStore {
        &self.backend.store
    }

    pub fn tracker(&self) -> &VersionTracker {
        &self.tracker
    }

    /// Stores `document` as version 1.
    ///
    /// The id is taken from the document or generated when absent.
    #[instrument(skip(self, document))]
    pub async fn create(&self, mut document: Value) -> Result<Value> {
        let rtype = resource_type(&document)
            .ok_or_else(|| CoreError::invalid_resource("resourceType is required"))?
            .to_string();
        let id = if document.get("id").is_none() {
            generate_id()
        } else {
            resource_id(&document)
                .ok_or_else(|| CoreError::invalid_resource("id must be a string"))?
                .to_string()
        };
        prepare_envelope(&mut document, &rtype, &id)?;

        let record = self.tracker.record_create(&rtype, &id, document).await?;
        materialize(record)
    }

    /// Returns the current version of a live resource.
    pub async fn read(&self, rtype: &str, id: &str) -> Result<Value> {
        let record = self.current_record(rtype, id).await?;
        materialize(record)
    }

    /// Replaces the resource if `expected_version` is current.
    #[instrument(skip(self, document))]
    pub async fn update(
        &self,
        rtype: &str,
        id: &str,
        expected_version: u64,
        mut document: Value,
    ) -> Result<Value> {
        prepare_envelope(&mut document, rtype, id)?;
        let record = self
            .tracker
            .record_update(rtype, id, expected_version, document)
            .await?;
        materialize(record)
    }

    /// Applies a JSON Patch or Merge Patch body to the current version and
    /// stores the result as the next version.
    ///
    /// # Errors
    ///
    /// Returns `VersionConflict` if `expected_version` is stale, and the
    /// patch error unchanged if the body cannot be applied. Nothing is
    /// written on failure.
    #[instrument(skip(self, body), fields(kind = kind.content_type()))]
    pub async fn patch(
        &self,
        rtype: &str,
        id: &str,
        expected_version: u64,
        kind: PatchKind,
        body: &[u8],
    ) -> Result<Value> {
        let current = self.current_record(rtype, id).await?;
        if current.version_id != expected_version {
            return Err(StorageError::version_conflict(expected_version, current.version_id).into());
        }
        let snapshot = current
            .snapshot
            .ok_or_else(|| StorageError::internal(format!("{rtype}/{id} has no snapshot")))?;

        let mut patched = apply_patch_payload(&snapshot, kind, body)?;
        prepare_envelope(&mut patched, rtype, id)?;
        let record = self
            .tracker
            .record_update(rtype, id, expected_version, patched)
            .await?;
        debug!(version = record.version_id, "patch applied");
        materialize(record)
    }

    /// Deletes the resource if `expected_version` is current.
    pub async fn delete(&self, rtype: &str, id: &str, expected_version: u64) -> Result<VersionRecord> {
        Ok(self
            .tracker
            .record_delete(rtype, id, expected_version)
            .await?)
    }

    /// Returns every version of a resource, oldest first.
    pub async fn history(&self, rtype: &str, id: &str) -> Result<Vec<VersionRecord>> {
        Ok(self.tracker.history(rtype, id).await?)
    }

    /// Runs `query` with a page size bounded by the search settings.
    ///
    /// # Errors
    ///
    /// Returns `SearchUnavailable` on the memory backend.
    pub async fn search(
        &self,
        query: &SearchQuery,
        count: Option<usize>,
        offset: usize,
    ) -> Result<SearchPage> {
        let Some(postgres) = &self.backend.postgres else {
            return Err(PersistenceError::SearchUnavailable {
                backend: self.backend.store.backend_name(),
            });
        };
        let limit = self.config.search.clamp_count(count);
        let page = execute_search(
            postgres.pool(),
            query,
            i64::try_from(limit).unwrap_or(i64::MAX),
            i64::try_from(offset).unwrap_or(i64::MAX),
        )
        .await?;
        Ok(page)
    }

    async fn current_record(&self, rtype: &str, id: &str) -> Result<VersionRecord> {
        let VersionState::Active(version) = self.tracker.current_state(rtype, id).await? else {
            return Err(StorageError::not_found(rtype, id).into());
        };
        self.tracker
            .read_version(rtype, id, version)
            .await?
            .ok_or_else(|| StorageError::not_found(rtype, id).into())
    }
}

/// Checks that `document` is an object naming the target resource and fills
/// in `resourceType` and `id` when they are absent.
fn prepare_envelope(document: &mut Value, rtype: &str, id: &str) -> Result<()> {
    let Some(obj) = document.as_object_mut() else {
        return Err(CoreError::invalid_resource("resource document must be a JSON object").into());
    };
    match obj.get("resourceType") {
        None => {
            obj.insert("resourceType".into(), Value::String(rtype.to_string()));
        }
        Some(Value::String(t)) if t == rtype => {}
        Some(_) => {
            return Err(CoreError::invalid_resource(format!(
                "resourceType does not match {rtype}"
            ))
            .into());
        }
    }
    match obj.get("id") {
        None => {
            obj.insert("id".into(), Value::String(id.to_string()));
        }
        Some(Value::String(i)) if i == id => {}
        Some(_) => {
            return Err(CoreError::invalid_resource(format!("id does not match {id}")).into());
        }
    }
    Ok(())
}

fn materialize(record: VersionRecord) -> Result<Value> {
    let mut document = record.snapshot.ok_or_else(|| {
        StorageError::internal(format!(
            "{}/{} v{} has no snapshot",
            record.resource_type, record.resource_id, record.version_id
        ))
    })?;
    stamp_meta(&mut document, record.version_id, record.last_updated)?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_include;
    use octofhir_patch::PatchError;
    use serde_json::json;

    async fn persistence() -> Persistence {
        Persistence::from_config(PersistenceConfig::default())
            .await
            .unwrap()
    }

    fn measure() -> Value {
        json!({"resourceType": "Measure", "id": "m1", "status": "draft", "title": "BP"})
    }

    #[tokio::test]
    async fn test_create_stamps_meta() {
        let p = persistence().await;
        let created = p.create(measure()).await.unwrap();
        assert_eq!(created["meta"]["versionId"], "1");
        assert!(created["meta"]["lastUpdated"].is_string());

        let read = p.read("Measure", "m1").await.unwrap();
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn test_create_generates_missing_id() {
        let p = persistence().await;
        let created = p
            .create(json!({"resourceType": "Measure", "status": "draft"}))
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap().to_string();
        assert!(!id.is_empty());
        p.read("Measure", &id).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_requires_resource_type() {
        let p = persistence().await;
        let err = p.create(json!({"id": "x"})).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Document(_)));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_update_checks_envelope_and_version() {
        let p = persistence().await;
        p.create(measure()).await.unwrap();

        let err = p
            .update("Measure", "m1", 1, json!({"resourceType": "Library"}))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Document(_)));

        let updated = p
            .update("Measure", "m1", 1, json!({"resourceType": "Measure", "id": "m1", "status": "active"}))
            .await
            .unwrap();
        assert_eq!(updated["meta"]["versionId"], "2");

        let err = p
            .update("Measure", "m1", 1, json!({"status": "retired"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Storage(StorageError::VersionConflict { expected: 1, actual: 2 })
        ));
    }

    #[tokio::test]
    async fn test_update_rejects_non_object_without_writing() {
        let p = persistence().await;
        p.create(measure()).await.unwrap();

        let err = p
            .update("Measure", "m1", 1, json!([1, 2]))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Document(_)));
        assert!(err.is_client_error());
        assert_eq!(p.history("Measure", "m1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_fills_missing_envelope() {
        let p = persistence().await;
        p.create(measure()).await.unwrap();
        p.update("Measure", "m1", 1, json!({"status": "active"}))
            .await
            .unwrap();

        let read = p.read("Measure", "m1").await.unwrap();
        assert_json_include!(
            actual: read,
            expected: json!({"resourceType": "Measure", "id": "m1", "status": "active"})
        );
        let history = p.history("Measure", "m1").await.unwrap();
        let stored = history[1].snapshot.as_ref().unwrap();
        assert_eq!(stored["resourceType"], "Measure");
        assert_eq!(stored["id"], "m1");
    }

    #[tokio::test]
    async fn test_create_rejects_non_string_id() {
        let p = persistence().await;
        let err = p
            .create(json!({"resourceType": "Measure", "id": 7}))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Document(_)));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_json_patch_then_merge_patch() {
        let p = persistence().await;
        p.create(measure()).await.unwrap();

        let body = br#"[{"op": "test", "path": "/status", "value": "draft"},
                        {"op": "replace", "path": "/status", "value": "active"}]"#;
        let patched = p
            .patch("Measure", "m1", 1, PatchKind::JsonPatch, body)
            .await
            .unwrap();
        assert_json_include!(
            actual: patched,
            expected: json!({"status": "active", "meta": {"versionId": "2"}})
        );

        let patched = p
            .patch("Measure", "m1", 2, PatchKind::MergePatch, br#"{"title": null}"#)
            .await
            .unwrap();
        assert!(patched.get("title").is_none());
        assert_eq!(patched["meta"]["versionId"], "3");
        assert_eq!(p.history("Measure", "m1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_patch_writes_nothing() {
        let p = persistence().await;
        p.create(measure()).await.unwrap();

        let body = br#"[{"op": "test", "path": "/status", "value": "active"}]"#;
        let err = p
            .patch("Measure", "m1", 1, PatchKind::JsonPatch, body)
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Patch(PatchError::TestFailed { .. })));

        let body = br#"[{"op": "replace", "path": "/id", "value": "m2"}]"#;
        let err = p
            .patch("Measure", "m1", 1, PatchKind::JsonPatch, body)
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Patch(PatchError::ProtectedPath { .. })));

        assert_eq!(p.history("Measure", "m1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_patch_conflicts() {
        let p = persistence().await;
        p.create(measure()).await.unwrap();
        p.update("Measure", "m1", 1, measure()).await.unwrap();

        let err = p
            .patch("Measure", "m1", 1, PatchKind::MergePatch, br#"{"status": "active"}"#)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Storage(StorageError::VersionConflict { expected: 1, actual: 2 })
        ));
    }

    #[tokio::test]
    async fn test_delete_hides_resource() {
        let p = persistence().await;
        p.create(measure()).await.unwrap();
        let tombstone = p.delete("Measure", "m1", 1).await.unwrap();
        assert!(tombstone.is_tombstone());

        let err = p.read("Measure", "m1").await.unwrap_err();
        assert!(matches!(err, PersistenceError::Storage(StorageError::NotFound { .. })));

        let err = p
            .patch("Measure", "m1", 2, PatchKind::MergePatch, b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Storage(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_search_needs_postgres() {
        let p = persistence().await;
        let query = SearchQuery::new("measure", &["id"]).unwrap();
        let err = p.search(&query, None, 0).await.unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::SearchUnavailable { backend: "memory" }
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = PersistenceConfig::default();
        config.search.max_count = 0;
        let err = Persistence::from_config(config).await.unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidConfig { .. }));
    }
}

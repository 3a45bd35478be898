use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use octofhir_storage::{ResourceKey, StorageError, VersionRecord, VersionStore};
use tracing::{debug, instrument};

/// Options for the in-memory backend.
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Initial capacity hint, in resource keys.
    pub preallocate_items: Option<usize>,
}

/// In-memory history store on a sharded `DashMap`.
///
/// Each key maps to its full record list. Writes go through the key's shard
/// lock, so the precondition check and the append are one atomic step.
#[derive(Debug, Default)]
pub struct InMemoryVersionStore {
    records: DashMap<ResourceKey, Vec<VersionRecord>>,
}

impl InMemoryVersionStore {
    /// Creates a new in-memory store with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory store with the given options.
    pub fn with_options(options: StorageOptions) -> Self {
        let records = match options.preallocate_items {
            Some(capacity) => DashMap::with_capacity(capacity),
            None => DashMap::new(),
        };
        Self { records }
    }

    /// Number of tracked resource keys, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl VersionStore for InMemoryVersionStore {
    #[instrument(skip(self, record), fields(key = %record.key()))]
    async fn insert_first(&self, record: &VersionRecord) -> Result<(), StorageError> {
        match self.records.entry(record.key()) {
            Entry::Occupied(entry) => Err(StorageError::already_exists_key(entry.key())),
            Entry::Vacant(entry) => {
                entry.insert(vec![record.clone()]);
                debug!(version = record.version_id, "first version stored");
                Ok(())
            }
        }
    }

    #[instrument(skip(self, record), fields(key = %record.key()))]
    async fn append_if_current(
        &self,
        expected: u64,
        record: &VersionRecord,
    ) -> Result<(), StorageError> {
        let key = record.key();
        let mut history = self
            .records
            .get_mut(&key)
            .ok_or_else(|| StorageError::not_found_key(&key))?;

        let current = match history.last() {
            Some(last) if !last.is_tombstone() => last.version_id,
            _ => return Err(StorageError::not_found_key(&key)),
        };
        if current != expected {
            return Err(StorageError::version_conflict(expected, current));
        }

        history.push(record.clone());
        debug!(version = record.version_id, action = %record.action, "version appended");
        Ok(())
    }

    async fn history(&self, key: &ResourceKey) -> Result<Vec<VersionRecord>, StorageError> {
        Ok(self
            .records
            .get(key)
            .map(|h| h.value().clone())
            .unwrap_or_default())
    }

    async fn latest(&self, key: &ResourceKey) -> Result<Option<VersionRecord>, StorageError> {
        Ok(self.records.get(key).and_then(|h| h.last().cloned()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_storage::{VersionAction, VersionState, VersionTracker};
    use serde_json::json;
    use std::sync::Arc;
    use time::OffsetDateTime;

    fn record(version: u64, action: VersionAction) -> VersionRecord {
        VersionRecord::new(
            &ResourceKey::new("Measure", "m1"),
            version,
            action,
            OffsetDateTime::now_utc(),
            (action != VersionAction::Delete).then(|| json!({"version": version})),
        )
    }

    #[tokio::test]
    async fn test_insert_first_once() {
        let store = InMemoryVersionStore::new();
        store.insert_first(&record(1, VersionAction::Create)).await.unwrap();
        let err = store
            .insert_first(&record(1, VersionAction::Create))
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_append_checks_current_version() {
        let store = InMemoryVersionStore::new();
        let key = ResourceKey::new("Measure", "m1");

        let err = store
            .append_if_current(1, &record(2, VersionAction::Update))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        store.insert_first(&record(1, VersionAction::Create)).await.unwrap();
        store
            .append_if_current(1, &record(2, VersionAction::Update))
            .await
            .unwrap();

        let err = store
            .append_if_current(1, &record(2, VersionAction::Update))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::VersionConflict {
                expected: 1,
                actual: 2
            }
        ));

        store
            .append_if_current(2, &record(3, VersionAction::Delete))
            .await
            .unwrap();
        let err = store
            .append_if_current(3, &record(4, VersionAction::Update))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let versions: Vec<_> = store
            .history(&key)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.version_id)
            .collect();
        assert_eq!(versions, [1, 2, 3]);
        assert_eq!(store.latest(&key).await.unwrap().unwrap().version_id, 3);
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let store = InMemoryVersionStore::with_options(StorageOptions {
            preallocate_items: Some(16),
        });
        let key = ResourceKey::new("Measure", "none");
        assert!(store.history(&key).await.unwrap().is_empty());
        assert!(store.latest(&key).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_tracker_over_memory_store() {
        let tracker = VersionTracker::new(Arc::new(InMemoryVersionStore::new()));

        let measure = json!({"resourceType": "Measure", "id": "m1", "status": "draft"});
        let v1 = tracker
            .record_create("Measure", "m1", measure.clone())
            .await
            .unwrap();
        for n in 0..10u64 {
            tracker
                .record_update("Measure", "m1", v1.version_id + n, measure.clone())
                .await
                .unwrap();
        }
        let history = tracker.history("Measure", "m1").await.unwrap();
        let versions: Vec<_> = history.iter().map(|r| r.version_id).collect();
        assert_eq!(versions, (1..=11).collect::<Vec<_>>());
        assert!(
            history
                .windows(2)
                .all(|w| w[0].last_updated <= w[1].last_updated)
        );
        assert_eq!(
            tracker.current_state("Measure", "m1").await.unwrap(),
            VersionState::Active(11)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_one_winner() {
        for _ in 0..20 {
            let tracker = VersionTracker::new(Arc::new(InMemoryVersionStore::new()));
            tracker
                .record_create("Measure", "m1", json!({"status": "draft"}))
                .await
                .unwrap();

            let a = {
                let tracker = tracker.clone();
                tokio::spawn(async move {
                    tracker
                        .record_update("Measure", "m1", 1, json!({"status": "active"}))
                        .await
                })
            };
            let b = {
                let tracker = tracker.clone();
                tokio::spawn(async move {
                    tracker
                        .record_update("Measure", "m1", 1, json!({"status": "retired"}))
                        .await
                })
            };

            let results = [a.await.unwrap(), b.await.unwrap()];
            let winners = results.iter().filter(|r| r.is_ok()).count();
            let conflicts = results
                .iter()
                .filter(|r| r.as_ref().is_err_and(StorageError::is_version_conflict))
                .count();
            assert_eq!((winners, conflicts), (1, 1));
            assert_eq!(tracker.history("Measure", "m1").await.unwrap().len(), 2);
        }
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let tracker = VersionTracker::new(Arc::new(InMemoryVersionStore::new()));
        tracker.record_create("Measure", "a", json!({})).await.unwrap();
        tracker.record_create("Measure", "b", json!({})).await.unwrap();
        tracker.record_create("Library", "a", json!({})).await.unwrap();
        tracker.record_delete("Measure", "a", 1).await.unwrap();

        assert_eq!(
            tracker.current_state("Measure", "b").await.unwrap(),
            VersionState::Active(1)
        );
        assert_eq!(
            tracker.current_state("Library", "a").await.unwrap(),
            VersionState::Active(1)
        );
    }
}

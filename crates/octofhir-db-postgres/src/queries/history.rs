//! Version history query implementations.
//!
//! `resource_version` carries the current version of each key and is updated
//! with a conditional `UPDATE`; `resource_history` receives one row per
//! version. Both writes share a transaction.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::{PgPool, PgTransaction};
use time::OffsetDateTime;
use tracing::debug;

use octofhir_storage::{ResourceKey, StorageError, VersionAction, VersionRecord};

use crate::error::PostgresError;

type HistoryRow = (String, String, i64, DateTime<Utc>, String, Option<Value>);

/// Converts chrono DateTime to time OffsetDateTime.
fn chrono_to_time(dt: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(dt.timestamp()).unwrap_or(OffsetDateTime::UNIX_EPOCH)
        + time::Duration::nanoseconds(i64::from(dt.timestamp_subsec_nanos()))
}

/// Converts time OffsetDateTime to chrono DateTime for binding.
fn time_to_chrono(ts: OffsetDateTime) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp(ts.unix_timestamp(), ts.nanosecond())
        .ok_or_else(|| StorageError::invalid_resource(format!("timestamp out of range: {ts}")))
}

fn version_to_db(version: u64) -> Result<i64, StorageError> {
    i64::try_from(version)
        .map_err(|_| StorageError::invalid_resource(format!("version {version} out of range")))
}

fn row_to_record(row: HistoryRow) -> Result<VersionRecord, StorageError> {
    let (resource_type, resource_id, version_id, last_updated, action, snapshot) = row;
    let action = VersionAction::parse(&action)
        .ok_or_else(|| StorageError::internal(format!("unknown history action '{action}'")))?;
    let version_id = u64::try_from(version_id)
        .map_err(|_| StorageError::internal(format!("negative version {version_id}")))?;
    Ok(VersionRecord {
        resource_type,
        resource_id,
        version_id,
        last_updated: chrono_to_time(last_updated),
        action,
        snapshot,
    })
}

async fn insert_history_row(
    tx: &mut PgTransaction<'_>,
    record: &VersionRecord,
) -> Result<(), StorageError> {
    query(
        r#"INSERT INTO resource_history
               (resource_type, resource_id, version_id, last_updated, action, snapshot)
           VALUES ($1, $2, $3, $4, $5, $6)"#,
    )
    .bind(&record.resource_type)
    .bind(&record.resource_id)
    .bind(version_to_db(record.version_id)?)
    .bind(time_to_chrono(record.last_updated)?)
    .bind(record.action.as_str())
    .bind(&record.snapshot)
    .execute(&mut **tx)
    .await
    .map_err(PostgresError::from)?;
    Ok(())
}

/// Writes the first version of a key.
///
/// `ON CONFLICT DO NOTHING` turns an existing key into zero affected rows,
/// which maps to `AlreadyExists`.
pub async fn insert_first(pool: &PgPool, record: &VersionRecord) -> Result<(), StorageError> {
    let mut tx = pool.begin().await.map_err(PostgresError::from)?;

    let inserted = query(
        r#"INSERT INTO resource_version
               (resource_type, resource_id, current_version, deleted, last_updated)
           VALUES ($1, $2, $3, $4, $5)
           ON CONFLICT (resource_type, resource_id) DO NOTHING"#,
    )
    .bind(&record.resource_type)
    .bind(&record.resource_id)
    .bind(version_to_db(record.version_id)?)
    .bind(record.is_tombstone())
    .bind(time_to_chrono(record.last_updated)?)
    .execute(&mut *tx)
    .await
    .map_err(PostgresError::from)?;

    if inserted.rows_affected() == 0 {
        return Err(StorageError::already_exists(
            &record.resource_type,
            &record.resource_id,
        ));
    }

    insert_history_row(&mut tx, record).await?;
    tx.commit().await.map_err(PostgresError::from)?;

    debug!(key = %record.key(), version = record.version_id, "first version stored");
    Ok(())
}

/// Appends a version if the key is live at `expected`.
///
/// The conditional `UPDATE` takes the row lock; a concurrent writer with the
/// same expectation re-evaluates the predicate after we commit and matches
/// zero rows.
pub async fn append_if_current(
    pool: &PgPool,
    expected: u64,
    record: &VersionRecord,
) -> Result<(), StorageError> {
    let mut tx = pool.begin().await.map_err(PostgresError::from)?;

    let updated = query(
        r#"UPDATE resource_version
           SET current_version = $4, deleted = $5, last_updated = $6
           WHERE resource_type = $1 AND resource_id = $2
             AND current_version = $3 AND NOT deleted"#,
    )
    .bind(&record.resource_type)
    .bind(&record.resource_id)
    .bind(version_to_db(expected)?)
    .bind(version_to_db(record.version_id)?)
    .bind(record.is_tombstone())
    .bind(time_to_chrono(record.last_updated)?)
    .execute(&mut *tx)
    .await
    .map_err(PostgresError::from)?;

    if updated.rows_affected() == 0 {
        let current: Option<(i64, bool)> = query_as(
            r#"SELECT current_version, deleted FROM resource_version
               WHERE resource_type = $1 AND resource_id = $2"#,
        )
        .bind(&record.resource_type)
        .bind(&record.resource_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(PostgresError::from)?;

        return Err(match current {
            Some((version, false)) => StorageError::version_conflict(
                expected,
                u64::try_from(version).unwrap_or_default(),
            ),
            _ => StorageError::not_found(&record.resource_type, &record.resource_id),
        });
    }

    insert_history_row(&mut tx, record).await?;
    tx.commit().await.map_err(PostgresError::from)?;

    debug!(
        key = %record.key(),
        version = record.version_id,
        action = %record.action,
        "version appended"
    );
    Ok(())
}

/// Returns every version of a key, oldest first.
pub async fn history(pool: &PgPool, key: &ResourceKey) -> Result<Vec<VersionRecord>, StorageError> {
    let rows: Vec<HistoryRow> = query_as(
        r#"SELECT resource_type, resource_id, version_id, last_updated, action, snapshot
           FROM resource_history
           WHERE resource_type = $1 AND resource_id = $2
           ORDER BY version_id ASC"#,
    )
    .bind(&key.resource_type)
    .bind(&key.resource_id)
    .fetch_all(pool)
    .await
    .map_err(PostgresError::from)?;

    rows.into_iter().map(row_to_record).collect()
}

/// Returns the most recent version of a key.
pub async fn latest(pool: &PgPool, key: &ResourceKey) -> Result<Option<VersionRecord>, StorageError> {
    let row: Option<HistoryRow> = query_as(
        r#"SELECT resource_type, resource_id, version_id, last_updated, action, snapshot
           FROM resource_history
           WHERE resource_type = $1 AND resource_id = $2
           ORDER BY version_id DESC
           LIMIT 1"#,
    )
    .bind(&key.resource_type)
    .bind(&key.resource_id)
    .fetch_optional(pool)
    .await
    .map_err(PostgresError::from)?;

    row.map(row_to_record).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn test_time_conversions_round_trip() {
        let ts = datetime!(2024-05-06 07:08:09.123456 UTC);
        let chrono = time_to_chrono(ts).unwrap();
        assert_eq!(chrono_to_time(chrono), ts);
    }

    #[test]
    fn test_row_to_record() {
        let row: HistoryRow = (
            "Measure".into(),
            "m1".into(),
            2,
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            "update".into(),
            Some(json!({"status": "active"})),
        );
        let record = row_to_record(row).unwrap();
        assert_eq!(record.version_id, 2);
        assert_eq!(record.action, VersionAction::Update);
        assert_eq!(record.last_updated.unix_timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_row_with_unknown_action_is_internal_error() {
        let row: HistoryRow = (
            "Measure".into(),
            "m1".into(),
            1,
            DateTime::from_timestamp(0, 0).unwrap(),
            "patch".into(),
            None,
        );
        assert!(matches!(
            row_to_record(row),
            Err(StorageError::Internal { .. })
        ));
    }

    #[test]
    fn test_version_range() {
        assert_eq!(version_to_db(7).unwrap(), 7);
        assert!(version_to_db(u64::MAX).is_err());
    }
}

//! Accessors for the envelope fields every resource document carries.
//!
//! Documents are plain `serde_json::Value` objects. These helpers read
//! `resourceType` / `id` and write the `meta.versionId` / `meta.lastUpdated`
//! pair after a version has been recorded.

use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::error::{CoreError, Result};
use crate::time::format_instant;

/// Returns the `resourceType` of a document, if present and a string.
pub fn resource_type(document: &Value) -> Option<&str> {
    document.get("resourceType").and_then(Value::as_str)
}

/// Returns the logical `id` of a document, if present and a string.
pub fn resource_id(document: &Value) -> Option<&str> {
    document.get("id").and_then(Value::as_str)
}

/// Returns `meta.versionId` parsed as a version number.
pub fn meta_version(document: &Value) -> Option<u64> {
    document
        .get("meta")
        .and_then(|m| m.get("versionId"))
        .and_then(Value::as_str)
        .and_then(|v| v.parse().ok())
}

/// Writes `meta.versionId` and `meta.lastUpdated`, keeping other meta keys.
pub fn stamp_meta(document: &mut Value, version: u64, last_updated: OffsetDateTime) -> Result<()> {
    let obj = document
        .as_object_mut()
        .ok_or_else(|| CoreError::invalid_resource("resource document must be a JSON object"))?;

    let meta = obj
        .entry("meta")
        .or_insert_with(|| Value::Object(Map::new()));
    if !meta.is_object() {
        *meta = Value::Object(Map::new());
    }
    if let Some(meta) = meta.as_object_mut() {
        meta.insert("versionId".into(), Value::String(version.to_string()));
        meta.insert(
            "lastUpdated".into(),
            Value::String(format_instant(last_updated)?),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn test_envelope_accessors() {
        let doc = json!({"resourceType": "Patient", "id": "p1", "meta": {"versionId": "3"}});
        assert_eq!(resource_type(&doc), Some("Patient"));
        assert_eq!(resource_id(&doc), Some("p1"));
        assert_eq!(meta_version(&doc), Some(3));

        let bare = json!({"id": 7});
        assert_eq!(resource_type(&bare), None);
        assert_eq!(resource_id(&bare), None);
        assert_eq!(meta_version(&bare), None);
    }

    #[test]
    fn test_stamp_meta_preserves_other_meta_keys() {
        let mut doc = json!({
            "resourceType": "Patient",
            "id": "p1",
            "meta": {"profile": ["http://example.org/p"], "versionId": "1"}
        });
        stamp_meta(&mut doc, 2, datetime!(2024-01-02 03:04:05 UTC)).unwrap();

        assert_eq!(doc["meta"]["versionId"], "2");
        assert_eq!(doc["meta"]["lastUpdated"], "2024-01-02T03:04:05Z");
        assert_eq!(doc["meta"]["profile"][0], "http://example.org/p");
    }

    #[test]
    fn test_stamp_meta_creates_meta() {
        let mut doc = json!({"resourceType": "Basic", "meta": "garbage"});
        stamp_meta(&mut doc, 1, datetime!(2024-01-01 00:00:00 UTC)).unwrap();
        assert_eq!(doc["meta"]["versionId"], "1");
    }

    #[test]
    fn test_stamp_meta_rejects_non_object() {
        let mut doc = json!([1, 2]);
        let err = stamp_meta(&mut doc, 1, datetime!(2024-01-01 00:00:00 UTC)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidResource { .. }));
    }
}

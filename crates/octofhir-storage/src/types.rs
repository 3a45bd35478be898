//! Storage types for the version tracking layer.
//!
//! This module defines all data types used by the storage traits.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Identity of a tracked resource: its type plus logical id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceKey {
    /// The resource type (e.g., "Measure", "Patient").
    pub resource_type: String,
    /// The logical resource id.
    pub resource_id: String,
}

impl ResourceKey {
    /// Creates a new `ResourceKey`.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.resource_id)
    }
}

/// The mutation a version record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionAction {
    Create,
    Update,
    Delete,
}

impl VersionAction {
    /// Returns the string representation stored by backends.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Parses a stored action name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for VersionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable entry in a resource's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    /// The resource type.
    pub resource_type: String,
    /// The logical resource id.
    pub resource_id: String,
    /// 1-based, strictly increasing per key.
    pub version_id: u64,
    /// When this version was written.
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    /// The mutation this record captures.
    pub action: VersionAction,
    /// The document as of this version; `None` for tombstones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Value>,
}

impl VersionRecord {
    /// Creates a new `VersionRecord`.
    #[must_use]
    pub fn new(
        key: &ResourceKey,
        version_id: u64,
        action: VersionAction,
        last_updated: OffsetDateTime,
        snapshot: Option<Value>,
    ) -> Self {
        Self {
            resource_type: key.resource_type.clone(),
            resource_id: key.resource_id.clone(),
            version_id,
            last_updated,
            action,
            snapshot,
        }
    }

    /// Returns the key this record belongs to.
    #[must_use]
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.resource_type, &self.resource_id)
    }

    /// Returns `true` for a delete record.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.action == VersionAction::Delete
    }
}

/// Lifecycle state of a resource key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionState {
    /// No record has ever been written.
    Absent,
    /// The latest record is a create or update with this version.
    Active(u64),
    /// The latest record is a tombstone with this version.
    Deleted(u64),
}

impl VersionState {
    /// Derives the state from the most recent record of a key.
    #[must_use]
    pub fn from_latest(latest: Option<&VersionRecord>) -> Self {
        match latest {
            None => Self::Absent,
            Some(r) if r.is_tombstone() => Self::Deleted(r.version_id),
            Some(r) => Self::Active(r.version_id),
        }
    }

    /// The current version number, if any record exists.
    #[must_use]
    pub fn current_version(self) -> Option<u64> {
        match self {
            Self::Absent => None,
            Self::Active(v) | Self::Deleted(v) => Some(v),
        }
    }

    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active(_))
    }
}

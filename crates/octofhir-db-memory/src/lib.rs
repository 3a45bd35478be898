//! In-memory history backend for the OctoFHIR version tracker.
//!
//! This crate provides an in-memory implementation of the `VersionStore`
//! trait from `octofhir-storage`, using a sharded `DashMap` for concurrent
//! access.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use octofhir_db_memory::InMemoryVersionStore;
//! use octofhir_storage::VersionTracker;
//!
//! let tracker = VersionTracker::new(Arc::new(InMemoryVersionStore::new()));
//! let created = tracker.record_create("Measure", "m1", measure).await?;
//! ```

pub mod storage;

// Re-export the VersionStore trait for convenience
pub use octofhir_storage::{StorageError, VersionRecord, VersionStore};

pub use storage::{InMemoryVersionStore, StorageOptions};

/// Type alias for a shareable store instance.
pub type DynVersionStore = std::sync::Arc<dyn VersionStore>;

/// Creates a new in-memory store behind the trait object.
pub fn create_version_store() -> DynVersionStore {
    std::sync::Arc::new(InMemoryVersionStore::new())
}

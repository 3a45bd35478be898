//! # octofhir-storage
//!
//! Version tracking layer for the OctoFHIR persistence core.
//!
//! This crate defines the [`VersionStore`] trait that history backends
//! implement and the [`VersionTracker`] that enforces optimistic concurrency
//! on top of it. Backends live in separate crates.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use octofhir_storage::VersionTracker;
//!
//! let tracker = VersionTracker::new(Arc::new(store));
//! let v1 = tracker.record_create("Measure", "m1", resource.clone()).await?;
//! let v2 = tracker.record_update("Measure", "m1", v1.version_id, patched).await?;
//! ```

mod error;
mod tracker;
mod traits;
mod types;

// Re-export everything from submodules
pub use error::{ErrorCategory, StorageError};
pub use tracker::VersionTracker;
pub use traits::VersionStore;
pub use types::{ResourceKey, VersionAction, VersionRecord, VersionState};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared store trait object.
pub type DynVersionStore = std::sync::Arc<dyn VersionStore>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use octofhir_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::tracker::VersionTracker;
    pub use crate::traits::VersionStore;
    pub use crate::types::{ResourceKey, VersionAction, VersionRecord, VersionState};
    pub use crate::{DynVersionStore, StorageResult};
}

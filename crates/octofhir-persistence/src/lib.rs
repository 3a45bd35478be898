//! Configured entry point to the OctoFHIR persistence core.
//!
//! Loads [`PersistenceConfig`] from `octofhir.toml` and `OCTOFHIR__*`
//! environment variables, builds the selected version store and exposes the
//! resource lifecycle through [`Persistence`].
//!
//! # Example
//!
//! ```ignore
//! use octofhir_persistence::{Persistence, loader, observability};
//!
//! let config = loader::load_config(None)?;
//! observability::init_tracing_from_config(&config.logging);
//! let persistence = Persistence::from_config(config).await?;
//! let created = persistence.create(measure).await?;
//! ```

pub mod config;
pub mod error;
pub mod factory;
pub mod observability;
pub mod service;

pub use config::{
    LoggingConfig, PersistenceConfig, PostgresStorageConfig, SearchSettings, StorageBackend,
    StorageConfig, loader,
};
pub use error::{PersistenceError, Result};
pub use factory::{Backend, create_backend};
pub use service::Persistence;

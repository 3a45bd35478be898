//! SQL query modules for the PostgreSQL storage backend.
//!
//! Organized by operation type: version history writes and reads, and search
//! execution.

pub mod history;
pub mod search;

pub use search::{SearchPage, execute_search};

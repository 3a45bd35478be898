pub mod document;
pub mod error;
pub mod id;
pub mod time;

pub use document::{meta_version, resource_id, resource_type, stamp_meta};
pub use error::{CoreError, Result};
pub use id::{IdError, generate_id, validate_id};
pub use time::{format_instant, now_utc};

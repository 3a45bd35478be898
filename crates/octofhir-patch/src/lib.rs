//! Document patch engine.
//!
//! Applies RFC 6902 JSON Patch operation lists and RFC 7396 JSON Merge Patch
//! documents to generic resource documents. Patches are all-or-nothing: a
//! failure leaves the input untouched.

pub mod apply;
pub mod error;
pub mod merge;
pub mod operation;
pub mod payload;
pub mod pointer;

pub use apply::{apply_patch, apply_patch_in_place, values_equal};
pub use error::{PatchError, PatchResult};
pub use merge::{apply_merge_patch, apply_merge_patch_in_place};
pub use operation::{Patch, PatchOperation};
pub use payload::{PROTECTED_FIELDS, PatchKind, apply_patch_payload};
pub use pointer::{JsonPointer, resolve};

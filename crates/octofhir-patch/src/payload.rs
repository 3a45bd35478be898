//! Raw patch request bodies.
//!
//! Turns a body plus its declared content type into a patched document,
//! refusing edits to the elements the server owns.

use serde_json::Value;

use crate::apply::apply_patch;
use crate::error::{PatchError, PatchResult};
use crate::merge::apply_merge_patch;
use crate::operation::{Patch, PatchOperation};
use crate::pointer::JsonPointer;

/// Top-level resource elements a patch may never change.
pub const PROTECTED_FIELDS: [&str; 2] = ["resourceType", "id"];

pub const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";
pub const MERGE_PATCH_CONTENT_TYPE: &str = "application/merge-patch+json";

/// The patch formats accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchKind {
    /// RFC 6902 operation list.
    JsonPatch,
    /// RFC 7396 partial document.
    MergePatch,
}

impl PatchKind {
    /// Maps a `Content-Type` header value to a patch kind.
    ///
    /// Media type parameters such as `charset` are ignored.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match media_type.as_str() {
            JSON_PATCH_CONTENT_TYPE => Some(Self::JsonPatch),
            MERGE_PATCH_CONTENT_TYPE => Some(Self::MergePatch),
            _ => None,
        }
    }

    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::JsonPatch => JSON_PATCH_CONTENT_TYPE,
            Self::MergePatch => MERGE_PATCH_CONTENT_TYPE,
        }
    }
}

/// Parses `body` as a patch of the given kind and applies it to `document`.
pub fn apply_patch_payload(document: &Value, kind: PatchKind, body: &[u8]) -> PatchResult<Value> {
    let patched = match kind {
        PatchKind::JsonPatch => {
            let patch = Patch::from_slice(body)?;
            check_operations(&patch)?;
            apply_patch(document, &patch)?
        }
        PatchKind::MergePatch => {
            let merge: Value = serde_json::from_slice(body).map_err(|e| {
                PatchError::InvalidDocument(format!("Invalid merge patch document: {e}"))
            })?;
            if !merge.is_object() {
                return Err(PatchError::InvalidDocument(
                    "Merge patch must be a JSON object".to_string(),
                ));
            }
            apply_merge_patch(document, &merge)
        }
    };

    ensure_protected_unchanged(document, &patched)?;
    Ok(patched)
}

fn protected_field(pointer: &JsonPointer) -> Option<&'static str> {
    let first = pointer.tokens().first()?;
    PROTECTED_FIELDS.into_iter().find(|field| first == field)
}

fn protected_error(field: &str) -> PatchError {
    PatchError::ProtectedPath {
        path: format!("/{field}"),
    }
}

// `test` and the source of `copy` only read, so they may reference
// protected elements.
fn check_operations(patch: &Patch) -> PatchResult<()> {
    for op in patch {
        let source = match op {
            PatchOperation::Move { from, .. } => Some(from),
            _ => None,
        };
        let targets = op.is_mutating().then(|| op.path());
        for pointer in targets.into_iter().chain(source) {
            if let Some(field) = protected_field(pointer) {
                return Err(protected_error(field));
            }
        }
    }
    Ok(())
}

// Catches whole-document replacement through the root pointer or a merge.
fn ensure_protected_unchanged(original: &Value, patched: &Value) -> PatchResult<()> {
    for field in PROTECTED_FIELDS {
        if original.get(field) != patched.get(field) {
            return Err(protected_error(field));
        }
    }
    Ok(())
}

//! RFC 7396 JSON Merge Patch.

use serde_json::Value;
use tracing::debug;

/// Merges `patch` into a copy of `document`.
///
/// `null` members delete keys, objects merge recursively and every other
/// value (arrays included) replaces wholesale. A non-object patch replaces
/// the whole document.
#[must_use]
pub fn apply_merge_patch(document: &Value, patch: &Value) -> Value {
    let mut merged = document.clone();
    apply_merge_patch_in_place(&mut merged, patch);
    merged
}

/// In-place variant of [`apply_merge_patch`].
pub fn apply_merge_patch_in_place(document: &mut Value, patch: &Value) {
    json_patch::merge(document, patch);
    debug!(
        keys = patch.as_object().map_or(0, |m| m.len()),
        "merge patch applied"
    );
}

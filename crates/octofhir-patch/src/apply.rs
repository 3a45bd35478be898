//! RFC 6902 patch application.
//!
//! Operations run against a working copy; the caller's document is only
//! replaced once every operation has succeeded.

use serde_json::{Number, Value};
use tracing::{debug, trace};

use crate::error::{PatchError, PatchResult};
use crate::operation::{Patch, PatchOperation};
use crate::pointer::{ArrayToken, JsonPointer, parse_array_token, resolve, resolve_tokens_mut};

/// Applies `patch` to a copy of `document` and returns the result.
///
/// The first failing operation aborts the whole patch.
pub fn apply_patch(document: &Value, patch: &Patch) -> PatchResult<Value> {
    let mut working = document.clone();
    apply_all(&mut working, patch)?;
    Ok(working)
}

/// Applies `patch` to `document`, leaving it untouched on failure.
pub fn apply_patch_in_place(document: &mut Value, patch: &Patch) -> PatchResult<()> {
    let mut working = document.clone();
    apply_all(&mut working, patch)?;
    *document = working;
    Ok(())
}

fn apply_all(document: &mut Value, patch: &Patch) -> PatchResult<()> {
    for (index, op) in patch.iter().enumerate() {
        trace!(index, op = op.name(), path = %op.path(), "applying patch operation");
        apply_operation(document, index, op)?;
    }
    debug!(operations = patch.len(), "patch applied");
    Ok(())
}

fn apply_operation(document: &mut Value, index: usize, op: &PatchOperation) -> PatchResult<()> {
    match op {
        PatchOperation::Add { path, value } => add(document, path, value.clone()),
        PatchOperation::Remove { path } => remove(document, path).map(|_| ()),
        PatchOperation::Replace { path, value } => replace(document, path, value.clone()),
        PatchOperation::Move { from, path } => move_value(document, index, from, path),
        PatchOperation::Copy { from, path } => {
            let value = resolve(document, from)?.clone();
            add(document, path, value)
        }
        PatchOperation::Test { path, value } => test(document, path, value),
    }
}

fn add(document: &mut Value, path: &JsonPointer, value: Value) -> PatchResult<()> {
    let Some((parent_tokens, last)) = path.split_last() else {
        *document = value;
        return Ok(());
    };

    match resolve_tokens_mut(document, parent_tokens, path)? {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        Value::Array(items) => match parse_array_token(last) {
            Some(ArrayToken::Append) => {
                items.push(value);
                Ok(())
            }
            Some(ArrayToken::Index(i)) if i <= items.len() => {
                items.insert(i, value);
                Ok(())
            }
            Some(ArrayToken::Index(_)) => Err(PatchError::path_not_found(path)),
            None => Err(PatchError::type_mismatch(
                path,
                format!("'{last}' is not a valid array index"),
            )),
        },
        _ => Err(PatchError::type_mismatch(
            path,
            "parent of the target is neither an object nor an array",
        )),
    }
}

fn remove(document: &mut Value, path: &JsonPointer) -> PatchResult<Value> {
    let Some((parent_tokens, last)) = path.split_last() else {
        return Err(PatchError::path_not_found(path));
    };

    match resolve_tokens_mut(document, parent_tokens, path)? {
        Value::Object(map) => map
            .remove(last)
            .ok_or_else(|| PatchError::path_not_found(path)),
        Value::Array(items) => match parse_array_token(last) {
            Some(ArrayToken::Index(i)) if i < items.len() => Ok(items.remove(i)),
            Some(_) => Err(PatchError::path_not_found(path)),
            None => Err(PatchError::type_mismatch(
                path,
                format!("'{last}' is not a valid array index"),
            )),
        },
        _ => Err(PatchError::type_mismatch(
            path,
            "parent of the target is neither an object nor an array",
        )),
    }
}

fn replace(document: &mut Value, path: &JsonPointer, value: Value) -> PatchResult<()> {
    let target = resolve_tokens_mut(document, path.tokens(), path)?;
    *target = value;
    Ok(())
}

fn move_value(
    document: &mut Value,
    index: usize,
    from: &JsonPointer,
    path: &JsonPointer,
) -> PatchResult<()> {
    if from.tokens() == path.tokens() {
        resolve(document, from)?;
        return Ok(());
    }
    if from.is_ancestor_of(path) {
        return Err(PatchError::invalid_operation(
            index,
            format!("cannot move '{from}' into its own child '{path}'"),
        ));
    }
    let value = remove(document, from)?;
    add(document, path, value)
}

fn test(document: &Value, path: &JsonPointer, expected: &Value) -> PatchResult<()> {
    match resolve(document, path) {
        Ok(actual) if values_equal(actual, expected) => Ok(()),
        Ok(_) => Err(PatchError::test_failed(path)),
        Err(e) if e.is_path_not_found() => Err(PatchError::test_failed(path)),
        Err(e) => Err(e),
    }
}

/// Deep equality where numbers compare by value, so `1` equals `1.0`.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, xv)| ym.get(k).is_some_and(|yv| values_equal(xv, yv)))
        }
        _ => a == b,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

//! Patch operation model and parsing.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{PatchError, PatchResult};
use crate::pointer::JsonPointer;

/// A single RFC 6902 operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: JsonPointer, value: Value },
    Remove { path: JsonPointer },
    Replace { path: JsonPointer, value: Value },
    Move { from: JsonPointer, path: JsonPointer },
    Copy { from: JsonPointer, path: JsonPointer },
    Test { path: JsonPointer, value: Value },
}

impl PatchOperation {
    /// Parses one operation object. `index` is its position in the patch and
    /// is carried into any error.
    pub fn from_value(index: usize, value: &Value) -> PatchResult<Self> {
        let Value::Object(obj) = value else {
            return Err(PatchError::invalid_operation(
                index,
                "operation must be a JSON object",
            ));
        };

        let op = obj
            .get("op")
            .ok_or_else(|| PatchError::invalid_operation(index, "missing 'op'"))?
            .as_str()
            .ok_or_else(|| PatchError::invalid_operation(index, "'op' must be a string"))?;

        match op {
            "add" => Ok(Self::Add {
                path: pointer_member(index, obj, "path")?,
                value: value_member(index, obj)?,
            }),
            "remove" => Ok(Self::Remove {
                path: pointer_member(index, obj, "path")?,
            }),
            "replace" => Ok(Self::Replace {
                path: pointer_member(index, obj, "path")?,
                value: value_member(index, obj)?,
            }),
            "move" => Ok(Self::Move {
                from: pointer_member(index, obj, "from")?,
                path: pointer_member(index, obj, "path")?,
            }),
            "copy" => Ok(Self::Copy {
                from: pointer_member(index, obj, "from")?,
                path: pointer_member(index, obj, "path")?,
            }),
            "test" => Ok(Self::Test {
                path: pointer_member(index, obj, "path")?,
                value: value_member(index, obj)?,
            }),
            other => Err(PatchError::UnsupportedOp {
                op: other.to_string(),
            }),
        }
    }

    /// Returns the operation name as it appears on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::Move { .. } => "move",
            Self::Copy { .. } => "copy",
            Self::Test { .. } => "test",
        }
    }

    /// Returns the target pointer.
    #[must_use]
    pub fn path(&self) -> &JsonPointer {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Move { path, .. }
            | Self::Copy { path, .. }
            | Self::Test { path, .. } => path,
        }
    }

    /// Returns the source pointer for `move` and `copy`.
    #[must_use]
    pub fn from(&self) -> Option<&JsonPointer> {
        match self {
            Self::Move { from, .. } | Self::Copy { from, .. } => Some(from),
            _ => None,
        }
    }

    /// Returns `true` if the operation can change the document.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Test { .. })
    }
}

fn pointer_member(index: usize, obj: &Map<String, Value>, key: &str) -> PatchResult<JsonPointer> {
    let raw = obj
        .get(key)
        .ok_or_else(|| PatchError::invalid_operation(index, format!("missing '{key}'")))?
        .as_str()
        .ok_or_else(|| PatchError::invalid_operation(index, format!("'{key}' must be a string")))?;
    JsonPointer::parse(raw)
}

// An explicit `null` is a legal value; only absence is an error.
fn value_member(index: usize, obj: &Map<String, Value>) -> PatchResult<Value> {
    obj.get("value")
        .cloned()
        .ok_or_else(|| PatchError::invalid_operation(index, "missing 'value'"))
}

/// An ordered list of operations applied as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Patch(pub Vec<PatchOperation>);

impl Patch {
    /// Parses a patch from an already-decoded JSON value.
    pub fn from_value(value: &Value) -> PatchResult<Self> {
        let Value::Array(items) = value else {
            return Err(PatchError::InvalidDocument(
                "JSON Patch must be an array of operations".to_string(),
            ));
        };

        items
            .iter()
            .enumerate()
            .map(|(index, item)| PatchOperation::from_value(index, item))
            .collect::<PatchResult<Vec<_>>>()
            .map(Self)
    }

    /// Parses a patch from raw request bytes.
    pub fn from_slice(bytes: &[u8]) -> PatchResult<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| PatchError::InvalidDocument(format!("Invalid JSON Patch document: {e}")))?;
        Self::from_value(&value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatchOperation> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<PatchOperation>> for Patch {
    fn from(ops: Vec<PatchOperation>) -> Self {
        Self(ops)
    }
}

impl<'a> IntoIterator for &'a Patch {
    type Item = &'a PatchOperation;
    type IntoIter = std::slice::Iter<'a, PatchOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

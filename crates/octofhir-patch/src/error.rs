//! Error types for the document patch engine.

use crate::pointer::JsonPointer;

/// Errors that can occur while parsing or applying a patch.
///
/// Every variant is terminal: the patch that produced it has been rejected as
/// a whole and the input document is unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatchError {
    /// The pointer (or one of its intermediate segments) does not exist.
    #[error("Path not found: {path}")]
    PathNotFound {
        /// The pointer that failed to resolve.
        path: String,
    },

    /// A pointer hop met a value of the wrong structural type.
    #[error("Type mismatch at {path}: {reason}")]
    TypeMismatch {
        /// The pointer being resolved.
        path: String,
        /// What was expected at the failing hop.
        reason: String,
    },

    /// A `test` operation did not match the current value.
    #[error("Test failed at {path}")]
    TestFailed {
        /// The pointer that was tested.
        path: String,
    },

    /// The `op` member named an operation outside the six RFC 6902 kinds.
    #[error("Unsupported patch operation: {op}")]
    UnsupportedOp {
        /// The unrecognised operation name.
        op: String,
    },

    /// The pointer text is not a valid RFC 6901 JSON Pointer.
    #[error("Malformed JSON pointer '{pointer}': {reason}")]
    MalformedPointer {
        /// The raw pointer text.
        pointer: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An operation object is structurally invalid.
    #[error("Invalid patch operation at index {index}: {reason}")]
    InvalidOperation {
        /// Position of the operation within the patch.
        index: usize,
        /// Why it was rejected.
        reason: String,
    },

    /// The patch payload could not be parsed.
    #[error("Invalid patch document: {0}")]
    InvalidDocument(String),

    /// The patch tried to change an element the server owns.
    #[error("Cannot modify protected element {path}")]
    ProtectedPath {
        /// The protected pointer.
        path: String,
    },
}

impl PatchError {
    /// Creates a new `PathNotFound` error.
    #[must_use]
    pub fn path_not_found(path: &JsonPointer) -> Self {
        Self::PathNotFound {
            path: path.to_string(),
        }
    }

    /// Creates a new `TypeMismatch` error.
    #[must_use]
    pub fn type_mismatch(path: &JsonPointer, reason: impl Into<String>) -> Self {
        Self::TypeMismatch {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a new `TestFailed` error.
    #[must_use]
    pub fn test_failed(path: &JsonPointer) -> Self {
        Self::TestFailed {
            path: path.to_string(),
        }
    }

    /// Creates a new `MalformedPointer` error.
    #[must_use]
    pub fn malformed_pointer(pointer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPointer {
            pointer: pointer.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidOperation` error.
    #[must_use]
    pub fn invalid_operation(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            index,
            reason: reason.into(),
        }
    }

    /// Returns `true` if the failure was a `test` mismatch.
    #[must_use]
    pub fn is_test_failed(&self) -> bool {
        matches!(self, Self::TestFailed { .. })
    }

    /// Returns `true` if the failure was an unresolved pointer.
    #[must_use]
    pub fn is_path_not_found(&self) -> bool {
        matches!(self, Self::PathNotFound { .. })
    }
}

/// Result alias for patch operations.
pub type PatchResult<T> = Result<T, PatchError>;

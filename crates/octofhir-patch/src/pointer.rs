//! RFC 6901 JSON Pointer parsing and resolution.
//!
//! Resolution is explicit about structure: object hops look up keys, array
//! hops require a canonical index, and anything else is a `TypeMismatch`.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{PatchError, PatchResult};

/// A parsed JSON Pointer.
///
/// The raw text is retained so errors and serialization reproduce exactly
/// what the caller sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsonPointer {
    raw: String,
    tokens: Vec<String>,
}

/// A reference token interpreted against an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArrayToken {
    /// A concrete element index.
    Index(usize),
    /// The `-` token: one past the last element.
    Append,
}

impl JsonPointer {
    /// The empty pointer, referring to the whole document.
    #[must_use]
    pub fn root() -> Self {
        Self {
            raw: String::new(),
            tokens: Vec::new(),
        }
    }

    /// Parses pointer text, unescaping `~1` to `/` and `~0` to `~`.
    pub fn parse(raw: &str) -> PatchResult<Self> {
        if raw.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(PatchError::malformed_pointer(raw, "must start with '/'"));
        };

        let tokens = rest
            .split('/')
            .map(|token| unescape_token(raw, token))
            .collect::<PatchResult<Vec<_>>>()?;

        Ok(Self {
            raw: raw.to_string(),
            tokens,
        })
    }

    /// Returns the unescaped reference tokens.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Returns the pointer text as supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `true` for the empty pointer.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Splits into the parent tokens and the final token.
    #[must_use]
    pub fn split_last(&self) -> Option<(&[String], &str)> {
        self.tokens
            .split_last()
            .map(|(last, parent)| (parent, last.as_str()))
    }

    /// Returns `true` if `other` lies strictly below this pointer.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &JsonPointer) -> bool {
        self.tokens.len() < other.tokens.len() && other.tokens.starts_with(&self.tokens)
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for JsonPointer {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for JsonPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

fn unescape_token(raw: &str, token: &str) -> PatchResult<String> {
    if !token.contains('~') {
        return Ok(token.to_string());
    }

    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(PatchError::malformed_pointer(
                    raw,
                    "'~' must be followed by '0' or '1'",
                ));
            }
        }
    }
    Ok(out)
}

/// Interprets a token as an array position.
///
/// Returns `None` for tokens that are not canonical non-negative integers
/// (leading zeros are rejected) or `-`.
pub(crate) fn parse_array_token(token: &str) -> Option<ArrayToken> {
    if token == "-" {
        return Some(ArrayToken::Append);
    }
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    token.parse().ok().map(ArrayToken::Index)
}

/// Resolves a token to an existing element index of an array of `len`.
fn existing_index(token: &str, len: usize, pointer: &JsonPointer) -> PatchResult<usize> {
    match parse_array_token(token) {
        Some(ArrayToken::Index(i)) if i < len => Ok(i),
        Some(_) => Err(PatchError::path_not_found(pointer)),
        None => Err(PatchError::type_mismatch(
            pointer,
            format!("'{token}' is not a valid array index"),
        )),
    }
}

fn traversal_mismatch(pointer: &JsonPointer, token: &str) -> PatchError {
    PatchError::type_mismatch(
        pointer,
        format!("cannot traverse into a scalar value with token '{token}'"),
    )
}

/// Resolves `tokens` (a prefix of `pointer`) against `document`.
pub(crate) fn resolve_tokens<'a>(
    document: &'a Value,
    tokens: &[String],
    pointer: &JsonPointer,
) -> PatchResult<&'a Value> {
    let mut current = document;
    for token in tokens {
        current = match current {
            Value::Object(map) => map
                .get(token.as_str())
                .ok_or_else(|| PatchError::path_not_found(pointer))?,
            Value::Array(items) => &items[existing_index(token, items.len(), pointer)?],
            _ => return Err(traversal_mismatch(pointer, token)),
        };
    }
    Ok(current)
}

/// Mutable counterpart of [`resolve_tokens`].
pub(crate) fn resolve_tokens_mut<'a>(
    document: &'a mut Value,
    tokens: &[String],
    pointer: &JsonPointer,
) -> PatchResult<&'a mut Value> {
    let mut current = document;
    for token in tokens {
        current = match current {
            Value::Object(map) => map
                .get_mut(token.as_str())
                .ok_or_else(|| PatchError::path_not_found(pointer))?,
            Value::Array(items) => {
                let index = existing_index(token, items.len(), pointer)?;
                &mut items[index]
            }
            _ => return Err(traversal_mismatch(pointer, token)),
        };
    }
    Ok(current)
}

/// Resolves the full pointer against `document`.
pub fn resolve<'a>(document: &'a Value, pointer: &JsonPointer) -> PatchResult<&'a Value> {
    resolve_tokens(document, pointer.tokens(), pointer)
}

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Maximum length of a FHIR logical id.
pub const MAX_ID_LENGTH: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("ID must not be empty")]
    Empty,

    #[error("ID exceeds {MAX_ID_LENGTH} characters: {0}")]
    TooLong(usize),

    #[error("ID contains characters outside [A-Za-z0-9-.]: {0}")]
    InvalidCharacters(String),
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9\-.]+$").expect("static id pattern"))
}

/// Generates a new random resource id.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Validates a logical id against the FHIR `id` grammar.
pub fn validate_id(id: &str) -> Result<(), IdError> {
    if id.is_empty() {
        return Err(IdError::Empty);
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(IdError::TooLong(id.len()));
    }
    if !id_pattern().is_match(id) {
        return Err(IdError::InvalidCharacters(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_valid() {
        let id = generate_id();
        assert!(validate_id(&id).is_ok());
        assert_ne!(id, generate_id());
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("example").is_ok());
        assert!(validate_id("pat-1.v2").is_ok());
        assert_eq!(validate_id(""), Err(IdError::Empty));
        assert_eq!(validate_id(&"a".repeat(65)), Err(IdError::TooLong(65)));
        assert!(matches!(
            validate_id("a/b"),
            Err(IdError::InvalidCharacters(_))
        ));
        assert!(matches!(
            validate_id("a b"),
            Err(IdError::InvalidCharacters(_))
        ));
    }
}

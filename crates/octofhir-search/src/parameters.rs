use serde::{Deserialize, Serialize};

use crate::sql_builder::{SqlBuilderError, validate_identifier};

/// Search parameter semantic types supported by the query builder.
/// See: https://hl7.org/fhir/R4B/search.html#table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParameterType {
    String,
    Token,
    Reference,
    Uri,
}

impl SearchParameterType {
    /// Parse a search parameter type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "token" => Some(Self::Token),
            "reference" => Some(Self::Reference),
            "uri" => Some(Self::Uri),
            _ => None,
        }
    }

    /// Whether values of this type match exactly rather than by substring.
    #[must_use]
    pub fn is_exact(self) -> bool {
        !matches!(self, Self::String)
    }
}

/// Maps a search parameter name to the column it filters.
///
/// The column is validated on construction (and on deserialization), so a
/// definition always names a safe identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDefinition")]
pub struct SearchParameterDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SearchParameterType,
    pub column: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Deserialize)]
struct RawDefinition {
    name: String,
    #[serde(rename = "type")]
    kind: SearchParameterType,
    column: String,
    #[serde(default)]
    description: Option<String>,
}

impl TryFrom<RawDefinition> for SearchParameterDefinition {
    type Error = SqlBuilderError;

    fn try_from(raw: RawDefinition) -> Result<Self, Self::Error> {
        let def = Self::new(raw.name, raw.kind, raw.column)?;
        Ok(match raw.description {
            Some(desc) => def.with_description(desc),
            None => def,
        })
    }
}

impl SearchParameterDefinition {
    pub fn new(
        name: impl Into<String>,
        kind: SearchParameterType,
        column: impl Into<String>,
    ) -> Result<Self, SqlBuilderError> {
        let column = column.into();
        validate_identifier(&column)?;
        Ok(Self {
            name: name.into(),
            kind,
            column,
            description: None,
        })
    }

    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Ordered container for the definitions of one table.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParameters {
    pub params: Vec<SearchParameterDefinition>,
}

impl SearchParameters {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    pub fn with_param(mut self, def: SearchParameterDefinition) -> Self {
        self.params.push(def);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SearchParameterDefinition> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn as_slice(&self) -> &[SearchParameterDefinition] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_type() {
        assert_eq!(SearchParameterType::parse("token"), Some(SearchParameterType::Token));
        assert_eq!(SearchParameterType::parse("uri"), Some(SearchParameterType::Uri));
        assert_eq!(SearchParameterType::parse("date"), None);
        assert!(!SearchParameterType::String.is_exact());
        assert!(SearchParameterType::Reference.is_exact());
    }

    #[test]
    fn test_definition_validates_column() {
        let def = SearchParameterDefinition::new("name", SearchParameterType::String, "name")
            .unwrap()
            .with_description("Name of the measure");
        assert_eq!(def.column, "name");
        assert_eq!(def.description.as_deref(), Some("Name of the measure"));

        assert_eq!(
            SearchParameterDefinition::new("x", SearchParameterType::Token, "a; DROP"),
            Err(SqlBuilderError::InvalidIdentifier("a; DROP".to_string()))
        );
    }

    #[test]
    fn test_deserialize_definitions() {
        let params: SearchParameters = serde_json::from_value(json!({
            "params": [
                {"name": "status", "type": "token", "column": "status"},
                {"name": "title", "type": "string", "column": "title", "description": "Title"}
            ]
        }))
        .unwrap();
        assert_eq!(params.as_slice().len(), 2);
        assert_eq!(params.get("title").unwrap().kind, SearchParameterType::String);
        assert!(params.get("missing").is_none());

        let bad = serde_json::from_value::<SearchParameterDefinition>(json!({
            "name": "status", "type": "token", "column": "status\"; --"
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_builder_container() {
        let params = SearchParameters::new().with_param(
            SearchParameterDefinition::new("url", SearchParameterType::Uri, "url").unwrap(),
        );
        assert_eq!(params.params.len(), 1);
    }
}

//! SQL builder for declarative search queries.
//!
//! A [`SearchQuery`] is scoped to one table and a fixed projection. Search
//! parameters are turned into predicates on declared columns, and the query
//! renders a count statement and a paged data statement, both with `$n`
//! placeholders. Values are always bound, never interpolated.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::parameters::{SearchParameterDefinition, SearchParameterType};

/// Errors that can occur during SQL building.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlBuilderError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// Validate an identifier (table name, column name).
///
/// Only allows ASCII letters, digits and underscores.
pub fn validate_identifier(name: &str) -> Result<(), SqlBuilderError> {
    if name.is_empty() {
        return Err(SqlBuilderError::InvalidIdentifier(
            "Empty identifier".to_string(),
        ));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SqlBuilderError::InvalidIdentifier(name.to_string()));
    }

    Ok(())
}

/// Escape a PostgreSQL identifier (table name, column name).
pub fn escape_identifier(name: &str) -> Result<String, SqlBuilderError> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

/// Escape LIKE metacharacters so the value matches literally.
pub fn escape_like_pattern(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Comparison operators for search predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equal (=)
    Eq,
    /// Case-insensitive LIKE
    ILike,
}

impl Operator {
    /// Get the SQL operator string.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::ILike => "ILIKE",
        }
    }
}

/// SQL value types for parameterized queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
}

impl SqlValue {
    /// Get the value as a string for display/debugging.
    pub fn as_display_str(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
        }
    }
}

/// Sort order for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A single `column op value` predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub column: String,
    pub op: Operator,
    pub value: SqlValue,
}

/// A built SQL statement with its ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl fmt::Display for BuiltQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

/// Declarative search over a single table.
///
/// # Example
///
/// ```ignore
/// let defs = [SearchParameterDefinition::new("name", SearchParameterType::String, "name")?];
/// let query = SearchQuery::new("measure", &["id", "name", "status"])?
///     .apply_params(&raw_params, &defs);
/// let count = query.count_query();
/// let page = query.data_query(20, 0);
/// ```
#[derive(Debug, Clone)]
pub struct SearchQuery {
    table: String,
    columns: Vec<String>,
    predicates: Vec<Predicate>,
    order: (String, SortOrder),
}

impl SearchQuery {
    /// Create a query projecting `columns` from `table`.
    ///
    /// Every name must be a valid identifier and at least one column is
    /// required; the first column is the default sort key.
    pub fn new<S: AsRef<str>>(table: &str, columns: &[S]) -> Result<Self, SqlBuilderError> {
        validate_identifier(table)?;
        let columns = columns
            .iter()
            .map(|c| {
                let c = c.as_ref();
                validate_identifier(c).map(|()| c.to_string())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let Some(first) = columns.first().cloned() else {
            return Err(SqlBuilderError::InvalidIdentifier(
                "Empty column list".to_string(),
            ));
        };

        Ok(Self {
            table: table.to_string(),
            columns,
            predicates: Vec::new(),
            order: (first, SortOrder::Asc),
        })
    }

    /// Override the ordering clause.
    pub fn order_by(mut self, column: &str, order: SortOrder) -> Result<Self, SqlBuilderError> {
        validate_identifier(column)?;
        self.order = (column.to_string(), order);
        Ok(self)
    }

    /// Add predicates for every definition that has a non-empty raw value.
    ///
    /// Predicates follow the order of `definitions`; parameters without a
    /// definition are ignored.
    pub fn apply_params(
        mut self,
        raw: &HashMap<String, String>,
        definitions: &[SearchParameterDefinition],
    ) -> Self {
        for def in definitions {
            let Some(value) = raw.get(&def.name).filter(|v| !v.is_empty()) else {
                continue;
            };

            let predicate = match def.kind {
                SearchParameterType::String => Predicate {
                    column: def.column.clone(),
                    op: Operator::ILike,
                    value: SqlValue::Text(format!("%{}%", escape_like_pattern(value))),
                },
                SearchParameterType::Token
                | SearchParameterType::Reference
                | SearchParameterType::Uri => Predicate {
                    column: def.column.clone(),
                    op: Operator::Eq,
                    value: SqlValue::Text(value.clone()),
                },
            };
            self.predicates.push(predicate);
        }

        debug!(
            table = %self.table,
            predicates = self.predicates.len(),
            "search parameters applied"
        );
        self
    }

    /// The accumulated predicates, in application order.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn quoted_table(&self) -> String {
        format!("\"{}\"", self.table)
    }

    fn build_where_clause(&self) -> Option<String> {
        if self.predicates.is_empty() {
            return None;
        }
        let clause = self
            .predicates
            .iter()
            .enumerate()
            .map(|(i, p)| format!("\"{}\" {} ${}", p.column, p.op.as_sql(), i + 1))
            .collect::<Vec<_>>()
            .join(" AND ");
        Some(clause)
    }

    /// `SELECT COUNT(*)` over the filtered table.
    pub fn count_sql(&self) -> String {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.quoted_table());
        if let Some(where_sql) = self.build_where_clause() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        sql
    }

    /// Arguments for [`count_sql`](Self::count_sql).
    pub fn count_args(&self) -> Vec<SqlValue> {
        self.predicates.iter().map(|p| p.value.clone()).collect()
    }

    /// Paged `SELECT` of the projected columns.
    ///
    /// The last two placeholders are `LIMIT` and `OFFSET`.
    pub fn data_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {columns} FROM {}", self.quoted_table());
        if let Some(where_sql) = self.build_where_clause() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        let (order_column, order) = &self.order;
        let next = self.predicates.len() + 1;
        sql.push_str(&format!(
            " ORDER BY \"{order_column}\" {} LIMIT ${next} OFFSET ${}",
            order.as_sql(),
            next + 1
        ));
        sql
    }

    /// Arguments for [`data_sql`](Self::data_sql): predicate values, then
    /// `limit` and `offset`.
    pub fn data_args(&self, limit: i64, offset: i64) -> Vec<SqlValue> {
        let mut args = self.count_args();
        args.push(SqlValue::Integer(limit));
        args.push(SqlValue::Integer(offset));
        args
    }

    pub fn count_query(&self) -> BuiltQuery {
        BuiltQuery {
            sql: self.count_sql(),
            params: self.count_args(),
        }
    }

    pub fn data_query(&self, limit: i64, offset: i64) -> BuiltQuery {
        BuiltQuery {
            sql: self.data_sql(),
            params: self.data_args(limit, offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs() -> Vec<SearchParameterDefinition> {
        vec![
            SearchParameterDefinition::new("name", SearchParameterType::String, "name").unwrap(),
            SearchParameterDefinition::new("status", SearchParameterType::Token, "status").unwrap(),
            SearchParameterDefinition::new("url", SearchParameterType::Uri, "url").unwrap(),
            SearchParameterDefinition::new("subject", SearchParameterType::Reference, "subject_ref")
                .unwrap(),
        ]
    }

    fn raw(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn query() -> SearchQuery {
        SearchQuery::new("measure", &["id", "name", "status"]).unwrap()
    }

    #[test]
    fn test_escape_identifier_valid() {
        assert_eq!(escape_identifier("patient").unwrap(), "\"patient\"");
    }

    #[test]
    fn test_escape_identifier_invalid() {
        assert!(escape_identifier("patient; DROP").is_err());
        assert!(escape_identifier("").is_err());
        assert!(escape_identifier("na\"me").is_err());
    }

    #[test]
    fn test_escape_like_pattern() {
        assert_eq!(escape_like_pattern(r"50%_a\b"), r"50\%\_a\\b");
    }

    #[test]
    fn test_new_rejects_invalid_identifiers() {
        assert!(SearchQuery::new("measure; DROP TABLE x", &["id"]).is_err());
        assert!(SearchQuery::new("measure", &["id", "name--"]).is_err());
        assert!(SearchQuery::new::<&str>("measure", &[]).is_err());
    }

    #[test]
    fn test_no_params() {
        let q = query().apply_params(&HashMap::new(), &defs());
        assert_eq!(q.count_sql(), "SELECT COUNT(*) FROM \"measure\"");
        assert!(q.count_args().is_empty());
        assert_eq!(
            q.data_sql(),
            "SELECT \"id\", \"name\", \"status\" FROM \"measure\" ORDER BY \"id\" ASC LIMIT $1 OFFSET $2"
        );
        assert_eq!(
            q.data_args(10, 20),
            vec![SqlValue::Integer(10), SqlValue::Integer(20)]
        );
    }

    #[test]
    fn test_string_and_token_predicates() {
        let q = query().apply_params(&raw(&[("status", "active"), ("name", "Blood")]), &defs());

        assert_eq!(
            q.count_sql(),
            "SELECT COUNT(*) FROM \"measure\" WHERE \"name\" ILIKE $1 AND \"status\" = $2"
        );
        assert_eq!(
            q.count_args(),
            vec![
                SqlValue::Text("%Blood%".into()),
                SqlValue::Text("active".into())
            ]
        );
        assert_eq!(
            q.data_sql(),
            "SELECT \"id\", \"name\", \"status\" FROM \"measure\" WHERE \"name\" ILIKE $1 AND \"status\" = $2 ORDER BY \"id\" ASC LIMIT $3 OFFSET $4"
        );
        assert_eq!(q.data_args(5, 0).len(), 4);
    }

    #[test]
    fn test_reference_and_uri_are_exact() {
        let q = query().apply_params(
            &raw(&[("subject", "Patient/1"), ("url", "http://x/y")]),
            &defs(),
        );
        assert_eq!(
            q.count_sql(),
            "SELECT COUNT(*) FROM \"measure\" WHERE \"url\" = $1 AND \"subject_ref\" = $2"
        );
    }

    #[test]
    fn test_unknown_and_empty_params_ignored() {
        let q = query().apply_params(
            &raw(&[("bogus", "x"), ("status", ""), ("_count", "10")]),
            &defs(),
        );
        assert!(q.predicates().is_empty());
        assert_eq!(q.count_sql(), "SELECT COUNT(*) FROM \"measure\"");
    }

    #[test]
    fn test_order_independent_of_map_insertion() {
        let pairs = [
            ("subject", "Patient/1"),
            ("status", "active"),
            ("name", "a"),
            ("url", "u"),
        ];
        let forward = query().apply_params(&raw(&pairs), &defs());
        let mut reversed_pairs = pairs;
        reversed_pairs.reverse();
        let backward = query().apply_params(&raw(&reversed_pairs), &defs());

        assert_eq!(forward.data_query(10, 0), backward.data_query(10, 0));
        assert_eq!(forward.count_query(), backward.count_query());
    }

    #[test]
    fn test_hostile_values_are_bound() {
        let hostile = "x' OR '1'='1'; DROP TABLE measure; --";
        let q = query().apply_params(&raw(&[("status", hostile), ("name", hostile)]), &defs());

        assert!(!q.count_sql().contains("DROP"));
        assert!(!q.data_sql().contains("'1'"));
        assert_eq!(q.count_args()[1], SqlValue::Text(hostile.to_string()));
    }

    #[test]
    fn test_like_metacharacters_escaped() {
        let q = query().apply_params(&raw(&[("name", "100%_done")]), &defs());
        assert_eq!(
            q.count_args(),
            vec![SqlValue::Text("%100\\%\\_done%".into())]
        );
    }

    #[test]
    fn test_order_by_override() {
        let q = query()
            .order_by("name", SortOrder::Desc)
            .unwrap()
            .apply_params(&raw(&[("status", "draft")]), &defs());
        assert!(q.data_sql().ends_with("ORDER BY \"name\" DESC LIMIT $2 OFFSET $3"));

        assert!(query().order_by("name desc", SortOrder::Asc).is_err());
    }

    #[test]
    fn test_built_query_display() {
        let q = query();
        assert_eq!(q.count_query().to_string(), "SELECT COUNT(*) FROM \"measure\"");
        assert_eq!(q.table(), "measure");
        assert_eq!(q.columns(), ["id", "name", "status"]);
    }

    #[test]
    fn test_sql_value_display() {
        assert_eq!(SqlValue::Text("a".into()).as_display_str(), "a");
        assert_eq!(SqlValue::Integer(7).as_display_str(), "7");
        assert_eq!(Operator::ILike.as_sql(), "ILIKE");
    }
}

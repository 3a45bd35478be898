//! Search execution against PostgreSQL.
//!
//! Runs the count and page statements produced by [`SearchQuery`] with their
//! arguments bound in order. Driver errors are returned unchanged.

use serde::Serialize;
use serde_json::Value;
use sqlx_core::query_scalar::{QueryScalar, query_scalar};
use sqlx_postgres::{PgArguments, PgPool, Postgres};
use tracing::{debug, instrument};

use octofhir_search::{SearchQuery, SqlValue};

use crate::error::PostgresError;

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    /// Number of rows matching the predicates, ignoring paging.
    pub total: u64,
    /// Projected columns of each row, keyed by column name.
    pub rows: Vec<Value>,
}

/// Wraps the page statement so each row comes back as one JSON object.
fn page_sql(query: &SearchQuery) -> String {
    format!("SELECT to_jsonb(page) FROM ({}) AS page", query.data_sql())
}

/// Executes `query` and returns the total count plus the requested page.
#[instrument(skip(pool, query), fields(table = %query.table()))]
pub async fn execute_search(
    pool: &PgPool,
    query: &SearchQuery,
    limit: i64,
    offset: i64,
) -> Result<SearchPage, PostgresError> {
    let count_sql = query.count_sql();
    let count_args = query.count_args();
    let total: i64 = query_scalar(&count_sql)
        .bind_values(&count_args)
        .fetch_one(pool)
        .await?;

    let data_sql = page_sql(query);
    let data_args = query.data_args(limit, offset);
    let rows: Vec<Value> = query_scalar(&data_sql)
        .bind_values(&data_args)
        .fetch_all(pool)
        .await?;

    debug!(total, returned = rows.len(), "search executed");

    Ok(SearchPage {
        total: u64::try_from(total).unwrap_or_default(),
        rows,
    })
}

/// Binds [`SqlValue`] arguments in order.
trait BindSqlValues<'q> {
    fn bind_values(self, params: &'q [SqlValue]) -> Self;
}

impl<'q, O> BindSqlValues<'q> for QueryScalar<'q, Postgres, O, PgArguments> {
    fn bind_values(mut self, params: &'q [SqlValue]) -> Self {
        for param in params {
            self = match param {
                SqlValue::Text(s) => self.bind(s.as_str()),
                SqlValue::Integer(i) => self.bind(*i),
            };
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_search::{SearchParameterDefinition, SearchParameterType};
    use std::collections::HashMap;

    #[test]
    fn test_page_sql_wraps_data_statement() {
        let defs = vec![
            SearchParameterDefinition::new("status", SearchParameterType::Token, "status")
                .unwrap(),
        ];
        let mut raw = HashMap::new();
        raw.insert("status".to_string(), "active".to_string());
        let query = SearchQuery::new("measure", &["id", "status"])
            .unwrap()
            .apply_params(&raw, &defs);

        let sql = page_sql(&query);
        assert!(sql.starts_with("SELECT to_jsonb(page) FROM (SELECT \"id\", \"status\""));
        assert!(sql.ends_with("LIMIT $2 OFFSET $3) AS page"));
    }

    #[test]
    fn test_search_page_serializes() {
        let page = SearchPage {
            total: 1,
            rows: vec![serde_json::json!({"id": "m1"})],
        };
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["total"], 1);
        assert_eq!(value["rows"][0]["id"], "m1");
    }
}

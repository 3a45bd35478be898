//! Declarative search query builder.
//!
//! Turns a name to value parameter map plus per-table search parameter
//! definitions into parameterized count and data SQL statements.

pub mod parameters;
pub mod sql_builder;

pub use parameters::{SearchParameterDefinition, SearchParameterType, SearchParameters};
pub use sql_builder::{
    BuiltQuery, Operator, Predicate, SearchQuery, SortOrder, SqlBuilderError, SqlValue,
    escape_identifier, escape_like_pattern, validate_identifier,
};

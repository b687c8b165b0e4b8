//! Search query construction.
//!
//! [`SearchQuery`] turns a query-parameter bag plus a per-resource-type
//! [`SearchParamConfig`](crate::types::SearchParamConfig) into a pair of
//! parameterized statements sharing one WHERE clause:
//!
//! - [`SearchQuery::count_sql`] - `SELECT COUNT(*)` over all matches
//! - [`SearchQuery::data_sql`] - one ordered page, with bound LIMIT/OFFSET
//!
//! Backends execute both through
//! [`SearchExecutor::execute_search`](crate::core::SearchExecutor::execute_search).

mod query_builder;
pub mod values;

pub use query_builder::{SearchQuery, SqlDialect, SqlParam, SqlStatement, validate_identifier};

//! Search execution for SQLite.

use async_trait::async_trait;
use rusqlite::types::ToSqlOutput;
use rusqlite::{ToSql, TransactionBehavior, params_from_iter};
use serde_json::Value;
use tracing::debug;

use crate::core::SearchExecutor;
use crate::error::{BackendError, StorageError, StorageResult};
use crate::search::{SearchQuery, SqlParam};
use crate::types::{Pagination, SearchPage};

use super::SqliteBackend;

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::Text(s) => ToSqlOutput::from(s.as_str()),
            SqlParam::Integer(i) => ToSqlOutput::from(*i),
        })
    }
}

fn search_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message,
        source: None,
    })
}

// Count and page are read in one transaction.
#[async_trait]
impl SearchExecutor for SqliteBackend {
    async fn execute_search(
        &self,
        query: &SearchQuery,
        pagination: &Pagination,
    ) -> StorageResult<SearchPage> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;

        let count = query.count_sql();
        let total: i64 = tx
            .query_row(&count.sql, params_from_iter(count.params.iter()), |row| {
                row.get(0)
            })
            .map_err(|e| search_error(format!("Failed to count matches: {}", e)))?;

        let data = query.data_sql(pagination.count, pagination.offset);
        let resources = {
            let mut stmt = tx
                .prepare(&data.sql)
                .map_err(|e| search_error(format!("Failed to prepare search: {}", e)))?;
            let rows = stmt
                .query_map(params_from_iter(data.params.iter()), |row| {
                    row.get::<_, String>(0)
                })
                .map_err(|e| search_error(format!("Failed to run search: {}", e)))?;

            let mut resources = Vec::new();
            for row in rows {
                let text = row.map_err(|e| search_error(format!("Failed to read row: {}", e)))?;
                resources.push(serde_json::from_str::<Value>(&text)?);
            }
            resources
        };
        tx.commit()?;

        debug!(
            table = query.table(),
            total,
            returned = resources.len(),
            "Executed search"
        );

        Ok(SearchPage {
            total: u64::try_from(total).unwrap_or(0),
            resources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SearchParamConfig, SearchParamType};

    fn backend_with_orders() -> SqliteBackend {
        let backend = SqliteBackend::in_memory().unwrap();
        backend
            .with_connection(|c| {
                c.execute_batch(
                    "CREATE TABLE orders (id TEXT PRIMARY KEY, status TEXT, resource TEXT);
                     INSERT INTO orders VALUES ('o1', 'active', '{\"id\":\"o1\"}');
                     INSERT INTO orders VALUES ('o2', 'draft', '{\"id\":\"o2\"}');
                     INSERT INTO orders VALUES ('o3', 'active', '{\"id\":\"o3\"}');",
                )
            })
            .unwrap();
        backend
    }

    #[tokio::test]
    async fn test_execute_search_pages() {
        let backend = backend_with_orders();
        let config = SearchParamConfig::new()
            .with_param("status", SearchParamType::Token, "status")
            .with_default_sort("id");

        let mut query = SearchQuery::new("orders", &["resource"]).unwrap();
        query.apply_params([("status", "active")], &config).unwrap();

        let page = backend
            .execute_search(&query, &Pagination::new(1, 1))
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.resources, vec![serde_json::json!({"id": "o3"})]);
    }

    #[tokio::test]
    async fn test_execute_search_past_end() {
        let backend = backend_with_orders();
        let query = SearchQuery::new("orders", &["resource"]).unwrap();
        let page = backend
            .execute_search(&query, &Pagination::new(10, 50))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert!(page.resources.is_empty());
    }
}

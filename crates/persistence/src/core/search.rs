//! Search execution trait.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::search::SearchQuery;
use crate::types::{Pagination, SearchPage};

/// Runs queries built by [`SearchQuery`] against a backing store.
///
/// The count and the page must come from one consistent read so that
/// `total` agrees with the returned rows.
#[async_trait]
pub trait SearchExecutor: Send + Sync {
    /// Runs `query` and returns one page of documents plus the total.
    ///
    /// The first selected column of `query` must hold the JSON document.
    async fn execute_search(
        &self,
        query: &SearchQuery,
        pagination: &Pagination,
    ) -> StorageResult<SearchPage>;
}

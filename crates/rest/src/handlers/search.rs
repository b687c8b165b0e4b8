//! Search interaction.
//!
//! `GET [base]/[type]?params`, answered with a `searchset` Bundle.

use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::Value;
use tessera_persistence::Pagination;
use tessera_persistence::core::SearchExecutor;
use tessera_persistence::search::SearchQuery;
use tracing::debug;

use crate::error::{RestError, RestResult};
use crate::extractors::{Paging, SearchParams};
use crate::responses::{SearchLinks, search_bundle};
use crate::state::{AppState, SearchTarget};

/// Runs a search and wraps the page in a Bundle.
///
/// `endpoint` is the URL of the search endpoint without a query string;
/// Bundle links reuse `params.raw_query()` with only `_offset` rewritten.
pub async fn search_response<E>(
    executor: &E,
    target: &SearchTarget,
    params: &SearchParams,
    page: &Pagination,
    endpoint: &str,
) -> RestResult<Value>
where
    E: SearchExecutor + ?Sized,
{
    let mut query = SearchQuery::new(&target.table, target.columns.as_slice())?;
    query.apply_params(params.iter(), &target.params)?;

    let result = executor.execute_search(&query, page).await?;

    debug!(
        table = %target.table,
        predicates = query.predicate_count(),
        total = result.total,
        "Search completed"
    );

    let links = SearchLinks {
        base_url: endpoint,
        query_string: params.raw_query(),
        count: page.count,
        offset: page.offset,
        total: result.total,
    };
    Ok(search_bundle(result.resources, &links))
}

/// Handler for type-level search.
///
/// # Response
///
/// - `200 OK` - Bundle of type `searchset`
/// - `400 Bad Request` - a parameter value is invalid, or the type is
///   not searchable
pub async fn search_handler<B>(
    State(state): State<AppState<B>>,
    Path(resource_type): Path<String>,
    Paging(page): Paging,
    params: SearchParams,
) -> RestResult<Json<Value>>
where
    B: SearchExecutor + 'static,
{
    let target = state
        .search_target(&resource_type)
        .ok_or_else(|| RestError::BadRequest {
            message: format!("Search is not supported for {}", resource_type),
        })?;

    let endpoint = format!("{}/{}", state.base_url(), resource_type);
    let bundle = search_response(state.backend(), target, &params, &page, &endpoint).await?;
    Ok(Json(bundle))
}

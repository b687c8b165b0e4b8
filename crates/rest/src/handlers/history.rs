//! Instance history interaction.
//!
//! `GET [base]/[type]/[id]/_history`, newest version first, paged with
//! `_count` / `_offset`.

use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::Value;
use tessera_persistence::Pagination;
use tessera_persistence::core::VersionTracker;
use tracing::debug;

use crate::error::RestResult;
use crate::extractors::Paging;
use crate::responses::history_bundle;
use crate::state::AppState;

/// Builds the history Bundle for one resource.
///
/// `total` is the full length of the log; the entries are the requested
/// page of the newest-first ordering. Deleted resources keep their history.
pub async fn history_response<T>(
    tracker: &T,
    resource_type: &str,
    id: &str,
    page: &Pagination,
    base_url: &str,
) -> RestResult<Value>
where
    T: VersionTracker + ?Sized,
{
    let mut entries = tracker.get_history(resource_type, id).await?;
    let total = entries.len() as u64;

    entries.reverse();
    let page_entries: Vec<_> = entries
        .into_iter()
        .skip(page.offset)
        .take(page.count)
        .collect();

    debug!(
        resource_type,
        id,
        total,
        returned = page_entries.len(),
        "Built history bundle"
    );

    Ok(history_bundle(&page_entries, total, base_url))
}

/// Handler for instance history.
///
/// # Response
///
/// - `200 OK` - Bundle of type `history`
/// - `404 Not Found` - the resource never existed
pub async fn history_handler<B>(
    State(state): State<AppState<B>>,
    Path((resource_type, id)): Path<(String, String)>,
    Paging(page): Paging,
) -> RestResult<Json<Value>>
where
    B: VersionTracker + 'static,
{
    let bundle = history_response(
        state.backend(),
        &resource_type,
        &id,
        &page,
        state.base_url(),
    )
    .await?;
    Ok(Json(bundle))
}

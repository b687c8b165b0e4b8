//! Pagination extractor.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use tessera_persistence::Pagination;

use crate::state::AppState;

/// Axum extractor for `_count` and `_offset`.
///
/// `_count` defaults to the configured page size and is clamped to the
/// configured maximum. Unparseable values fall back to the defaults.
///
/// # Example
///
/// ```rust,ignore
/// use tessera_rest::extractors::Paging;
///
/// async fn list_handler(Paging(page): Paging) {
///     let limit = page.count;
///     let offset = page.offset;
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging(pub Pagination);

impl Paging {
    /// Reads pagination from a raw query string.
    pub fn from_query(query: &str, default_count: usize, max_count: usize) -> Self {
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        Paging(Pagination::from_params(
            pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            default_count,
            max_count,
        ))
    }
}

impl<B> FromRequestParts<AppState<B>> for Paging
where
    B: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<B>,
    ) -> Result<Self, Self::Rejection> {
        let config = state.config();
        Ok(Paging::from_query(
            parts.uri.query().unwrap_or(""),
            config.default_page_size,
            config.max_page_size,
        ))
    }
}

//! Axum extractors.
//!
//! - [`Paging`] - `_count` / `_offset` pagination
//! - [`SearchParams`] - the ordered search parameter bag

mod pagination;
mod search_params;

pub use pagination::Paging;
pub use search_params::SearchParams;

//! Core types for the persistence layer.
//!
//! - [`Document`], [`JsonPointer`] - the JSON document model
//! - [`VersionEntry`], [`VersionAction`] - version log rows
//! - [`SearchParamConfig`] and friends - per-resource-type search configuration
//! - [`Pagination`], [`SearchPage`] - offset pagination
//!
//! # Examples
//!
//! ```
//! use tessera_persistence::types::{Pagination, SearchParamConfig, SearchParamType};
//!
//! let config = SearchParamConfig::new()
//!     .with_param("status", SearchParamType::Token, "status")
//!     .with_param("subject", SearchParamType::Reference, "subject_id")
//!     .with_default_sort("id");
//!
//! let page = Pagination::from_params([("_count", "10"), ("_offset", "20")], 20, 100);
//! assert_eq!(page.count, 10);
//! assert_eq!(page.offset, 20);
//! ```

mod document;
mod pagination;
mod search_params;
mod version_entry;

pub use document::{Document, JsonPointer, PointerError, json_equal};
pub(crate) use document::parse_array_index;

pub use pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Pagination, SearchPage};

pub use search_params::{
    SearchModifier, SearchParamConfig, SearchParamDef, SearchParamType, SearchPrefix,
};

pub use version_entry::{VersionAction, VersionEntry};

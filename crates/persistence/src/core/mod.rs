//! Core persistence traits.
//!
//! - [`VersionTracker`] - append-only version log with optimistic locking
//! - [`SearchExecutor`] - runs parameterized search queries
//!
//! Backends live under [`crate::backends`]; the SQLite backend implements
//! every trait here.

mod search;
mod versioned;

pub use search::SearchExecutor;
pub use versioned::{
    RecreatePolicy, VersionTracker, check_version_match, etag_version, normalize_etag,
};

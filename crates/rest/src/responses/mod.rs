//! Response building.
//!
//! - [`operation_outcome`] - OperationOutcome generation
//! - [`bundle`] - searchset and history Bundles
//! - [`headers`] - ETag, Last-Modified and Location values

pub mod bundle;
pub mod headers;
pub mod operation_outcome;

pub use bundle::{BundleBuilder, SearchLinks, history_bundle, search_bundle};
pub use headers::VersionHeaders;
pub use operation_outcome::{
    Issue, IssueSeverity, IssueType, OperationOutcome, error_outcome, not_found_outcome,
};

//! Tessera persistence layer
//!
//! Shared versioning, patching and search machinery used by every resource
//! type of a clinical-data REST service. Resource-specific validation and
//! table layouts stay with the caller; this crate provides the pieces that
//! must behave identically for all of them.
//!
//! # Features
//!
//! - **Versioning**: append-only, gap-free version log per resource with
//!   optimistic (compare-and-swap) updates and deletes
//! - **Patching**: JSON Patch (RFC 6902) applied atomically, and JSON Merge
//!   Patch (RFC 7396)
//! - **Search**: query-parameter bags translated into parameterized SQL,
//!   with pagination
//!
//! # Architecture
//!
//! - [`types`] - Document model, version entries, search configuration
//! - [`error`] - Error types for all storage operations
//! - [`core`] - The [`VersionTracker`] and [`SearchExecutor`] traits
//! - [`patch`] - JSON Patch and JSON Merge Patch engines
//! - [`search`] - SQL query builder
//! - [`backends`] - Backend implementations (SQLite)
//!
//! # Quick Start
//!
//! ```no_run
//! use tessera_persistence::backends::sqlite::SqliteBackend;
//! use tessera_persistence::core::VersionTracker;
//! use tessera_persistence::patch::JsonPatch;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::in_memory()?;
//! backend.init_schema()?;
//!
//! let v1 = backend
//!     .record_create("ServiceRequest", "sr-1", json!({"status": "draft"}))
//!     .await?;
//!
//! let patch = JsonPatch::parse(br#"[{"op": "replace", "path": "/status", "value": "active"}]"#)?;
//! let patched = patch.apply(&v1.snapshot)?;
//!
//! let v2 = backend
//!     .record_update("ServiceRequest", "sr-1", v1.version_id, patched)
//!     .await?;
//! assert_eq!(v2.version_id, 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Search
//!
//! ```
//! use tessera_persistence::search::SearchQuery;
//! use tessera_persistence::types::{SearchParamConfig, SearchParamType};
//!
//! let config = SearchParamConfig::new()
//!     .with_param("name", SearchParamType::String, "name")
//!     .with_default_sort("id");
//!
//! let mut query = SearchQuery::new("specimens", &["resource"]).unwrap();
//! query.apply_params([("name:contains", "blood")], &config).unwrap();
//!
//! let stmt = query.count_sql();
//! assert!(stmt.sql.contains("LIKE"));
//! assert!(!stmt.sql.contains("blood"));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod core;
pub mod error;
pub mod patch;
pub mod search;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{StorageError, StorageResult};
pub use types::{Document, Pagination, SearchPage, VersionAction, VersionEntry};

// Re-export core traits
pub use core::{RecreatePolicy, SearchExecutor, VersionTracker};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

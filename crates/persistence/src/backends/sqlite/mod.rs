//! SQLite backend implementation.
//!
//! Implements [`VersionTracker`](crate::core::VersionTracker) and executes
//! [`SearchQuery`](crate::search::SearchQuery) statements. Supports both
//! in-memory databases (for tests) and file databases.
//!
//! # Example
//!
//! ```no_run
//! use tessera_persistence::backends::sqlite::SqliteBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::open("./data/tessera.db")?;
//! backend.init_schema()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! -- One row per key; the compare-and-swap target
//! CREATE TABLE resource_heads (
//!     resource_type TEXT NOT NULL,
//!     resource_id TEXT NOT NULL,
//!     version_id INTEGER NOT NULL,
//!     action TEXT NOT NULL,
//!     last_updated TEXT NOT NULL,
//!     PRIMARY KEY (resource_type, resource_id)
//! );
//!
//! -- Append-only version log (UPDATE and DELETE abort via triggers)
//! CREATE TABLE resource_versions (
//!     resource_type TEXT NOT NULL,
//!     resource_id TEXT NOT NULL,
//!     version_id INTEGER NOT NULL,
//!     action TEXT NOT NULL,
//!     snapshot TEXT NOT NULL,  -- JSON
//!     recorded_at TEXT NOT NULL,
//!     PRIMARY KEY (resource_type, resource_id, version_id)
//! );
//! ```

mod backend;
pub(crate) mod schema;
mod search;
mod storage;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use schema::SCHEMA_VERSION;

//! # tessera-rest - REST glue for the Tessera resource core
//!
//! This crate turns the [`tessera_persistence`] building blocks into HTTP
//! interactions: patch, read, vread, history and search handlers for
//! [axum](https://docs.rs/axum), the Bundle and OperationOutcome documents
//! they return, and the status mapping for every storage, patch and search
//! error.
//!
//! Route registration belongs to the embedding service; every handler is
//! generic over the backend and takes an [`AppState`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use axum::{Router, routing::get};
//! use tessera_persistence::backends::sqlite::SqliteBackend;
//! use tessera_rest::{AppState, ServerConfig, handlers};
//!
//! let config = ServerConfig::from_env();
//! let backend = SqliteBackend::with_config("tessera.db", config.backend_config())?;
//! backend.init_schema()?;
//!
//! let state = AppState::new(Arc::new(backend), config);
//! let app: Router = Router::new()
//!     .route(
//!         "/{type}/{id}",
//!         get(handlers::read_handler::<SqliteBackend>)
//!             .patch(handlers::patch_handler::<SqliteBackend>),
//!     )
//!     .route("/{type}/{id}/_history", get(handlers::history_handler::<SqliteBackend>))
//!     .with_state(state);
//! ```
//!
//! ## HTTP Headers
//!
//! - `Content-Type` - selects JSON Patch or JSON Merge Patch
//! - `If-Match` - optimistic locking for patch
//! - `ETag` / `Last-Modified` - returned with every version
//!
//! ## Error Handling
//!
//! All errors are returned as OperationOutcome documents; see [`error`] for
//! the status table.
//!
//! ## Architecture
//!
//! - [`error`] - [`RestError`] and its OperationOutcome rendering
//! - [`config`] - Server configuration
//! - [`state`] - Application state (backend, configuration, search targets)
//! - [`handlers`] - Interaction handlers and helpers
//! - [`extractors`] - Axum extractors for paging and search parameters
//! - [`responses`] - Bundles, OperationOutcomes and version headers

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod responses;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{RestError, RestResult};
pub use state::{AppState, SearchTarget};

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup. `RUST_LOG`, when set,
/// overrides `level`.
///
/// # Arguments
///
/// * `level` - The log level (error, warn, info, debug, trace)
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tessera_rest={level},tessera_persistence={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

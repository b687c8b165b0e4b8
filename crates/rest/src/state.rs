//! Application state shared by the handlers.

use std::collections::HashMap;
use std::sync::Arc;

use tessera_persistence::types::SearchParamConfig;

use crate::config::ServerConfig;

/// Where and how one resource type is searched.
#[derive(Debug, Clone)]
pub struct SearchTarget {
    /// The table holding one row per live resource.
    pub table: String,
    /// Selected columns; the first must hold the JSON document.
    pub columns: Vec<String>,
    /// Declared search parameters.
    pub params: SearchParamConfig,
}

impl SearchTarget {
    /// Creates a target reading documents from `document_column` of `table`.
    pub fn new(
        table: impl Into<String>,
        document_column: impl Into<String>,
        params: SearchParamConfig,
    ) -> Self {
        Self {
            table: table.into(),
            columns: vec![document_column.into()],
            params,
        }
    }
}

/// Shared application state.
///
/// # Type Parameters
///
/// * `B` - The backend, typically implementing
///   [`VersionTracker`](tessera_persistence::core::VersionTracker) and
///   [`SearchExecutor`](tessera_persistence::core::SearchExecutor)
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use tessera_rest::{AppState, SearchTarget, ServerConfig};
/// use tessera_persistence::backends::sqlite::SqliteBackend;
///
/// let backend = SqliteBackend::in_memory()?;
/// let state = AppState::new(Arc::new(backend), ServerConfig::default())
///     .with_search_target("Specimen", SearchTarget::new("specimens", "resource", config));
/// ```
pub struct AppState<B> {
    backend: Arc<B>,
    config: Arc<ServerConfig>,
    search_targets: Arc<HashMap<String, SearchTarget>>,
}

// B sits behind an Arc and need not be Clone.
impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: Arc::clone(&self.config),
            search_targets: Arc::clone(&self.search_targets),
        }
    }
}

impl<B> AppState<B> {
    /// Creates state with no searchable resource types.
    pub fn new(backend: Arc<B>, config: ServerConfig) -> Self {
        Self {
            backend,
            config: Arc::new(config),
            search_targets: Arc::new(HashMap::new()),
        }
    }

    /// Registers how `resource_type` is searched.
    pub fn with_search_target(
        mut self,
        resource_type: impl Into<String>,
        target: SearchTarget,
    ) -> Self {
        Arc::make_mut(&mut self.search_targets).insert(resource_type.into(), target);
        self
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.config.base_url()
    }

    /// Returns the search target for `resource_type`, if registered.
    pub fn search_target(&self, resource_type: &str) -> Option<&SearchTarget> {
        self.search_targets.get(resource_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_persistence::types::SearchParamType;

    #[test]
    fn test_search_targets() {
        let params = SearchParamConfig::new().with_param("status", SearchParamType::Token, "status");
        let state = AppState::new(Arc::new(()), ServerConfig::for_testing())
            .with_search_target("Specimen", SearchTarget::new("specimens", "resource", params));

        let clone = state.clone();
        let target = clone.search_target("Specimen").unwrap();
        assert_eq!(target.table, "specimens");
        assert_eq!(target.columns, vec!["resource".to_string()]);
        assert!(clone.search_target("Account").is_none());
        assert_eq!(clone.base_url(), "http://localhost");
    }
}

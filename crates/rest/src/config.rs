//! Server configuration.
//!
//! Values come from command line arguments, then environment variables,
//! then the defaults below.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TESSERA_LOG_LEVEL` | info | Log level |
//! | `TESSERA_BASE_URL` | http://localhost:8080 | Base URL for Bundle links and Location headers |
//! | `TESSERA_DATABASE_PATH` | (in-memory) | SQLite database file |
//! | `TESSERA_MAX_CONNECTIONS` | 10 | Connection pool size |
//! | `TESSERA_BUSY_TIMEOUT_MS` | 5000 | SQLite busy timeout |
//! | `TESSERA_RECREATE_POLICY` | reject | Create after delete: `reject` or `resume` |
//! | `TESSERA_DEFAULT_PAGE_SIZE` | 20 | Default `_count` |
//! | `TESSERA_MAX_PAGE_SIZE` | 1000 | Upper bound for `_count` |
//!
//! # Example
//!
//! ```rust
//! use tessera_rest::ServerConfig;
//!
//! let config = ServerConfig {
//!     base_url: "https://clinic.example.org/api".to_string(),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use clap::Parser;
use tessera_persistence::core::RecreatePolicy;
#[cfg(feature = "sqlite")]
use tessera_persistence::backends::sqlite::SqliteBackendConfig;
use tessera_persistence::types::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "tessera-server")]
#[command(about = "Tessera clinical resource server")]
pub struct ServerConfig {
    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "TESSERA_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Base URL for the server (used in Location headers and Bundle links).
    #[arg(long, env = "TESSERA_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// SQLite database file. In-memory when absent.
    #[arg(long, env = "TESSERA_DATABASE_PATH")]
    pub database_path: Option<String>,

    /// Maximum pooled database connections.
    #[arg(long, env = "TESSERA_MAX_CONNECTIONS", default_value = "10")]
    pub max_connections: u32,

    /// How long a writer waits for the database lock, in milliseconds.
    #[arg(long, env = "TESSERA_BUSY_TIMEOUT_MS", default_value = "5000")]
    pub busy_timeout_ms: u32,

    /// What creating a deleted resource does (reject, resume).
    #[arg(long, env = "TESSERA_RECREATE_POLICY", default_value = "reject")]
    pub recreate_policy: RecreatePolicy,

    /// Default page size for search results.
    #[arg(long, env = "TESSERA_DEFAULT_PAGE_SIZE", default_value = "20")]
    pub default_page_size: usize,

    /// Maximum page size for search results.
    #[arg(long, env = "TESSERA_MAX_PAGE_SIZE", default_value = "1000")]
    pub max_page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            base_url: "http://localhost:8080".to_string(),
            database_path: None,
            max_connections: 10,
            busy_timeout_ms: 5000,
            recreate_policy: RecreatePolicy::Reject,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from environment variables only.
    pub fn from_env() -> Self {
        Self::try_parse_from(["tessera-server"]).unwrap_or_default()
    }

    /// Returns the base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        match url::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                if url.query().is_some() || url.fragment().is_some() {
                    errors.push("Base URL cannot have a query or fragment".to_string());
                }
            }
            Ok(url) => errors.push(format!("Unsupported base URL scheme: {}", url.scheme())),
            Err(e) => errors.push(format!("Invalid base URL '{}': {}", self.base_url, e)),
        }

        if self.max_connections == 0 {
            errors.push("Max connections cannot be 0".to_string());
        }

        if self.default_page_size == 0 {
            errors.push("Default page size cannot be 0".to_string());
        }

        if self.default_page_size > self.max_page_size {
            errors.push("Default page size cannot exceed max page size".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Returns the SQLite backend settings carried by this configuration.
    #[cfg(feature = "sqlite")]
    pub fn backend_config(&self) -> SqliteBackendConfig {
        SqliteBackendConfig {
            max_connections: self.max_connections,
            busy_timeout_ms: self.busy_timeout_ms,
            recreate_policy: self.recreate_policy,
            ..Default::default()
        }
    }

    /// Creates a configuration suitable for testing.
    pub fn for_testing() -> Self {
        Self {
            log_level: "debug".to_string(),
            base_url: "http://localhost".to_string(),
            default_page_size: 10,
            max_page_size: 100,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.base_url(), "http://localhost:8080");
        assert_eq!(config.recreate_policy, RecreatePolicy::Reject);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_args() {
        let config = ServerConfig::try_parse_from([
            "tessera-server",
            "--max-page-size",
            "500",
            "--recreate-policy",
            "resume",
            "--base-url",
            "https://example.org/fhir/",
        ])
        .unwrap();
        assert_eq!(config.max_page_size, 500);
        assert_eq!(config.recreate_policy, RecreatePolicy::Resume);
        assert_eq!(config.base_url(), "https://example.org/fhir");
    }

    #[test]
    fn test_validate_base_url() {
        for bad in ["not a url", "ftp://example.org", "http://example.org/?a=1"] {
            let config = ServerConfig {
                base_url: bad.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_validate_invalid_page_sizes() {
        let config = ServerConfig {
            default_page_size: 100,
            max_page_size: 50,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("page size")));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_backend_config() {
        let config = ServerConfig {
            max_connections: 4,
            recreate_policy: RecreatePolicy::Resume,
            ..Default::default()
        };
        let backend = config.backend_config();
        assert_eq!(backend.max_connections, 4);
        assert_eq!(backend.recreate_policy, RecreatePolicy::Resume);
        assert!(backend.enable_wal);
    }

    #[test]
    fn test_for_testing() {
        let config = ServerConfig::for_testing();
        assert_eq!(config.base_url(), "http://localhost");
        assert_eq!(config.max_page_size, 100);
        assert!(config.validate().is_ok());
    }
}

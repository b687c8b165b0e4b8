//! Shared REST test harness.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{Router, routing::get};
use axum_test::TestServer;
use serde_json::{Value, json};

use tessera_persistence::backends::sqlite::SqliteBackend;
use tessera_persistence::core::VersionTracker;
use tessera_persistence::types::{SearchParamConfig, SearchParamType};
use tessera_rest::handlers::{
    history_handler, patch_handler, read_handler, search_handler, vread_handler,
};
use tessera_rest::{AppState, SearchTarget, ServerConfig};

/// A test server over an in-memory SQLite backend.
pub struct RestTestHarness {
    /// The test server instance.
    pub server: TestServer,
    /// The storage backend.
    pub backend: Arc<SqliteBackend>,
}

impl RestTestHarness {
    /// Creates a harness with the version schema and a `specimens` search
    /// table.
    pub fn new() -> Self {
        let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
        backend.init_schema().expect("Failed to initialize schema");
        backend
            .with_connection(|c| {
                c.execute_batch(
                    "CREATE TABLE specimens (
                        id TEXT PRIMARY KEY,
                        status TEXT NOT NULL,
                        collected TEXT NOT NULL,
                        resource TEXT NOT NULL
                    );",
                )
            })
            .expect("Failed to create specimens table");
        let backend = Arc::new(backend);

        let params = SearchParamConfig::new()
            .with_param("status", SearchParamType::Token, "status")
            .with_param("collected", SearchParamType::Date, "collected")
            .with_default_sort("id");
        let state = AppState::new(Arc::clone(&backend), ServerConfig::for_testing())
            .with_search_target("Specimen", SearchTarget::new("specimens", "resource", params));

        let router = Router::new()
            .route("/{type}", get(search_handler::<SqliteBackend>))
            .route(
                "/{type}/{id}",
                get(read_handler::<SqliteBackend>).patch(patch_handler::<SqliteBackend>),
            )
            .route("/{type}/{id}/_history", get(history_handler::<SqliteBackend>))
            .route(
                "/{type}/{id}/_history/{vid}",
                get(vread_handler::<SqliteBackend>),
            )
            .with_state(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        Self { server, backend }
    }

    /// Records version 1 of a resource.
    pub async fn seed(&self, resource_type: &str, id: &str, doc: Value) {
        self.backend
            .record_create(resource_type, id, doc)
            .await
            .expect("Failed to seed resource");
    }

    /// Inserts `n` specimens `s01..sNN`, alternating active and draft.
    pub fn seed_specimens(&self, n: usize) {
        self.backend
            .with_connection(|c| {
                for i in 1..=n {
                    let id = format!("s{:02}", i);
                    let status = if i % 2 == 0 { "draft" } else { "active" };
                    let doc = json!({"resourceType": "Specimen", "id": id, "status": status});
                    c.execute(
                        "INSERT INTO specimens VALUES (?1, ?2, ?3, ?4)",
                        (&id, status, format!("2024-02-{:02}", i), doc.to_string()),
                    )?;
                }
                Ok(())
            })
            .expect("Failed to seed specimens");
    }
}

/// Returns the URL of the link with the given relation, if present.
pub fn link<'a>(bundle: &'a Value, relation: &str) -> Option<&'a str> {
    bundle["link"]
        .as_array()?
        .iter()
        .find(|l| l["relation"] == relation)
        .and_then(|l| l["url"].as_str())
}

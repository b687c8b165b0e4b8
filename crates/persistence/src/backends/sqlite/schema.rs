//! SQLite schema definitions.

use rusqlite::Connection;

use crate::error::{BackendError, StorageError, StorageResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

fn schema_error(context: &str, e: rusqlite::Error) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message: format!("{}: {}", context, e),
        source: Some(Box::new(e)),
    })
}

/// Initialize the database schema.
///
/// Safe to call on every start; an up-to-date database is left untouched.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(StorageError::Backend(BackendError::MigrationError {
            message: format!(
                "database schema version {} is newer than supported version {}",
                current_version, SCHEMA_VERSION
            ),
        }));
    }

    Ok(())
}

/// Get the current schema version (0 for a fresh database).
pub(crate) fn get_schema_version(conn: &Connection) -> StorageResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| schema_error("Failed to create schema_version table", e))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| schema_error("Failed to clear schema_version", e))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| schema_error("Failed to set schema_version", e))?;
    Ok(())
}

/// `resource_heads` holds one row per key and is the compare-and-swap
/// target. `resource_versions` is the log itself; triggers make it
/// append-only.
fn create_schema_v1(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS resource_heads (
            resource_type TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            version_id INTEGER NOT NULL CHECK (version_id > 0),
            action TEXT NOT NULL CHECK (action IN ('create', 'update', 'delete')),
            last_updated TEXT NOT NULL,
            PRIMARY KEY (resource_type, resource_id)
        );

        CREATE TABLE IF NOT EXISTS resource_versions (
            resource_type TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            version_id INTEGER NOT NULL CHECK (version_id > 0),
            action TEXT NOT NULL CHECK (action IN ('create', 'update', 'delete')),
            snapshot TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            PRIMARY KEY (resource_type, resource_id, version_id)
        );

        CREATE INDEX IF NOT EXISTS idx_resource_versions_recorded
            ON resource_versions(resource_type, recorded_at);

        CREATE TRIGGER IF NOT EXISTS resource_versions_no_update
            BEFORE UPDATE ON resource_versions
        BEGIN
            SELECT RAISE(ABORT, 'resource_versions is append-only');
        END;

        CREATE TRIGGER IF NOT EXISTS resource_versions_no_delete
            BEFORE DELETE ON resource_versions
        BEGIN
            SELECT RAISE(ABORT, 'resource_versions is append-only');
        END;
        ",
    )
    .map_err(|e| schema_error("Failed to create version tables", e))
}

//! Database connection utilities and schema.

use std::path::Path;

use duckdb::Connection;

use crate::DbError;

/// Opens (or creates) the `DuckDB` file at `path` and ensures the schema
/// exists.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;

    conn.execute_batch(
        "SET threads = 4;
         SET memory_limit = '512MB';",
    )?;

    create_schema(&conn)?;
    log::debug!("Opened database at {}", path.display());

    Ok(conn)
}

/// Opens the database at the default path.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_default() -> Result<Connection, DbError> {
    open(&crate::paths::db_path())
}

/// Opens a throwaway in-memory database with the schema applied.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE SEQUENCE IF NOT EXISTS regions_id_seq START 1;
        CREATE TABLE IF NOT EXISTS regions (
            id BIGINT PRIMARY KEY,
            name TEXT NOT NULL,
            boundary_geojson TEXT NOT NULL,
            min_lat DOUBLE NOT NULL,
            min_lon DOUBLE NOT NULL,
            max_lat DOUBLE NOT NULL,
            max_lon DOUBLE NOT NULL
        );

        CREATE SEQUENCE IF NOT EXISTS exclusions_id_seq START 1;
        CREATE TABLE IF NOT EXISTS exclusions (
            id BIGINT PRIMARY KEY,
            name TEXT NOT NULL,
            reason TEXT NOT NULL,
            boundary_geojson TEXT NOT NULL
        );

        CREATE SEQUENCE IF NOT EXISTS businesses_id_seq START 1;
        CREATE TABLE IF NOT EXISTS businesses (
            id BIGINT PRIMARY KEY,
            name TEXT,
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            lat DOUBLE NOT NULL,
            lon DOUBLE NOT NULL,
            rating DOUBLE
        );
        CREATE INDEX IF NOT EXISTS businesses_subcategory_idx ON businesses (subcategory);

        CREATE SEQUENCE IF NOT EXISTS artifacts_id_seq START 1;
        CREATE TABLE IF NOT EXISTS artifacts (
            id BIGINT PRIMARY KEY,
            region_id BIGINT NOT NULL,
            category TEXT,
            subcategory TEXT NOT NULL,
            buffer_distance DOUBLE NOT NULL,
            percentile DOUBLE NOT NULL,
            points_geojson TEXT NOT NULL,
            weights_json TEXT NOT NULL,
            created_at TEXT NOT NULL
        );",
    )?;

    Ok(())
}

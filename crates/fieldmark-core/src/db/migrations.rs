//! Database migrations

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get::<_, i32>(0).map(|v| v != 0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Migration to version 1: Initial schema
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );
        -- One row per marking; payload holds the full wire record.
        CREATE TABLE IF NOT EXISTS markings (
            identity_key TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            timestamp INTEGER NOT NULL DEFAULT 0,
            last_modified INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_markings_timestamp ON markings(timestamp DESC);
        -- Local-only key/value state (device identity lives here).
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        INSERT INTO schema_version (version) VALUES (1);
        COMMIT;",
    )?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: ordered reads by mutation time
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
        CREATE INDEX IF NOT EXISTS idx_markings_last_modified ON markings(last_modified DESC);
        INSERT INTO schema_version (version) VALUES (2);
        COMMIT;",
    )?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

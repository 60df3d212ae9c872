//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the review importer database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Imported testimonials (the document store)
CREATE TABLE IF NOT EXISTS testimonials (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    summary TEXT NOT NULL,
    rating TEXT NOT NULL,
    review_date TEXT NOT NULL,
    source TEXT NOT NULL,
    imported_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_testimonials_source ON testimonials(source);

-- Append-only log of import attempts
CREATE TABLE IF NOT EXISTS import_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ran_at INTEGER NOT NULL,
    imported_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    message TEXT
);

-- Single-value settings such as the last successful import time
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- At most one running import per credential identity, across processes
CREATE TABLE IF NOT EXISTS run_leases (
    identity TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    claimed_at INTEGER NOT NULL
);
"#;

/// Settings key holding the unix timestamp of the last successful import
pub const LAST_IMPORT_KEY: &str = "last_import_at";

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

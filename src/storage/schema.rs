//! Database schema definitions
//!
//! This module contains the SQL schema of the harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mode TEXT NOT NULL,
    description TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    record_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0
);

-- Accepted entries, one row per record per run
CREATE TABLE IF NOT EXISTS entries (
    run_id INTEGER NOT NULL REFERENCES runs(id),
    id INTEGER NOT NULL,
    source_url TEXT NOT NULL,
    title TEXT,
    fields_json TEXT NOT NULL,
    PRIMARY KEY (run_id, id)
);

CREATE INDEX IF NOT EXISTS idx_entries_url ON entries(source_url);

-- URLs whose retries ran out
CREATE TABLE IF NOT EXISTS failures (
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    attempts INTEGER NOT NULL,
    last_error_timestamp TEXT NOT NULL,
    last_error TEXT,
    page INTEGER,
    PRIMARY KEY (run_id, url)
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

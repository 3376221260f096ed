//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    extracted_ok INTEGER NOT NULL DEFAULT 0,
    extracted_partial INTEGER NOT NULL DEFAULT 0,
    extracted_failed INTEGER NOT NULL DEFAULT 0,
    duplicates_skipped INTEGER NOT NULL DEFAULT 0,
    records_emitted INTEGER NOT NULL DEFAULT 0
);

-- Canonical records, one row per item per run
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    identity_key TEXT NOT NULL,
    category TEXT NOT NULL,
    app_name TEXT NOT NULL,
    app_url TEXT NOT NULL,
    short_description TEXT,
    full_description TEXT,
    developer_name TEXT,
    developer_website TEXT,
    price TEXT,
    rating REAL,
    reviews_count INTEGER,
    reviews_source TEXT NOT NULL,
    scraped_at TEXT NOT NULL,
    UNIQUE(run_id, identity_key)
);

CREATE INDEX IF NOT EXISTS idx_records_run ON records(run_id);
CREATE INDEX IF NOT EXISTS idx_records_category ON records(category);

-- Per-category outcome of each run
CREATE TABLE IF NOT EXISTS category_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    category_id INTEGER NOT NULL,
    category_name TEXT NOT NULL,
    target_item_count INTEGER NOT NULL,
    state TEXT NOT NULL,
    end_reason TEXT,
    pages_fetched INTEGER NOT NULL,
    stubs_discovered INTEGER NOT NULL,
    records_emitted INTEGER NOT NULL,
    UNIQUE(run_id, category_id)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::models::CanonicalRecord;
use crate::output::RunReport;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{category_result, Storage, StorageError, StorageResult};
use crate::storage::{CategoryResultRecord, RunRecord, RunStatus};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, extracted_ok, \
     extracted_partial, extracted_failed, duplicates_skipped, records_emitted";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running),
        extracted_ok: row.get::<_, i64>(5)? as u64,
        extracted_partial: row.get::<_, i64>(6)? as u64,
        extracted_failed: row.get::<_, i64>(7)? as u64,
        duplicates_skipped: row.get::<_, i64>(8)? as u64,
        records_emitted: row.get::<_, i64>(9)? as u64,
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<CanonicalRecord> {
    Ok(CanonicalRecord {
        identity_key: row.get(0)?,
        category: row.get(1)?,
        app_name: row.get(2)?,
        app_url: row.get(3)?,
        short_description: row.get(4)?,
        full_description: row.get(5)?,
        developer_name: row.get(6)?,
        developer_website: row.get(7)?,
        price: row.get(8)?,
        rating: row.get(9)?,
        reviews_count: row.get::<_, Option<i64>>(10)?.map(|n| n as u64),
        reviews_source: row.get(11)?,
        scraped_at: row.get::<_, DateTime<Utc>>(12)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS))?;

        let run = stmt.query_row(params![run_id], run_from_row).optional()?;

        run.ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM runs ORDER BY id DESC LIMIT 1",
            RUN_COLUMNS
        ))?;

        let run = stmt.query_row([], run_from_row).optional()?;

        Ok(run)
    }

    fn complete_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn save_run_report(&mut self, run_id: i64, report: &RunReport) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        let updated = tx.execute(
            "UPDATE runs SET extracted_ok = ?1, extracted_partial = ?2, extracted_failed = ?3,
             duplicates_skipped = ?4, records_emitted = ?5 WHERE id = ?6",
            params![
                report.extracted_ok as i64,
                report.extracted_partial as i64,
                report.extracted_failed as i64,
                report.duplicates_skipped as i64,
                report.records_emitted as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }

        for category in report.categories.iter().map(category_result) {
            tx.execute(
                "INSERT OR REPLACE INTO category_results
                 (run_id, category_id, category_name, target_item_count, state, end_reason,
                  pages_fetched, stubs_discovered, records_emitted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    run_id,
                    category.category_id,
                    category.category_name,
                    category.target_item_count as i64,
                    category.state,
                    category.end_reason,
                    category.pages_fetched as i64,
                    category.stubs_discovered as i64,
                    category.records_emitted as i64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // ===== Records =====

    fn insert_record(&mut self, run_id: i64, record: &CanonicalRecord) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO records
             (run_id, identity_key, category, app_name, app_url, short_description,
              full_description, developer_name, developer_website, price, rating,
              reviews_count, reviews_source, scraped_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                run_id,
                record.identity_key,
                record.category,
                record.app_name,
                record.app_url,
                record.short_description,
                record.full_description,
                record.developer_name,
                record.developer_website,
                record.price,
                record.rating,
                record.reviews_count.map(|n| n as i64),
                record.reviews_source,
                record.scraped_at,
            ],
        )?;

        Ok(inserted == 1)
    }

    fn get_records(&self, run_id: i64) -> StorageResult<Vec<CanonicalRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT identity_key, category, app_name, app_url, short_description,
             full_description, developer_name, developer_website, price, rating,
             reviews_count, reviews_source, scraped_at
             FROM records WHERE run_id = ?1 ORDER BY id",
        )?;

        let records = stmt
            .query_map(params![run_id], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    // ===== Statistics =====

    fn count_records(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_records_by_category(&self, run_id: i64) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT category, COUNT(*) as count FROM records WHERE run_id = ?1
             GROUP BY category ORDER BY count DESC, category",
        )?;

        let counts = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    fn average_rating(&self, run_id: i64) -> StorageResult<Option<f64>> {
        let avg: Option<f64> = self.conn.query_row(
            "SELECT AVG(rating) FROM records WHERE run_id = ?1 AND rating IS NOT NULL",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(avg)
    }

    fn get_category_results(&self, run_id: i64) -> StorageResult<Vec<CategoryResultRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT category_id, category_name, target_item_count, state, end_reason,
             pages_fetched, stubs_discovered, records_emitted
             FROM category_results WHERE run_id = ?1 ORDER BY id",
        )?;

        let results = stmt
            .query_map(params![run_id], |row| {
                Ok(CategoryResultRecord {
                    category_id: row.get(0)?,
                    category_name: row.get(1)?,
                    target_item_count: row.get::<_, i64>(2)? as usize,
                    state: row.get(3)?,
                    end_reason: row.get(4)?,
                    pages_fetched: row.get::<_, i64>(5)? as usize,
                    stubs_discovered: row.get::<_, i64>(6)? as usize,
                    records_emitted: row.get::<_, i64>(7)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(results)
    }
}

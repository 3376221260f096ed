//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::models::CanonicalRecord;
use crate::output::{CategoryReport, RunReport};
use crate::storage::{CategoryResultRecord, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the harvester.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new harvest run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as finished with the given status and a finish timestamp
    fn complete_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Stores the totals and per-category outcomes of a finished run
    fn save_run_report(&mut self, run_id: i64, report: &RunReport) -> StorageResult<()>;

    // ===== Records =====

    /// Inserts a canonical record
    ///
    /// # Returns
    ///
    /// `false` if the run already holds a record with the same identity key
    fn insert_record(&mut self, run_id: i64, record: &CanonicalRecord) -> StorageResult<bool>;

    /// Gets all records of a run in insertion order
    fn get_records(&self, run_id: i64) -> StorageResult<Vec<CanonicalRecord>>;

    // ===== Statistics =====

    /// Counts the records of a run
    fn count_records(&self, run_id: i64) -> StorageResult<u64>;

    /// Gets record counts per category name, largest first
    fn count_records_by_category(&self, run_id: i64) -> StorageResult<Vec<(String, u64)>>;

    /// Gets the mean rating over records that have one
    fn average_rating(&self, run_id: i64) -> StorageResult<Option<f64>>;

    /// Gets the stored per-category outcomes of a run
    fn get_category_results(&self, run_id: i64) -> StorageResult<Vec<CategoryResultRecord>>;
}

/// Converts a category report into its stored form
pub(crate) fn category_result(report: &CategoryReport) -> CategoryResultRecord {
    CategoryResultRecord {
        category_id: report.category_id,
        category_name: report.category_name.clone(),
        target_item_count: report.target_item_count,
        state: report.state.to_db_string().to_string(),
        end_reason: report.end_reason.map(|r| r.to_db_string().to_string()),
        pages_fetched: report.pages_fetched,
        stubs_discovered: report.stubs_discovered,
        records_emitted: report.records_emitted,
    }
}

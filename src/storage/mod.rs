//! Storage module for persisting harvest results
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Run tracking with final status and totals
//! - Canonical record persistence, unique per run and item
//! - Per-category outcomes

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::HarvestError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    SqliteStorage::new(path)
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub extracted_ok: u64,
    pub extracted_partial: u64,
    pub extracted_failed: u64,
    pub duplicates_skipped: u64,
    pub records_emitted: u64,
}

/// Stored outcome of one category in a run
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryResultRecord {
    pub category_id: u32,
    pub category_name: String,
    pub target_item_count: usize,
    pub state: String,
    pub end_reason: Option<String>,
    pub pages_fetched: usize,
    pub stubs_discovered: usize,
    pub records_emitted: usize,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

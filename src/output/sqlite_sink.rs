//! SQLite-backed record sink
//!
//! Records are inserted as they arrive; the run row gets its totals,
//! per-category outcomes and final status when the sink is finalized.

use crate::models::CanonicalRecord;
use crate::output::traits::{OutputError, OutputResult, RecordSink, RunReport};
use crate::storage::{RunStatus, SqliteStorage, Storage};

/// Record sink that persists into a [`SqliteStorage`]
pub struct SqliteSink {
    storage: SqliteStorage,
    run_id: i64,
    inserted: u64,
}

impl SqliteSink {
    /// Creates a sink and registers a new run in the database
    ///
    /// # Arguments
    ///
    /// * `storage` - The storage backend to write to
    /// * `config_hash` - Hash of the configuration the run uses
    pub fn new(mut storage: SqliteStorage, config_hash: &str) -> OutputResult<Self> {
        let run_id = storage
            .create_run(config_hash)
            .map_err(|e| OutputError::Storage(e.to_string()))?;

        tracing::info!("Created run {}", run_id);

        Ok(Self {
            storage,
            run_id,
            inserted: 0,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Records stored so far
    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Marks the run as failed
    pub fn mark_failed(&mut self) -> OutputResult<()> {
        self.storage
            .complete_run(self.run_id, RunStatus::Failed)
            .map_err(|e| OutputError::Storage(e.to_string()))
    }

    /// Gives back the underlying storage
    pub fn into_storage(self) -> SqliteStorage {
        self.storage
    }
}

impl RecordSink for SqliteSink {
    fn write_record(&mut self, record: &CanonicalRecord) -> OutputResult<()> {
        let inserted = self
            .storage
            .insert_record(self.run_id, record)
            .map_err(|e| OutputError::Storage(e.to_string()))?;

        if inserted {
            self.inserted += 1;
        } else {
            tracing::warn!(
                "Record {} already stored for run {}",
                record.identity_key,
                self.run_id
            );
        }

        Ok(())
    }

    fn finalize(&mut self, report: &RunReport) -> OutputResult<()> {
        let status = if report.cancelled {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };

        self.storage
            .save_run_report(self.run_id, report)
            .map_err(|e| OutputError::Storage(e.to_string()))?;
        self.storage
            .complete_run(self.run_id, status)
            .map_err(|e| OutputError::Storage(e.to_string()))?;

        tracing::info!(
            "Run {} stored as {} with {} records",
            self.run_id,
            status.to_db_string(),
            self.inserted
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(key: &str) -> CanonicalRecord {
        CanonicalRecord {
            category: "Sales".to_string(),
            identity_key: key.to_string(),
            app_name: "Acme".to_string(),
            app_url: key.to_string(),
            short_description: None,
            full_description: None,
            developer_name: None,
            developer_website: None,
            price: None,
            rating: Some(4.2),
            reviews_count: None,
            reviews_source: "shopify_app_store".to_string(),
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn test_sink_persists_records_and_status() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let mut sink = SqliteSink::new(storage, "hash").unwrap();

        sink.write_record(&record("https://apps.example.com/a")).unwrap();
        sink.write_record(&record("https://apps.example.com/b")).unwrap();
        sink.write_record(&record("https://apps.example.com/a")).unwrap();

        let mut report = RunReport::new();
        report.records_emitted = 2;
        sink.finalize(&report).unwrap();

        assert_eq!(sink.inserted(), 2);
        let run_id = sink.run_id();
        let storage = sink.into_storage();
        assert_eq!(storage.count_records(run_id).unwrap(), 2);

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.records_emitted, 2);
    }

    #[test]
    fn test_cancelled_run_is_interrupted() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let mut sink = SqliteSink::new(storage, "hash").unwrap();

        let mut report = RunReport::new();
        report.cancelled = true;
        sink.finalize(&report).unwrap();

        let run = sink.storage().get_run(sink.run_id()).unwrap();
        assert_eq!(run.status, RunStatus::Interrupted);
    }

    #[test]
    fn test_mark_failed() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let mut sink = SqliteSink::new(storage, "hash").unwrap();

        sink.mark_failed().unwrap();

        let run = sink.storage().get_run(sink.run_id()).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
    }
}

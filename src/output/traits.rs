//! Record sink traits and run report types
//!
//! This module defines the trait interface for record sinks and the report a
//! harvest run produces once every category is finished.

use crate::models::CanonicalRecord;
use crate::state::{EndReason, PaginationState};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Outcome of one category's traversal
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryReport {
    pub category_id: u32,
    pub category_name: String,

    /// Item cap the category was run with
    pub target_item_count: usize,

    /// Terminal pagination state
    pub state: PaginationState,

    pub end_reason: Option<EndReason>,

    /// Listing pages fetched successfully
    pub pages_fetched: usize,

    /// Item stubs discovered on the listing
    pub stubs_discovered: usize,

    /// Canonical records emitted for this category
    pub records_emitted: usize,
}

impl CategoryReport {
    pub fn is_aborted(&self) -> bool {
        self.state == PaginationState::Aborted
    }
}

/// Summary of a whole harvest run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Per-category outcomes, in job order
    pub categories: Vec<CategoryReport>,

    /// Extractions that found every field
    pub extracted_ok: u64,

    /// Extractions that missed some fields
    pub extracted_partial: u64,

    /// Detail pages that could not be fetched
    pub extracted_failed: u64,

    /// Sightings dropped because an earlier one already claimed the item
    pub duplicates_skipped: u64,

    /// Stubs drained without fetching after cancellation
    pub skipped_cancelled: u64,

    pub records_emitted: u64,

    pub cancelled: bool,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Creates an empty report for a run starting now
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            categories: Vec::new(),
            extracted_ok: 0,
            extracted_partial: 0,
            extracted_failed: 0,
            duplicates_skipped: 0,
            skipped_cancelled: 0,
            records_emitted: 0,
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    /// Total detail page extractions attempted
    pub fn total_extractions(&self) -> u64 {
        self.extracted_ok + self.extracted_partial + self.extracted_failed
    }

    /// Share of extractions that yielded a record, as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.total_extractions();
        if total == 0 {
            return 0.0;
        }
        ((self.extracted_ok + self.extracted_partial) as f64 / total as f64) * 100.0
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    pub fn aborted_categories(&self) -> usize {
        self.categories.iter().filter(|c| c.is_aborted()).count()
    }

    pub fn category(&self, category_id: u32) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.category_id == category_id)
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Destination for canonical records
///
/// Records are written one at a time as the run produces them; `finalize` is
/// called once with the run report after the last record.
pub trait RecordSink: Send {
    /// Writes a single record
    fn write_record(&mut self, record: &CanonicalRecord) -> OutputResult<()>;

    /// Completes the output, performing any final writes
    fn finalize(&mut self, report: &RunReport) -> OutputResult<()>;
}

impl RecordSink for Vec<CanonicalRecord> {
    fn write_record(&mut self, record: &CanonicalRecord) -> OutputResult<()> {
        self.push(record.clone());
        Ok(())
    }

    fn finalize(&mut self, _report: &RunReport) -> OutputResult<()> {
        Ok(())
    }
}

/// Fans every record out to several sinks
///
/// The first failing sink stops `write_record`; `finalize` still runs every sink
/// and reports the first error.
#[derive(Default)]
pub struct SinkSet<'a> {
    sinks: Vec<&'a mut dyn RecordSink>,
}

impl<'a> SinkSet<'a> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: &'a mut dyn RecordSink) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl RecordSink for SinkSet<'_> {
    fn write_record(&mut self, record: &CanonicalRecord) -> OutputResult<()> {
        for sink in self.sinks.iter_mut() {
            sink.write_record(record)?;
        }
        Ok(())
    }

    fn finalize(&mut self, report: &RunReport) -> OutputResult<()> {
        let mut first_error = None;
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.finalize(report) {
                tracing::error!("Failed to finalize output: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(state: PaginationState, reason: EndReason) -> CategoryReport {
        CategoryReport {
            category_id: 1,
            category_name: "Sales".to_string(),
            target_item_count: 30,
            state,
            end_reason: Some(reason),
            pages_fetched: 2,
            stubs_discovered: 30,
            records_emitted: 28,
        }
    }

    #[test]
    fn test_run_report_new() {
        let report = RunReport::new();
        assert_eq!(report.total_extractions(), 0);
        assert_eq!(report.records_emitted, 0);
        assert!(!report.cancelled);
    }

    #[test]
    fn test_success_rate() {
        let mut report = RunReport::new();
        report.extracted_ok = 6;
        report.extracted_partial = 2;
        report.extracted_failed = 2;

        assert_eq!(report.total_extractions(), 10);
        assert!((report.success_rate() - 80.0).abs() < 0.01);
    }

    #[test]
    fn test_success_rate_zero_extractions() {
        assert_eq!(RunReport::new().success_rate(), 0.0);
    }

    #[test]
    fn test_aborted_categories() {
        let mut report = RunReport::new();
        report
            .categories
            .push(category(PaginationState::Done, EndReason::CapReached));
        report
            .categories
            .push(category(PaginationState::Aborted, EndReason::FetchFailed));

        assert_eq!(report.aborted_categories(), 1);
        assert!(report.category(1).is_some());
        assert!(report.category(2).is_none());
    }

    struct FailingFinalize;

    impl RecordSink for FailingFinalize {
        fn write_record(&mut self, _record: &CanonicalRecord) -> OutputResult<()> {
            Ok(())
        }

        fn finalize(&mut self, _report: &RunReport) -> OutputResult<()> {
            Err(OutputError::Write("closed".to_string()))
        }
    }

    fn sample_record() -> CanonicalRecord {
        CanonicalRecord {
            category: "Sales".to_string(),
            identity_key: "https://apps.example.com/acme".to_string(),
            app_name: "Acme".to_string(),
            app_url: "https://apps.example.com/acme".to_string(),
            short_description: None,
            full_description: None,
            developer_name: None,
            developer_website: None,
            price: None,
            rating: None,
            reviews_count: None,
            reviews_source: "shopify_app_store".to_string(),
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn test_sink_set_fans_out() {
        let mut first: Vec<CanonicalRecord> = Vec::new();
        let mut second: Vec<CanonicalRecord> = Vec::new();

        {
            let mut sinks = SinkSet::new().with(&mut first).with(&mut second);
            assert_eq!(sinks.len(), 2);
            sinks.write_record(&sample_record()).unwrap();
            sinks.finalize(&RunReport::new()).unwrap();
        }

        assert_eq!(first.len(), 1);
        assert_eq!(second, first);
    }

    #[test]
    fn test_sink_set_finalizes_every_sink() {
        let mut failing = FailingFinalize;
        let mut records: Vec<CanonicalRecord> = Vec::new();

        let mut sinks = SinkSet::new().with(&mut failing).with(&mut records);
        sinks.write_record(&sample_record()).unwrap();

        assert!(matches!(
            sinks.finalize(&RunReport::new()),
            Err(OutputError::Write(_))
        ));
    }
}

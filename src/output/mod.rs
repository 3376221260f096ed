//! Output module for persisting and reporting harvested records
//!
//! This module handles:
//! - Record sinks (SQLite, CSV, XLSX) and fan-out to several of them
//! - Generating markdown summaries of harvest runs
//! - Reading run statistics back from the database

mod csv_export;
mod export_names;
mod markdown;
mod sqlite_sink;
pub mod stats;
mod traits;
mod xlsx_export;

pub use csv_export::CsvExporter;
pub use export_names::{category_slug, ExportNames, FILE_TIMESTAMP_FORMAT};
pub use markdown::{format_markdown_summary, generate_markdown_summary, HarvestSummary};
pub use sqlite_sink::SqliteSink;
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
pub use traits::{
    CategoryReport, OutputError, OutputResult, RecordSink, RunReport, SinkSet,
};
pub use xlsx_export::{XlsxExporter, SHEET_NAME};

//! Crawler module for category listing traversal and item extraction
//!
//! This module contains the core harvesting logic, including:
//! - Category selection and limit resolution
//! - HTTP fetching with retry logic
//! - Listing pagination as an explicit state machine
//! - Detail page field extraction
//! - Run-wide deduplication and normalization
//! - Overall run coordination

mod coordinator;
mod dedup;
mod extractor;
mod fetcher;
mod normalizer;
mod paginator;
mod parser;
mod selector;

pub use coordinator::{RecordStream, RunCoordinator, RunSettings};
pub use dedup::Deduplicator;
pub use extractor::{extract_fields, ItemExtractor};
pub use fetcher::{
    build_http_client, fetch_with_retry, is_transient_status, FetchFailure, HttpFetcher,
    PageFetcher, PageKind, RetryPolicy,
};
pub use normalizer::{parse_count, parse_rating, Normalizer, DEFAULT_REVIEWS_SOURCE};
pub use paginator::{page_url, ListingPaginator, PaginatorSettings, PAGE_PLACEHOLDER};
pub use parser::{parse_listing, ListingLink, ParsedListing};
pub use selector::CategorySelector;

use crate::config::Config;
use crate::output::{
    generate_markdown_summary, CsvExporter, HarvestSummary, RunReport, SinkSet, SqliteSink,
    XlsxExporter,
};
use crate::storage::open_storage;
use crate::url::CatalogSite;
use crate::HarvestError;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a completed harvest left behind
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    pub run_id: i64,
    pub report: RunReport,

    /// CSV and XLSX files written by the run
    pub files: Vec<PathBuf>,

    pub summary_path: PathBuf,
}

/// Runs a complete harvest operation
///
/// This is the main entry point for a harvest. It will:
/// 1. Resolve the category jobs from the run limits
/// 2. Open the database and register a run
/// 3. Build the HTTP client
/// 4. Traverse listings and extract items into SQLite, CSV and XLSX
/// 5. Write the markdown summary
///
/// # Arguments
///
/// * `config` - The validated harvest configuration
/// * `config_hash` - Hash of the configuration file, stored with the run
/// * `cancel` - Cancels the run cooperatively; records harvested so far are kept
///
/// # Returns
///
/// * `Ok(HarvestOutcome)` - The run finished, possibly cancelled
/// * `Err(HarvestError)` - Configuration, storage or output failure
pub async fn harvest(
    config: &Config,
    config_hash: &str,
    cancel: CancellationToken,
) -> Result<HarvestOutcome, HarvestError> {
    let site = CatalogSite::new(&config.catalog.base_url, &config.catalog.reserved_paths)?;
    let jobs = CategorySelector::new(config.categories.clone()).resolve(
        &config.run.selected_categories,
        config.run.max_categories,
        config.run.products_per_category,
    )?;

    if jobs.is_empty() {
        tracing::warn!("No categories selected, nothing will be fetched");
    }

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let mut sqlite = SqliteSink::new(storage, config_hash)?;
    let exported_at = Utc::now();
    let export_dir = config.output.export_dir.as_ref();
    let mut csv = export_dir
        .filter(|_| config.output.export_csv)
        .map(|dir| CsvExporter::with_timestamp(dir, config.output.per_category, exported_at));
    let mut xlsx = export_dir
        .filter(|_| config.output.export_xlsx)
        .map(|dir| XlsxExporter::with_timestamp(dir, config.output.per_category, exported_at));

    let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
    let coordinator = RunCoordinator::new(
        fetcher,
        site,
        Normalizer::new(config.catalog.reviews_source.clone()),
        RunSettings::from_config(config),
    )
    .with_cancellation(cancel);

    let result = {
        let mut sinks = SinkSet::new().with(&mut sqlite);
        if let Some(csv) = csv.as_mut() {
            sinks = sinks.with(csv);
        }
        if let Some(xlsx) = xlsx.as_mut() {
            sinks = sinks.with(xlsx);
        }
        coordinator.run_into(jobs, &mut sinks).await
    };

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            if let Err(mark_err) = sqlite.mark_failed() {
                tracing::error!("Failed to mark run as failed: {}", mark_err);
            }
            return Err(e);
        }
    };

    let mut files: Vec<PathBuf> = Vec::new();
    if let Some(csv) = csv.as_ref() {
        files.extend_from_slice(csv.files_written());
    }
    if let Some(xlsx) = xlsx.as_ref() {
        files.extend_from_slice(xlsx.files_written());
    }

    let summary = HarvestSummary {
        run_id: Some(sqlite.run_id()),
        config_hash: config_hash.to_string(),
        limits: config.run.clone(),
        report,
        files,
    };

    let summary_path = PathBuf::from(&config.output.summary_path);
    generate_markdown_summary(&summary, &summary_path)?;
    tracing::info!("Summary written to {}", summary_path.display());

    Ok(HarvestOutcome {
        run_id: sqlite.run_id(),
        report: summary.report,
        files: summary.files,
        summary_path,
    })
}

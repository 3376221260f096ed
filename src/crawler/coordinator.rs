//! Run coordinator - harvest orchestration
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  stubs   ┌──────────────┐  records  ┌──────────────┐
//! │  Paginators  │─────────▶│  Extraction  │──────────▶│ RecordStream │
//! │ (1 producer) │  bounded │   workers    │  bounded  │   / sink     │
//! └──────────────┘          └──────────────┘           └──────────────┘
//!                                  │
//!                            Deduplicator
//! ```
//!
//! Categories are traversed one after another by a single producer task; the
//! stub channel holds at most `concurrency` items, so listing traversal never
//! runs far ahead of extraction. The producer claims every stub in the
//! deduplication set before queueing it, so the first category to list an item
//! owns it whatever order the workers finish in. A worker whose extraction
//! fails releases the claim. Workers keep their own tallies and hand them back
//! when they exit; the deduplication set is the only shared state.

use crate::config::Config;
use crate::crawler::dedup::Deduplicator;
use crate::crawler::extractor::ItemExtractor;
use crate::crawler::fetcher::{PageFetcher, RetryPolicy};
use crate::crawler::normalizer::Normalizer;
use crate::crawler::paginator::{ListingPaginator, PaginatorSettings};
use crate::models::{CanonicalRecord, CategoryJob, ItemStub};
use crate::output::{CategoryReport, RecordSink, RunReport};
use crate::state::FetchStatus;
use crate::url::CatalogSite;
use crate::HarvestError;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Knobs for a harvest run
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Number of extraction workers, also the stub channel capacity
    pub concurrency: usize,

    /// Capacity of the outgoing record channel
    pub record_buffer: usize,

    pub page_cap: usize,
    pub retry: RetryPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            record_buffer: 4,
            page_cap: 10,
            retry: RetryPolicy::default(),
        }
    }
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        let concurrency = config.run.concurrency.max(1);
        Self {
            concurrency,
            record_buffer: concurrency,
            page_cap: config.run.page_cap_per_category,
            retry: RetryPolicy::from_config(&config.fetcher),
        }
    }
}

/// A stub on its way to a worker
#[derive(Debug)]
struct WorkItem {
    stub: ItemStub,
    category_name: String,
}

/// Statistics one worker collected
#[derive(Debug, Default)]
struct WorkerTally {
    ok: u64,
    partial: u64,
    failed: u64,
    skipped_cancelled: u64,
    emitted_by_category: HashMap<u32, usize>,
}

impl WorkerTally {
    fn emitted(&self) -> u64 {
        self.emitted_by_category.values().map(|n| *n as u64).sum()
    }
}

/// Lazily produced records of a running harvest
///
/// Records arrive as workers produce them; the run report becomes available
/// through [`RecordStream::finish`] once the run is over.
pub struct RecordStream {
    records: mpsc::Receiver<CanonicalRecord>,
    handle: JoinHandle<RunReport>,
}

impl RecordStream {
    /// Waits for the next record; `None` once the run has finished
    pub async fn next(&mut self) -> Option<CanonicalRecord> {
        self.records.recv().await
    }

    /// Waits for the run to end and returns its report
    ///
    /// Records not yet received are discarded and stop the run early.
    pub async fn finish(self) -> Result<RunReport, HarvestError> {
        drop(self.records);
        self.handle
            .await
            .map_err(|e| HarvestError::Task(e.to_string()))
    }
}

/// Orchestrates paginators, extraction workers and deduplication for a run
pub struct RunCoordinator {
    fetcher: Arc<dyn PageFetcher>,
    site: Arc<CatalogSite>,
    normalizer: Arc<Normalizer>,
    settings: RunSettings,
    cancel: CancellationToken,
}

impl RunCoordinator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        site: CatalogSite,
        normalizer: Normalizer,
        settings: RunSettings,
    ) -> Self {
        Self {
            fetcher,
            site: Arc::new(site),
            normalizer: Arc::new(normalizer),
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses an externally controlled cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels runs started by this coordinator
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Starts a run over `jobs`, in order, and returns its record stream
    ///
    /// Must be called from within a tokio runtime.
    pub fn run(&self, jobs: Vec<CategoryJob>) -> RecordStream {
        let (record_tx, records) = mpsc::channel(self.settings.record_buffer.max(1));

        let fetcher = Arc::clone(&self.fetcher);
        let site = Arc::clone(&self.site);
        let normalizer = Arc::clone(&self.normalizer);
        let settings = self.settings.clone();
        let cancel = self.cancel.child_token();

        let handle = tokio::spawn(async move {
            execute_run(jobs, fetcher, site, normalizer, settings, cancel, record_tx).await
        });

        RecordStream { records, handle }
    }

    /// Runs `jobs` and writes every record to `sink`
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - The run finished (possibly cancelled) and the sink was finalized
    /// * `Err(HarvestError)` - The sink failed; the run is stopped
    pub async fn run_into(
        &self,
        jobs: Vec<CategoryJob>,
        sink: &mut dyn RecordSink,
    ) -> Result<RunReport, HarvestError> {
        let mut stream = self.run(jobs);
        let mut written = 0u64;

        while let Some(record) = stream.next().await {
            if let Err(e) = sink.write_record(&record) {
                tracing::error!("Sink rejected record {}: {}", record.identity_key, e);
                let _ = stream.finish().await;
                return Err(e.into());
            }

            written += 1;
            if written % 10 == 0 {
                tracing::info!("Progress: {} records written", written);
            }
        }

        let report = stream.finish().await?;
        sink.finalize(&report)?;

        Ok(report)
    }
}

async fn execute_run(
    jobs: Vec<CategoryJob>,
    fetcher: Arc<dyn PageFetcher>,
    site: Arc<CatalogSite>,
    normalizer: Arc<Normalizer>,
    settings: RunSettings,
    cancel: CancellationToken,
    record_tx: mpsc::Sender<CanonicalRecord>,
) -> RunReport {
    let mut report = RunReport::new();
    let concurrency = settings.concurrency.max(1);

    tracing::info!(
        "Starting harvest of {} categories with {} workers",
        jobs.len(),
        concurrency
    );

    let (stub_tx, stub_rx) = mpsc::channel::<WorkItem>(concurrency);
    let stub_rx = Arc::new(Mutex::new(stub_rx));
    let dedup = Arc::new(Deduplicator::new());
    let extractor = Arc::new(ItemExtractor::new(
        Arc::clone(&fetcher),
        settings.retry,
        cancel.clone(),
    ));

    let workers: Vec<JoinHandle<WorkerTally>> = (0..concurrency)
        .map(|worker_id| {
            tokio::spawn(extraction_worker(
                worker_id,
                Arc::clone(&stub_rx),
                record_tx.clone(),
                Arc::clone(&extractor),
                Arc::clone(&dedup),
                Arc::clone(&normalizer),
                cancel.clone(),
            ))
        })
        .collect();
    drop(stub_rx);
    drop(record_tx);

    let paginator_settings = PaginatorSettings {
        page_cap: settings.page_cap,
        retry: settings.retry,
    };

    'jobs: for job in jobs {
        let mut paginator = ListingPaginator::new(
            job,
            Arc::clone(&site),
            Arc::clone(&fetcher),
            paginator_settings.clone(),
            cancel.clone(),
        );
        let category_name = paginator.job().category_name.clone();
        let mut workers_gone = false;

        while let Some(stub) = paginator.next_stub().await {
            if !dedup.claim(&stub) {
                tracing::debug!(
                    "Skipping {} in {}, already claimed by an earlier sighting",
                    stub.source_url,
                    category_name
                );
                report.duplicates_skipped += 1;
                continue;
            }

            let item = WorkItem {
                stub,
                category_name: category_name.clone(),
            };
            if stub_tx.send(item).await.is_err() {
                tracing::debug!("All extraction workers stopped");
                workers_gone = true;
                break;
            }
        }

        report.categories.push(CategoryReport {
            category_id: paginator.job().category_id,
            category_name,
            target_item_count: paginator.job().target_item_count,
            state: paginator.state(),
            end_reason: paginator.end_reason(),
            pages_fetched: paginator.pages_fetched(),
            stubs_discovered: paginator.stubs_yielded(),
            records_emitted: 0,
        });

        if workers_gone {
            break 'jobs;
        }
    }
    drop(stub_tx);

    for handle in workers {
        match handle.await {
            Ok(tally) => merge_tally(&mut report, tally),
            Err(e) => tracing::error!("Extraction worker panicked: {}", e),
        }
    }

    report.cancelled = cancel.is_cancelled();
    report.finished_at = Utc::now();

    tracing::info!(
        "Harvest finished: {} records emitted, {} ok, {} partial, {} failed, {} duplicates{}",
        report.records_emitted,
        report.extracted_ok,
        report.extracted_partial,
        report.extracted_failed,
        report.duplicates_skipped,
        if report.cancelled { " (cancelled)" } else { "" }
    );

    report
}

async fn extraction_worker(
    worker_id: usize,
    stub_rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    record_tx: mpsc::Sender<CanonicalRecord>,
    extractor: Arc<ItemExtractor>,
    dedup: Arc<Deduplicator>,
    normalizer: Arc<Normalizer>,
    cancel: CancellationToken,
) -> WorkerTally {
    let mut tally = WorkerTally::default();

    loop {
        let item = {
            let mut rx = stub_rx.lock().await;
            rx.recv().await
        };
        let Some(WorkItem {
            stub,
            category_name,
        }) = item
        else {
            break;
        };

        if cancel.is_cancelled() {
            tally.skipped_cancelled += 1;
            continue;
        }

        let category_id = stub.category_id;
        let raw = extractor.extract(stub).await;

        match raw.fetch_status {
            FetchStatus::Ok => tally.ok += 1,
            FetchStatus::Partial => tally.partial += 1,
            FetchStatus::Failed if cancel.is_cancelled() => {
                tally.skipped_cancelled += 1;
                continue;
            }
            FetchStatus::Failed => {
                dedup.release(&raw.stub.source_url);
                tally.failed += 1;
                continue;
            }
        }

        let Some(record) = normalizer.normalize(&raw, &category_name) else {
            continue;
        };

        if record_tx.send(record).await.is_err() {
            tracing::debug!("Worker {}: record receiver closed, stopping run", worker_id);
            cancel.cancel();
            break;
        }
        *tally.emitted_by_category.entry(category_id).or_default() += 1;
    }

    tracing::debug!("Worker {} shutting down", worker_id);
    tally
}

fn merge_tally(report: &mut RunReport, tally: WorkerTally) {
    report.extracted_ok += tally.ok;
    report.extracted_partial += tally.partial;
    report.extracted_failed += tally.failed;
    report.skipped_cancelled += tally.skipped_cancelled;
    report.records_emitted += tally.emitted();

    for (category_id, emitted) in tally.emitted_by_category {
        if let Some(category) = report
            .categories
            .iter_mut()
            .find(|c| c.category_id == category_id)
        {
            category.records_emitted += emitted;
        }
    }
}

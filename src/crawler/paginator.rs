//! Category listing traversal
//!
//! `ListingPaginator` walks one category's paginated listing as an explicit
//! state machine. Every call to [`ListingPaginator::step`] performs exactly one
//! transition:
//!
//! ```text
//! FetchPage ──ok──▶ ExtractStubs ──▶ Advance ──next page──▶ FetchPage
//!     │                                 │
//!     └─fetch failed / cancelled─▶ Aborted   └─cap / page cap / exhausted─▶ Done
//! ```

use crate::crawler::fetcher::{fetch_with_retry, FetchFailure, PageFetcher, PageKind, RetryPolicy};
use crate::crawler::parser::parse_listing;
use crate::models::{CategoryJob, ItemStub};
use crate::state::{EndReason, PaginationState};
use crate::url::{identity_key, CatalogSite};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Placeholder for the page number in templated listing URLs
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Limits applied to every category traversal
#[derive(Debug, Clone)]
pub struct PaginatorSettings {
    /// Maximum listing pages fetched per category
    pub page_cap: usize,

    pub retry: RetryPolicy,
}

impl Default for PaginatorSettings {
    fn default() -> Self {
        Self {
            page_cap: 10,
            retry: RetryPolicy::default(),
        }
    }
}

/// Drives the fetch-and-parse cycle over one category's listing
pub struct ListingPaginator {
    job: CategoryJob,
    site: Arc<CatalogSite>,
    fetcher: Arc<dyn PageFetcher>,
    settings: PaginatorSettings,
    cancel: CancellationToken,

    state: PaginationState,
    end_reason: Option<EndReason>,

    current_url: String,
    page_number: usize,
    body: Option<String>,
    next_page: Option<String>,
    new_on_page: usize,
    visited_pages: HashSet<String>,

    seen: HashSet<String>,
    pending: VecDeque<ItemStub>,
    stubs_yielded: usize,
    pages_fetched: usize,
}

impl ListingPaginator {
    /// Creates a paginator positioned before the first listing page
    ///
    /// A job with a zero item cap starts out `Done`.
    pub fn new(
        job: CategoryJob,
        site: Arc<CatalogSite>,
        fetcher: Arc<dyn PageFetcher>,
        settings: PaginatorSettings,
        cancel: CancellationToken,
    ) -> Self {
        let current_url = page_url(&job.listing_url, 1);

        let mut paginator = Self {
            job,
            site,
            fetcher,
            settings,
            cancel,
            state: PaginationState::FetchPage,
            end_reason: None,
            current_url,
            page_number: 1,
            body: None,
            next_page: None,
            new_on_page: 0,
            visited_pages: HashSet::new(),
            seen: HashSet::new(),
            pending: VecDeque::new(),
            stubs_yielded: 0,
            pages_fetched: 0,
        };

        if paginator.job.target_item_count == 0 {
            paginator.finish(EndReason::CapReached);
        }

        paginator
    }

    pub fn job(&self) -> &CategoryJob {
        &self.job
    }

    pub fn state(&self) -> PaginationState {
        self.state
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Stubs produced so far (queued or already handed out)
    pub fn stubs_yielded(&self) -> usize {
        self.stubs_yielded
    }

    /// URL of the listing page the paginator is on
    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    /// Returns the next item stub, stepping the state machine as needed
    ///
    /// Returns `None` once the traversal is terminal and every stub was handed out.
    pub async fn next_stub(&mut self) -> Option<ItemStub> {
        loop {
            if let Some(stub) = self.pending.pop_front() {
                return Some(stub);
            }
            if self.state.is_terminal() {
                return None;
            }
            self.step().await;
        }
    }

    /// Performs one state transition and returns the new state
    pub async fn step(&mut self) -> PaginationState {
        match self.state {
            PaginationState::FetchPage => self.fetch_page().await,
            PaginationState::ExtractStubs => self.extract_stubs(),
            PaginationState::Advance => self.advance(),
            PaginationState::Done | PaginationState::Aborted => {}
        }
        self.state
    }

    async fn fetch_page(&mut self) {
        if self.cancel.is_cancelled() {
            self.finish(EndReason::Cancelled);
            return;
        }

        tracing::debug!(
            "[{}] Fetching listing page {}: {}",
            self.job.category_name,
            self.page_number,
            self.current_url
        );

        let result = fetch_with_retry(
            self.fetcher.as_ref(),
            &self.current_url,
            PageKind::Listing,
            &self.settings.retry,
            &self.cancel,
        )
        .await;

        match result {
            Ok(body) => {
                self.pages_fetched += 1;
                self.visited_pages.insert(self.current_url.clone());
                self.body = Some(body);
                self.state = PaginationState::ExtractStubs;
            }
            Err(FetchFailure::Cancelled) => self.finish(EndReason::Cancelled),
            Err(FetchFailure::Fetch(e)) => {
                tracing::warn!(
                    "[{}] Aborting category after listing fetch failed: {}",
                    self.job.category_name,
                    e
                );
                self.finish(EndReason::FetchFailed);
            }
        }
    }

    fn extract_stubs(&mut self) {
        let body = self.body.take().unwrap_or_default();
        self.new_on_page = 0;
        self.next_page = None;

        let Ok(page_url) = Url::parse(&self.current_url) else {
            tracing::warn!(
                "[{}] Listing URL is not parseable: {}",
                self.job.category_name,
                self.current_url
            );
            self.state = PaginationState::Advance;
            return;
        };

        let parsed = parse_listing(&body, &page_url, &self.site);

        for link in parsed.items {
            if self.stubs_yielded >= self.job.target_item_count {
                break;
            }

            let key = identity_key(&link.url).unwrap_or_else(|_| link.url.clone());
            if !self.seen.insert(key) {
                continue;
            }

            self.pending.push_back(ItemStub {
                source_url: link.url,
                category_id: self.job.category_id,
                discovery_order: self.stubs_yielded,
                link_text: link.text,
            });
            self.stubs_yielded += 1;
            self.new_on_page += 1;
        }

        self.next_page = parsed.next_page.or_else(|| self.templated_next_page());

        tracing::debug!(
            "[{}] Page {} yielded {} new stubs ({} total)",
            self.job.category_name,
            self.page_number,
            self.new_on_page,
            self.stubs_yielded
        );

        self.state = PaginationState::Advance;
    }

    fn advance(&mut self) {
        if self.stubs_yielded >= self.job.target_item_count {
            self.finish(EndReason::CapReached);
            return;
        }

        let next = match self.next_page.take() {
            Some(next) if !self.visited_pages.contains(&next) => next,
            _ => {
                self.finish(EndReason::Exhausted);
                return;
            }
        };

        if self.pages_fetched >= self.settings.page_cap {
            self.finish(EndReason::PageCapReached);
            return;
        }

        self.current_url = next;
        self.page_number += 1;
        self.state = PaginationState::FetchPage;
    }

    /// Next page of a `{page}` template, continued only while pages add items
    fn templated_next_page(&self) -> Option<String> {
        if !self.job.listing_url.contains(PAGE_PLACEHOLDER) || self.new_on_page == 0 {
            return None;
        }
        Some(page_url(&self.job.listing_url, self.page_number + 1))
    }

    fn finish(&mut self, reason: EndReason) {
        self.state = reason.terminal_state();
        self.end_reason = Some(reason);
        self.body = None;

        tracing::info!(
            "[{}] Listing traversal {} ({}): {} pages, {} stubs",
            self.job.category_name,
            self.state,
            reason,
            self.pages_fetched,
            self.stubs_yielded
        );
    }
}

/// Expands a listing URL template for the given page number
///
/// URLs without a `{page}` placeholder are returned unchanged.
pub fn page_url(template: &str, page: usize) -> String {
    template.replace(PAGE_PLACEHOLDER, &page.to_string())
}

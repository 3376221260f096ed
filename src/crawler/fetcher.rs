//! Page fetching
//!
//! This module holds the fetch boundary of the harvester:
//! - The `PageFetcher` trait the paginator and extractor fetch through
//! - `HttpFetcher`, the reqwest implementation used by the CLI
//! - Failure classification (transient vs permanent)
//! - Bounded retry with exponential backoff and cooperative cancellation

use crate::config::FetcherConfig;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What kind of page is being fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// A category listing page
    Listing,

    /// An item detail page
    Detail,
}

/// Fetches a page body
///
/// Implementations report failures as `FetchError` with a transient or
/// permanent kind; retrying is left to the caller.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, kind: PageKind) -> Result<String, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Returns true for HTTP statuses worth retrying
///
/// | Status | Kind |
/// |--------|------|
/// | 408, 425, 429 | Transient |
/// | 5xx | Transient |
/// | any other non-success | Permanent |
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 425 | 429) || status.is_server_error()
}

/// `PageFetcher` backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, kind: PageKind) -> Result<String, FetchError> {
        tracing::trace!("GET {} ({:?})", url, kind);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Err(classify_request_error(url, &e)),
        };

        let status = response.status();
        if !status.is_success() {
            let message = format!("HTTP {}", status.as_u16());
            return if is_transient_status(status) {
                Err(FetchError::transient(url, message))
            } else {
                Err(FetchError::permanent(url, message))
            };
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::permanent(url, format!("Failed to read body: {}", e)))
    }
}

/// Classifies a reqwest error that occurred before a response arrived
fn classify_request_error(url: &str, e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::transient(url, "Request timeout")
    } else if e.is_connect() {
        FetchError::transient(url, format!("Connection failed: {}", e))
    } else if e.is_builder() {
        FetchError::permanent(url, format!("Invalid request: {}", e))
    } else if e.is_request() {
        FetchError::transient(url, e.to_string())
    } else {
        FetchError::permanent(url, e.to_string())
    }
}

/// How often and how patiently a page fetch is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Delay after the first failed attempt; doubled after each further one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            max_attempts: config.retry_attempts.max(1),
            base_delay: Duration::from_millis(config.backoff_base_ms),
        }
    }

    /// Backoff before the attempt following failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Why `fetch_with_retry` gave up
#[derive(Debug, Clone)]
pub enum FetchFailure {
    /// The last attempt failed permanently or the retry budget ran out
    Fetch(FetchError),

    /// The run was cancelled before the page could be fetched
    Cancelled,
}

/// Fetches a page, retrying transient failures with exponential backoff
///
/// Cancellation is checked before every attempt and while backing off; a fetch
/// already in flight is allowed to finish.
pub async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    url: &str,
    kind: PageKind,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<String, FetchFailure> {
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchFailure::Cancelled);
        }

        attempt += 1;
        match fetcher.fetch(url, kind).await {
            Ok(body) => return Ok(body),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::debug!(
                    "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                    attempt,
                    policy.max_attempts,
                    url,
                    e.message,
                    delay
                );

                tokio::select! {
                    _ = cancel.cancelled() => return Err(FetchFailure::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => return Err(FetchFailure::Fetch(e)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{fast_retry, ScriptedFetcher};
    use super::*;

    const URL: &str = "https://apps.example.com/acme";

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&FetcherConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::REQUEST_TIMEOUT));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_transient_status(StatusCode::from_u16(425).unwrap()));

        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::FORBIDDEN));
        assert!(!is_transient_status(StatusCode::GONE));
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_policy_from_config() {
        let config = FetcherConfig {
            retry_attempts: 5,
            backoff_base_ms: 250,
            ..FetcherConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let fetcher = ScriptedFetcher::new().page(URL, "<html></html>");
        let body = fetch_with_retry(
            &fetcher,
            URL,
            PageKind::Detail,
            &fast_retry(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(body, "<html></html>");
        assert_eq!(fetcher.call_count(URL), 1);
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let fetcher = ScriptedFetcher::new().script(
            URL,
            vec![
                Err(FetchError::transient(URL, "HTTP 503")),
                Err(FetchError::transient(URL, "timeout")),
                Ok("body".to_string()),
            ],
        );

        let body = fetch_with_retry(
            &fetcher,
            URL,
            PageKind::Detail,
            &fast_retry(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(body, "body");
        assert_eq!(fetcher.call_count(URL), 3);
    }

    #[tokio::test]
    async fn test_transient_exhausts_budget() {
        let fetcher = ScriptedFetcher::new().transient(URL);

        let result = fetch_with_retry(
            &fetcher,
            URL,
            PageKind::Listing,
            &fast_retry(),
            &CancellationToken::new(),
        )
        .await;

        match result {
            Err(FetchFailure::Fetch(e)) => assert!(e.is_transient()),
            other => panic!("expected fetch failure, got {:?}", other),
        }
        assert_eq!(fetcher.call_count(URL), 3);
    }

    #[tokio::test]
    async fn test_permanent_gives_up_at_once() {
        let fetcher = ScriptedFetcher::new().permanent(URL);

        let result = fetch_with_retry(
            &fetcher,
            URL,
            PageKind::Listing,
            &fast_retry(),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(FetchFailure::Fetch(_))));
        assert_eq!(fetcher.call_count(URL), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_fetch() {
        let fetcher = ScriptedFetcher::new().page(URL, "body");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetch_with_retry(&fetcher, URL, PageKind::Detail, &fast_retry(), &cancel).await;

        assert!(matches!(result, Err(FetchFailure::Cancelled)));
        assert_eq!(fetcher.call_count(URL), 0);
    }

    #[tokio::test]
    async fn test_cancelled_during_backoff() {
        let fetcher = ScriptedFetcher::new().transient(URL);
        let cancel = CancellationToken::new();
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
        };

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = fetch_with_retry(&fetcher, URL, PageKind::Detail, &policy, &cancel).await;

        assert!(matches!(result, Err(FetchFailure::Cancelled)));
        assert_eq!(fetcher.call_count(URL), 1);
    }
}

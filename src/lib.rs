//! Catalog-Harvest: a category-driven app catalog harvester
//!
//! This crate walks the paginated category listings of a web catalog, extracts
//! every listed item's detail page into a uniform record, deduplicates items across
//! categories and hands the resulting rows to pluggable sinks (SQLite, CSV, XLSX).

pub mod config;
pub mod crawler;
pub mod models;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Catalog-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Run task failed: {0}")]
    Task(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// How a failed page fetch should be treated by the retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Worth retrying (timeouts, connection resets, 429, 5xx)
    Transient,

    /// Retrying cannot help (404, other 4xx, malformed URL)
    Permanent,
}

/// A failed fetch of a single page
#[derive(Debug, Clone, Error)]
#[error("{kind:?} fetch error for {url}: {message}")]
pub struct FetchError {
    pub url: String,
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn transient(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: FetchErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: FetchErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FetchErrorKind::Transient
    }
}

/// Result type alias for Catalog-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    harvest, CategorySelector, Deduplicator, HarvestOutcome, ItemExtractor, ListingPaginator,
    Normalizer, RecordStream, RunCoordinator, RunSettings,
};
pub use models::{CanonicalRecord, CategoryJob, ItemStub, RawRecord};
pub use output::{RecordSink, RunReport};
pub use state::{EndReason, FetchStatus, PaginationState};
pub use url::identity_key;

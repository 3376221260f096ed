use serde::Deserialize;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    pub catalog: CatalogConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "category")]
    pub categories: Vec<CategoryEntry>,
}

/// Selection and volume limits for a single run
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Category ids to harvest; empty means "the first `max-categories`"
    #[serde(rename = "selected-categories", default)]
    pub selected_categories: Vec<u32>,

    /// Upper bound on categories processed, always enforced
    #[serde(rename = "max-categories", default = "default_max_categories")]
    pub max_categories: usize,

    /// Item cap per category
    #[serde(rename = "products-per-category", default = "default_products_per_category")]
    pub products_per_category: usize,

    /// Number of concurrent detail page extractions
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Maximum number of listing pages fetched per category
    #[serde(rename = "page-cap-per-category", default = "default_page_cap")]
    pub page_cap_per_category: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            selected_categories: Vec::new(),
            max_categories: default_max_categories(),
            products_per_category: default_products_per_category(),
            concurrency: default_concurrency(),
            page_cap_per_category: default_page_cap(),
        }
    }
}

/// HTTP fetch behavior
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts for a page, including the first
    #[serde(rename = "retry-attempts", default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay before the first retry; doubled on each further retry (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

/// The catalog being harvested
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Root under which item detail pages live
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// First path segments that are never item pages; defaults apply when empty
    #[serde(rename = "reserved-paths", default)]
    pub reserved_paths: Vec<String>,

    /// Value written to every record's `reviews_source`
    #[serde(rename = "reviews-source", default = "default_reviews_source")]
    pub reviews_source: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,

    /// Directory for CSV and XLSX exports; no export files are written when unset
    #[serde(rename = "export-dir", alias = "csv-dir", default)]
    pub export_dir: Option<String>,

    #[serde(rename = "export-csv", default = "default_true")]
    pub export_csv: bool,

    #[serde(rename = "export-xlsx", default = "default_true")]
    pub export_xlsx: bool,

    /// Also write one file per category next to the combined one
    #[serde(rename = "per-category", alias = "per-category-csv", default = "default_true")]
    pub per_category: bool,
}

/// One row of the category table
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    pub id: u32,
    pub name: String,

    /// First listing page, or a template containing `{page}`
    pub url: String,

    #[serde(default)]
    pub description: Option<String>,
}

fn default_max_categories() -> usize {
    1
}

fn default_products_per_category() -> usize {
    30
}

fn default_concurrency() -> usize {
    4
}

fn default_page_cap() -> usize {
    10
}

fn default_user_agent() -> String {
    format!("catalog-harvest/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_reviews_source() -> String {
    "shopify_app_store".to_string()
}

fn default_true() -> bool {
    true
}

use crate::config::types::{
    CatalogConfig, CategoryEntry, Config, FetcherConfig, OutputConfig, RunConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Upper bound on the extraction worker pool
pub const MAX_CONCURRENCY: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_run_config(&config.run)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_catalog_config(&config.catalog)?;
    validate_output_config(&config.output)?;
    validate_categories(&config.categories)?;
    Ok(())
}

/// Validates run limits
///
/// Exposed separately so command-line overrides can be re-checked.
pub fn validate_run_config(config: &RunConfig) -> Result<(), ConfigError> {
    if config.max_categories < 1 {
        return Err(ConfigError::Validation(format!(
            "max-categories must be >= 1, got {}",
            config.max_categories
        )));
    }

    if config.concurrency < 1 || config.concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.concurrency
        )));
    }

    if config.page_cap_per_category < 1 {
        return Err(ConfigError::Validation(format!(
            "page-cap-per-category must be >= 1, got {}",
            config.page_cap_per_category
        )));
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.retry_attempts < 1 || config.retry_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "retry-attempts must be between 1 and 10, got {}",
            config.retry_attempts
        )));
    }

    Ok(())
}

/// Validates the catalog root
fn validate_catalog_config(config: &CatalogConfig) -> Result<(), ConfigError> {
    validate_http_url(&config.base_url, "base-url")?;

    if config.reviews_source.trim().is_empty() {
        return Err(ConfigError::Validation(
            "reviews-source cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary-path cannot be empty".to_string(),
        ));
    }

    if matches!(config.export_dir.as_deref(), Some("")) {
        return Err(ConfigError::Validation(
            "export-dir cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates the category table
fn validate_categories(categories: &[CategoryEntry]) -> Result<(), ConfigError> {
    if categories.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[category]] entry is required".to_string(),
        ));
    }

    let mut ids = HashSet::new();
    for entry in categories {
        if !ids.insert(entry.id) {
            return Err(ConfigError::Validation(format!(
                "duplicate category id {}",
                entry.id
            )));
        }

        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "category {} has an empty name",
                entry.id
            )));
        }

        // Page templates are validated with the first page substituted in
        let url = entry.url.replace("{page}", "1");
        validate_http_url(&url, &format!("category {} url", entry.id))?;
    }

    Ok(())
}

fn validate_http_url(value: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use HTTP or HTTPS",
            what, value
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            what, value
        )));
    }

    Ok(())
}

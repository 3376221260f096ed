use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use catalog_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("{} categories in table", config.categories.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Stored with every run so runs made with different settings can be told apart.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID_CONFIG: &str = r#"
[run]
selected-categories = [2]
max-categories = 2
products-per-category = 5
concurrency = 2

[fetcher]
timeout-secs = 10
retry-attempts = 3

[catalog]
base-url = "https://apps.example.com"

[output]
database-path = "./test.db"
summary-path = "./summary.md"
export-dir = "./out"
export-xlsx = false

[[category]]
id = 1
name = "Sales channels"
url = "https://apps.example.com/categories/sales-channels"

[[category]]
id = 2
name = "Marketing"
url = "https://apps.example.com/categories/marketing?page={page}"
description = "Grow your audience"
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.run.selected_categories, vec![2]);
        assert_eq!(config.run.max_categories, 2);
        assert_eq!(config.run.products_per_category, 5);
        assert_eq!(config.run.page_cap_per_category, 10);
        assert_eq!(config.fetcher.timeout_secs, 10);
        assert_eq!(config.fetcher.backoff_base_ms, 500);
        assert_eq!(config.catalog.reviews_source, "shopify_app_store");
        assert_eq!(config.output.export_dir.as_deref(), Some("./out"));
        assert!(config.output.export_csv);
        assert!(!config.output.export_xlsx);
        assert!(config.output.per_category);
        assert_eq!(config.categories.len(), 2);
        assert_eq!(
            config.categories[1].description.as_deref(),
            Some("Grow your audience")
        );
    }

    #[test]
    fn test_defaults_for_omitted_tables() {
        let config = parse_config(
            r#"
[catalog]
base-url = "https://apps.example.com"

[output]
database-path = "./test.db"
summary-path = "./summary.md"

[[category]]
id = 1
name = "Sales channels"
url = "https://apps.example.com/categories/sales-channels"
"#,
        )
        .unwrap();

        assert!(config.run.selected_categories.is_empty());
        assert_eq!(config.run.max_categories, 1);
        assert_eq!(config.run.products_per_category, 30);
        assert_eq!(config.run.concurrency, 4);
        assert_eq!(config.fetcher.retry_attempts, 3);
        assert!(config.output.export_dir.is_none());
        assert!(config.output.export_csv);
        assert!(config.output.export_xlsx);
    }

    #[test]
    fn test_csv_dir_key_still_accepted() {
        let config = parse_config(
            r#"
[catalog]
base-url = "https://apps.example.com"

[output]
database-path = "./test.db"
summary-path = "./summary.md"
csv-dir = "./exports"
per-category-csv = false

[[category]]
id = 1
name = "Sales channels"
url = "https://apps.example.com/categories/sales-channels"
"#,
        )
        .unwrap();

        assert_eq!(config.output.export_dir.as_deref(), Some("./exports"));
        assert!(!config.output.per_category);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result.unwrap_err(), ConfigError::Io(_)));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = VALID_CONFIG.replace("concurrency = 2", "concurrency = 0");
        let file = create_temp_config(&content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_load_config_with_hash() {
        let file = create_temp_config(VALID_CONFIG);
        let (config, hash) = load_config_with_hash(file.path()).unwrap();

        assert_eq!(config.categories.len(), 2);
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
    }
}

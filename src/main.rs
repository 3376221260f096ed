//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the Catalog-Harvest catalog harvester.

use anyhow::Context;
use catalog_harvest::config::{load_config_with_hash, validate_run_config, Config};
use catalog_harvest::crawler::{harvest, CategorySelector};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a category-driven app catalog harvester
///
/// Catalog-Harvest walks the listing pages of the configured categories,
/// extracts every listed app's detail page and stores one deduplicated row
/// per app in SQLite, CSV and XLSX.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version)]
#[command(about = "A category-driven app catalog harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Category id to harvest; repeat for several (overrides the config)
    #[arg(long = "category", value_name = "ID")]
    categories: Vec<u32>,

    /// Upper bound on categories processed
    #[arg(long, value_name = "N")]
    max_categories: Option<usize>,

    /// Item cap per category
    #[arg(long, value_name = "N")]
    products_per_category: Option<usize>,

    /// Number of concurrent detail page extractions
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Cancel the run after this many seconds, keeping what was harvested
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Validate config and show which categories would be harvested
    #[arg(long, conflicts_with_all = ["stats", "list_categories"])]
    dry_run: bool,

    /// Show statistics of the latest run from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "list_categories"])]
    stats: bool,

    /// Print the category table and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    list_categories: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    apply_overrides(&mut config, &cli).context("Invalid command-line limits")?;

    if cli.list_categories {
        handle_list_categories(&config);
    } else if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_harvest(&config, &config_hash, cli.timeout).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies command-line limits on top of the configured ones
fn apply_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if !cli.categories.is_empty() {
        config.run.selected_categories = cli.categories.clone();
    }
    if let Some(max) = cli.max_categories {
        config.run.max_categories = max;
    }
    if let Some(per_category) = cli.products_per_category {
        config.run.products_per_category = per_category;
    }
    if let Some(concurrency) = cli.concurrency {
        config.run.concurrency = concurrency;
    }

    validate_run_config(&config.run)?;
    Ok(())
}

/// Handles the --list-categories mode: prints the category table
fn handle_list_categories(config: &Config) {
    println!("=== Categories ({}) ===\n", config.categories.len());
    for entry in &config.categories {
        match &entry.description {
            Some(description) => println!("  [{}] {} - {}", entry.id, entry.name, description),
            None => println!("  [{}] {}", entry.id, entry.name),
        }
        println!("      {}", entry.url);
    }
}

/// Handles the --dry-run mode: validates config and shows the resolved jobs
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Catalog-Harvest Dry Run ===\n");

    println!("Catalog:");
    println!("  Base URL: {}", config.catalog.base_url);
    println!("  Reviews source: {}", config.catalog.reviews_source);

    println!("\nLimits:");
    println!("  Max categories: {}", config.run.max_categories);
    println!("  Products per category: {}", config.run.products_per_category);
    println!("  Page cap per category: {}", config.run.page_cap_per_category);
    println!("  Concurrency: {}", config.run.concurrency);

    println!("\nFetcher:");
    println!("  User agent: {}", config.fetcher.user_agent);
    println!("  Timeout: {}s", config.fetcher.timeout_secs);
    println!("  Retry attempts: {}", config.fetcher.retry_attempts);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);
    match &config.output.export_dir {
        Some(dir) => {
            println!("  Export directory: {}", dir);
            println!(
                "  Formats: {}{}",
                if config.output.export_csv { "csv " } else { "" },
                if config.output.export_xlsx { "xlsx" } else { "" }
            );
        }
        None => println!("  Export directory: (disabled)"),
    }

    let jobs = CategorySelector::new(config.categories.clone()).resolve(
        &config.run.selected_categories,
        config.run.max_categories,
        config.run.products_per_category,
    )?;

    println!("\nCategories to harvest ({}):", jobs.len());
    for job in &jobs {
        println!(
            "  - [{}] {} (up to {} items)",
            job.category_id, job.category_name, job.target_item_count
        );
        println!("    {}", job.listing_url);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would harvest up to {} items",
        jobs.iter().map(|j| j.target_item_count).sum::<usize>()
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use catalog_harvest::output::{load_statistics, print_statistics};
    use catalog_harvest::storage::SqliteStorage;
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    match load_statistics(&storage)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No runs recorded yet."),
    }

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: &Config,
    config_hash: &str,
    timeout: Option<u64>,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight work");
            ctrl_c.cancel();
        }
    });

    if let Some(secs) = timeout {
        let deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            tracing::warn!("Run timeout of {}s reached, cancelling", secs);
            deadline.cancel();
        });
    }

    tracing::info!(
        "Harvesting up to {} categories, {} items each, {} workers",
        config.run.max_categories,
        config.run.products_per_category,
        config.run.concurrency
    );

    let outcome = harvest(config, config_hash, cancel)
        .await
        .context("Harvest failed")?;

    let report = &outcome.report;
    if report.cancelled {
        tracing::warn!("Run {} was cancelled", outcome.run_id);
    }

    println!(
        "Run {}: {} records from {} categories ({} duplicates skipped, {} failed)",
        outcome.run_id,
        report.records_emitted,
        report.categories.len(),
        report.duplicates_skipped,
        report.extracted_failed
    );
    for file in &outcome.files {
        println!("  {}", file.display());
    }
    println!("Summary: {}", outcome.summary_path.display());

    Ok(())
}

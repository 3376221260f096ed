//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! statistics about the latest stored run.

use crate::storage::{CategoryResultRecord, RunRecord, Storage};
use crate::HarvestError;

/// Statistics of one stored run
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    pub run: RunRecord,

    /// Records stored for the run
    pub total_records: u64,

    /// Record counts per category, largest first
    pub records_by_category: Vec<(String, u64)>,

    /// Mean rating over records that have one
    pub average_rating: Option<f64>,

    /// Stored per-category outcomes
    pub category_results: Vec<CategoryResultRecord>,
}

/// Loads statistics for the most recent run
///
/// # Returns
///
/// * `Ok(Some(HarvestStatistics))` - Statistics of the latest run
/// * `Ok(None)` - The database holds no runs
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<Option<HarvestStatistics>, HarvestError> {
    let Some(run) = storage.get_latest_run()? else {
        return Ok(None);
    };

    let total_records = storage.count_records(run.id)?;
    let records_by_category = storage.count_records_by_category(run.id)?;
    let average_rating = storage.average_rating(run.id)?;
    let category_results = storage.get_category_results(run.id)?;

    Ok(Some(HarvestStatistics {
        run,
        total_records,
        records_by_category,
        average_rating,
        category_results,
    }))
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    let run = &stats.run;

    println!("=== Harvest Statistics ===\n");

    println!("Run {}:", run.id);
    println!("  Status: {}", run.status.to_db_string());
    println!("  Started: {}", run.started_at);
    if let Some(finished) = &run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!("  Config hash: {}", run.config_hash);
    println!();

    println!("Overview:");
    println!("  Records stored: {}", stats.total_records);
    println!("  Complete extractions: {}", run.extracted_ok);
    println!("  Partial extractions: {}", run.extracted_partial);
    println!("  Failed extractions: {}", run.extracted_failed);
    println!("  Duplicates skipped: {}", run.duplicates_skipped);
    match stats.average_rating {
        Some(avg) => println!("  Average rating: {:.2}", avg),
        None => println!("  Average rating: n/a"),
    }
    println!();

    if !stats.records_by_category.is_empty() {
        println!("Records by Category:");
        for (category, count) in &stats.records_by_category {
            let percentage = if stats.total_records > 0 {
                (*count as f64 / stats.total_records as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", category, count, percentage);
        }
        println!();
    }

    if !stats.category_results.is_empty() {
        println!("Category Outcomes:");
        for result in &stats.category_results {
            println!(
                "  [{}] {}: {} ({}), {} pages, {} stubs",
                result.category_id,
                result.category_name,
                result.state,
                result.end_reason.as_deref().unwrap_or("-"),
                result.pages_fetched,
                result.stubs_discovered
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalRecord;
    use crate::storage::SqliteStorage;
    use chrono::Utc;

    #[test]
    fn test_load_statistics_empty_database() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(load_statistics(&storage).unwrap().is_none());
    }

    #[test]
    fn test_load_statistics_latest_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let _old = storage.create_run("old").unwrap();
        let run_id = storage.create_run("new").unwrap();

        for (i, category) in ["Sales", "Sales", "Support"].iter().enumerate() {
            let url = format!("https://apps.example.com/app-{}", i);
            storage
                .insert_record(
                    run_id,
                    &CanonicalRecord {
                        category: category.to_string(),
                        identity_key: url.clone(),
                        app_name: format!("App {}", i),
                        app_url: url,
                        short_description: None,
                        full_description: None,
                        developer_name: None,
                        developer_website: None,
                        price: None,
                        rating: Some(4.0),
                        reviews_count: None,
                        reviews_source: "shopify_app_store".to_string(),
                        scraped_at: Utc::now(),
                    },
                )
                .unwrap();
        }

        let stats = load_statistics(&storage).unwrap().unwrap();

        assert_eq!(stats.run.id, run_id);
        assert_eq!(stats.run.config_hash, "new");
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.records_by_category[0], ("Sales".to_string(), 2));
        assert_eq!(stats.average_rating, Some(4.0));
    }
}

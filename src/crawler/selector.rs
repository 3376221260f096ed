//! Category selection and limit resolution

use crate::config::CategoryEntry;
use crate::models::CategoryJob;
use crate::ConfigError;
use std::collections::HashSet;

/// Resolves the requested categories against the category table
#[derive(Debug, Clone)]
pub struct CategorySelector {
    table: Vec<CategoryEntry>,
}

impl CategorySelector {
    pub fn new(table: Vec<CategoryEntry>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &[CategoryEntry] {
        &self.table
    }

    /// Builds the ordered list of category jobs for a run
    ///
    /// # Selection Rules
    ///
    /// | `selected` | Result |
    /// |------------|--------|
    /// | empty | first `max_categories` table entries |
    /// | non-empty | table entries whose id is selected, in table order, truncated to `max_categories` |
    ///
    /// Unknown ids are ignored and repeated ids count once. Every job gets
    /// `per_category_cap` as its item target.
    ///
    /// # Errors
    ///
    /// `ConfigError::Validation` when the table is empty or `max_categories` is 0.
    pub fn resolve(
        &self,
        selected: &[u32],
        max_categories: usize,
        per_category_cap: usize,
    ) -> Result<Vec<CategoryJob>, ConfigError> {
        if self.table.is_empty() {
            return Err(ConfigError::Validation(
                "category table is empty".to_string(),
            ));
        }

        if max_categories < 1 {
            return Err(ConfigError::Validation(format!(
                "max-categories must be >= 1, got {}",
                max_categories
            )));
        }

        let wanted: HashSet<u32> = selected.iter().copied().collect();

        for id in &wanted {
            if !self.table.iter().any(|entry| entry.id == *id) {
                tracing::debug!("Ignoring unknown category id {}", id);
            }
        }

        let jobs: Vec<CategoryJob> = self
            .table
            .iter()
            .filter(|entry| wanted.is_empty() || wanted.contains(&entry.id))
            .take(max_categories)
            .map(|entry| CategoryJob {
                category_id: entry.id,
                category_name: entry.name.clone(),
                target_item_count: per_category_cap,
                listing_url: entry.url.clone(),
            })
            .collect();

        if !wanted.is_empty() && jobs.is_empty() {
            tracing::warn!("None of the selected categories exist in the category table");
        }

        Ok(jobs)
    }
}

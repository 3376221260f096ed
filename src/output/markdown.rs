//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a harvest run:
//! run metadata, the limits it ran with, per-category outcomes and the files
//! it produced.

use crate::config::RunConfig;
use crate::output::traits::{OutputResult, RunReport};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Everything the run summary reports on
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    /// Database run id, when the run was persisted
    pub run_id: Option<i64>,
    pub config_hash: String,

    /// Limits the run was executed with
    pub limits: RunConfig,

    pub report: RunReport,

    /// Export files generated by the run
    pub files: Vec<PathBuf>,
}

impl HarvestSummary {
    pub fn status(&self) -> &'static str {
        if self.report.cancelled {
            "interrupted"
        } else {
            "completed"
        }
    }
}

/// Writes the markdown summary of a run to `output_path`
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(summary: &HarvestSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &HarvestSummary) -> String {
    let report = &summary.report;
    let mut md = String::new();

    md.push_str("# Catalog Harvest Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    if let Some(run_id) = summary.run_id {
        md.push_str(&format!("- **Run ID**: {}\n", run_id));
    }
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", report.finished_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Duration**: {} seconds\n",
        report.duration_seconds()
    ));
    md.push_str(&format!("- **Status**: {}\n", summary.status()));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    // Limits
    let limits = &summary.limits;
    md.push_str("## Limits\n\n");
    if limits.selected_categories.is_empty() {
        md.push_str("- **Selected Categories**: first in table order\n");
    } else {
        let ids: Vec<String> = limits
            .selected_categories
            .iter()
            .map(|id| id.to_string())
            .collect();
        md.push_str(&format!("- **Selected Categories**: {}\n", ids.join(", ")));
    }
    md.push_str(&format!("- **Max Categories**: {}\n", limits.max_categories));
    md.push_str(&format!(
        "- **Products per Category**: {}\n",
        limits.products_per_category
    ));
    md.push_str(&format!(
        "- **Page Cap per Category**: {}\n",
        limits.page_cap_per_category
    ));
    md.push_str(&format!("- **Concurrency**: {}\n\n", limits.concurrency));

    // Totals
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Records Emitted**: {}\n", report.records_emitted));
    md.push_str(&format!("- **Complete Extractions**: {}\n", report.extracted_ok));
    md.push_str(&format!(
        "- **Partial Extractions**: {}\n",
        report.extracted_partial
    ));
    md.push_str(&format!(
        "- **Failed Extractions**: {}\n",
        report.extracted_failed
    ));
    md.push_str(&format!(
        "- **Duplicates Skipped**: {}\n",
        report.duplicates_skipped
    ));
    if report.skipped_cancelled > 0 {
        md.push_str(&format!(
            "- **Skipped After Cancellation**: {}\n",
            report.skipped_cancelled
        ));
    }
    md.push_str(&format!("- **Success Rate**: {:.2}%\n\n", report.success_rate()));

    // Per-category outcomes
    if !report.categories.is_empty() {
        md.push_str("## Categories\n\n");
        md.push_str("| ID | Category | Target | Pages | Stubs | Records | Outcome |\n");
        md.push_str("|----|----------|--------|-------|-------|---------|---------|\n");

        for category in &report.categories {
            let outcome = match category.end_reason {
                Some(reason) => format!("{} ({})", category.state, reason),
                None => category.state.to_string(),
            };
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} |\n",
                category.category_id,
                category.category_name,
                category.target_item_count,
                category.pages_fetched,
                category.stubs_discovered,
                category.records_emitted,
                outcome
            ));
        }
        md.push('\n');
    }

    // Generated files
    md.push_str("## Files Generated\n\n");
    if summary.files.is_empty() {
        md.push_str("No export files were written.\n");
    } else {
        for file in &summary.files {
            md.push_str(&format!("- {}\n", file.display()));
        }
    }

    md
}

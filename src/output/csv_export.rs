//! CSV export of canonical records
//!
//! One combined file per run and, optionally, one file per category. Files are
//! created on the first record they receive, so an empty run leaves no files
//! behind.

use crate::models::CanonicalRecord;
use crate::output::export_names::ExportNames;
use crate::output::traits::{OutputResult, RecordSink, RunReport};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::PathBuf;

/// Record sink writing CSV files into a directory
pub struct CsvExporter {
    dir: PathBuf,
    names: ExportNames,
    per_category: bool,
    combined: Option<csv::Writer<File>>,
    by_category: BTreeMap<String, csv::Writer<File>>,
    files: Vec<PathBuf>,
}

impl CsvExporter {
    /// Creates an exporter stamping file names with the current time
    pub fn new(dir: impl Into<PathBuf>, per_category: bool) -> Self {
        Self::with_timestamp(dir, per_category, Utc::now())
    }

    pub fn with_timestamp(dir: impl Into<PathBuf>, per_category: bool, at: DateTime<Utc>) -> Self {
        Self {
            dir: dir.into(),
            names: ExportNames::new(at),
            per_category,
            combined: None,
            by_category: BTreeMap::new(),
            files: Vec::new(),
        }
    }

    /// Files created so far, in creation order
    pub fn files_written(&self) -> &[PathBuf] {
        &self.files
    }

    fn open(&mut self, name: String) -> OutputResult<csv::Writer<File>> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        let writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_path(&path)?;

        tracing::debug!("Opened CSV export {}", path.display());
        self.files.push(path);
        Ok(writer)
    }
}

impl RecordSink for CsvExporter {
    fn write_record(&mut self, record: &CanonicalRecord) -> OutputResult<()> {
        if self.combined.is_none() {
            let name = self.names.combined("csv");
            self.combined = Some(self.open(name)?);
        }
        if let Some(writer) = self.combined.as_mut() {
            writer.serialize(record)?;
        }

        if self.per_category {
            if !self.by_category.contains_key(&record.category) {
                let name = self.names.category(&record.category, "csv");
                let writer = self.open(name)?;
                self.by_category.insert(record.category.clone(), writer);
            }
            if let Some(writer) = self.by_category.get_mut(&record.category) {
                writer.serialize(record)?;
            }
        }

        Ok(())
    }

    fn finalize(&mut self, _report: &RunReport) -> OutputResult<()> {
        if let Some(writer) = self.combined.as_mut() {
            writer.flush()?;
        }
        for writer in self.by_category.values_mut() {
            writer.flush()?;
        }

        if self.files.is_empty() {
            tracing::info!("No records harvested, no CSV files written");
        } else {
            for file in &self.files {
                tracing::info!("Wrote {}", file.display());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(key: &str, category: &str) -> CanonicalRecord {
        CanonicalRecord {
            category: category.to_string(),
            identity_key: key.to_string(),
            app_name: "Acme, Inc".to_string(),
            app_url: key.to_string(),
            short_description: Some("Does \"things\"".to_string()),
            full_description: None,
            developer_name: Some("Acme".to_string()),
            developer_website: None,
            price: Some("Free".to_string()),
            rating: Some(4.5),
            reviews_count: Some(120),
            reviews_source: "shopify_app_store".to_string(),
            scraped_at: Utc::now(),
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap()
    }

    #[test]
    fn test_combined_and_per_category_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = CsvExporter::with_timestamp(dir.path(), true, fixed_time());

        exporter
            .write_record(&record("https://apps.example.com/a", "Sales"))
            .unwrap();
        exporter
            .write_record(&record("https://apps.example.com/b", "Order management"))
            .unwrap();
        exporter
            .write_record(&record("https://apps.example.com/c", "Sales"))
            .unwrap();
        exporter.finalize(&RunReport::new()).unwrap();

        let names: Vec<String> = exporter
            .files_written()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "catalog_20240309_140500.csv",
                "catalog_sales_20240309_140500.csv",
                "catalog_order_management_20240309_140500.csv",
            ]
        );

        let mut reader = csv::Reader::from_path(&exporter.files_written()[0]).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "category");
        assert_eq!(&headers[1], "identity_key");
        assert_eq!(reader.records().count(), 3);

        let mut reader = csv::Reader::from_path(&exporter.files_written()[1]).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][2], "Acme, Inc");
    }

    #[test]
    fn test_categories_with_same_slug_keep_their_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = CsvExporter::with_timestamp(dir.path(), true, fixed_time());

        exporter
            .write_record(&record("https://a.example/x", "Sales & Marketing"))
            .unwrap();
        exporter
            .write_record(&record("https://a.example/y", "Sales Marketing"))
            .unwrap();
        exporter.finalize(&RunReport::new()).unwrap();

        let files = exporter.files_written();
        assert_eq!(files.len(), 3);
        let unique: std::collections::HashSet<_> = files.iter().collect();
        assert_eq!(unique.len(), 3);

        let first = dir.path().join("catalog_sales_marketing_20240309_140500.csv");
        let second = dir.path().join("catalog_sales_marketing_2_20240309_140500.csv");

        let mut reader = csv::Reader::from_path(&first).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], "https://a.example/x");

        let mut reader = csv::Reader::from_path(&second).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], "https://a.example/y");
    }

    #[test]
    fn test_combined_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = CsvExporter::with_timestamp(dir.path(), false, fixed_time());

        exporter
            .write_record(&record("https://apps.example.com/a", "Sales"))
            .unwrap();
        exporter.finalize(&RunReport::new()).unwrap();

        assert_eq!(exporter.files_written().len(), 1);
    }

    #[test]
    fn test_empty_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = CsvExporter::new(dir.path().join("exports"), true);

        exporter.finalize(&RunReport::new()).unwrap();

        assert!(exporter.files_written().is_empty());
        assert!(!dir.path().join("exports").exists());
    }
}

//! XLSX export of canonical records
//!
//! Same file layout as the CSV export, with one `apps` sheet per workbook.
//! Rows are buffered while the run is going and the workbooks are written in
//! `finalize`; an empty run writes nothing.

use crate::models::CanonicalRecord;
use crate::output::export_names::ExportNames;
use crate::output::traits::{OutputError, OutputResult, RecordSink, RunReport};
use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the sheet holding the records
pub const SHEET_NAME: &str = "apps";

/// Header row, in `CanonicalRecord` field order
const COLUMNS: [&str; 13] = [
    "category",
    "identity_key",
    "app_name",
    "app_url",
    "short_description",
    "full_description",
    "developer_name",
    "developer_website",
    "price",
    "rating",
    "reviews_count",
    "reviews_source",
    "scraped_at",
];

/// Rows waiting to be written to one workbook
#[derive(Debug)]
struct PendingWorkbook {
    file_name: String,
    rows: Vec<CanonicalRecord>,
}

/// Record sink writing XLSX workbooks into a directory
pub struct XlsxExporter {
    dir: PathBuf,
    names: ExportNames,
    per_category: bool,
    combined: Vec<CanonicalRecord>,
    by_category: Vec<PendingWorkbook>,
    category_index: HashMap<String, usize>,
    files: Vec<PathBuf>,
}

impl XlsxExporter {
    /// Creates an exporter stamping file names with the current time
    pub fn new(dir: impl Into<PathBuf>, per_category: bool) -> Self {
        Self::with_timestamp(dir, per_category, Utc::now())
    }

    pub fn with_timestamp(dir: impl Into<PathBuf>, per_category: bool, at: DateTime<Utc>) -> Self {
        Self {
            dir: dir.into(),
            names: ExportNames::new(at),
            per_category,
            combined: Vec::new(),
            by_category: Vec::new(),
            category_index: HashMap::new(),
            files: Vec::new(),
        }
    }

    /// Workbooks written by `finalize`, combined first
    pub fn files_written(&self) -> &[PathBuf] {
        &self.files
    }
}

impl RecordSink for XlsxExporter {
    fn write_record(&mut self, record: &CanonicalRecord) -> OutputResult<()> {
        self.combined.push(record.clone());

        if self.per_category {
            let index = match self.category_index.get(&record.category) {
                Some(index) => *index,
                None => {
                    let file_name = self.names.category(&record.category, "xlsx");
                    self.by_category.push(PendingWorkbook {
                        file_name,
                        rows: Vec::new(),
                    });
                    let index = self.by_category.len() - 1;
                    self.category_index.insert(record.category.clone(), index);
                    index
                }
            };
            self.by_category[index].rows.push(record.clone());
        }

        Ok(())
    }

    fn finalize(&mut self, _report: &RunReport) -> OutputResult<()> {
        if self.combined.is_empty() {
            tracing::info!("No records harvested, no XLSX files written");
            return Ok(());
        }

        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(self.names.combined("xlsx"));
        write_workbook(&path, &self.combined)?;
        self.files.push(path);

        for pending in &self.by_category {
            let path = self.dir.join(&pending.file_name);
            write_workbook(&path, &pending.rows)?;
            self.files.push(path);
        }

        for file in &self.files {
            tracing::info!("Wrote {}", file.display());
        }

        Ok(())
    }
}

/// Writes `records` as a single-sheet workbook with a header row
fn write_workbook(path: &Path, records: &[CanonicalRecord]) -> OutputResult<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, title) in (0u16..).zip(COLUMNS) {
        sheet.write_string(0, col, title)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = u32::try_from(index + 1)
            .map_err(|_| OutputError::Format(format!("too many rows for {}", path.display())))?;
        write_row(sheet, row, record)?;
    }

    workbook.save(path)?;
    Ok(())
}

fn write_row(sheet: &mut Worksheet, row: u32, record: &CanonicalRecord) -> Result<(), XlsxError> {
    sheet.write_string(row, 0, record.category.as_str())?;
    sheet.write_string(row, 1, record.identity_key.as_str())?;
    sheet.write_string(row, 2, record.app_name.as_str())?;
    sheet.write_string(row, 3, record.app_url.as_str())?;

    let optional = [
        (4, &record.short_description),
        (5, &record.full_description),
        (6, &record.developer_name),
        (7, &record.developer_website),
        (8, &record.price),
    ];
    for (col, value) in optional {
        if let Some(value) = value {
            sheet.write_string(row, col, value.as_str())?;
        }
    }

    if let Some(rating) = record.rating {
        sheet.write_number(row, 9, rating)?;
    }
    if let Some(count) = record.reviews_count {
        sheet.write_number(row, 10, count as f64)?;
    }

    sheet.write_string(row, 11, record.reviews_source.as_str())?;
    sheet.write_string(row, 12, record.scraped_at.to_rfc3339())?;
    Ok(())
}

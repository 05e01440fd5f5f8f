//! Batch loader for a folder of headerless CSV exports.
//!
//! Every `*.csv` file in the uploads folder is read, each row mapped
//! positionally onto the configured column names. Example with
//! `date,name,cost,payment`:
//!
//! ```text
//! 01/05/2024,COFFEE SHOP #12,4.50,
//! 01/06/2024,PAYROLL ACME INC,,2500.00
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use budget_core::{BatchEntry, BatchSource, parse_money};
use csv::StringRecord;
use tracing::{debug, info};

use crate::dates::parse_mixed_date;
use crate::types::ColumnMapping;

/// Loads one run's batch from an uploads directory
#[derive(Debug, Clone)]
pub struct CsvBatchSource {
    dir: PathBuf,
    columns: ColumnMapping,
}

impl CsvBatchSource {
    pub fn new<S: AsRef<str>>(dir: impl Into<PathBuf>, column_names: &[S]) -> Result<Self> {
        Ok(Self {
            dir: dir.into(),
            columns: ColumnMapping::from_names(column_names)?,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// CSV files in the uploads directory, sorted by file name.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            bail!("Uploads folder not found: {}", self.dir.display());
        }

        let mut files = Vec::new();
        for item in fs::read_dir(&self.dir)
            .with_context(|| format!("read {}", self.dir.display()))?
        {
            let path = item?.path();
            let is_csv = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
            if is_csv && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            bail!("No CSV files found in uploads directory: {}", self.dir.display());
        }
        Ok(files)
    }

    /// Parse one export file.
    pub fn load_file(&self, path: &Path) -> Result<Vec<BatchEntry>> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("opening {}", path.display()))?;

        let mut entries = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let line = i + 1;
            let record = result.with_context(|| format!("{}:{line}", path.display()))?;
            if record.iter().all(|cell| cell.is_empty()) {
                debug!("{}:{line}: skipping blank row", path.display());
                continue;
            }
            let entry = self
                .parse_record(&record)
                .with_context(|| format!("{}:{line}", path.display()))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn parse_record(&self, record: &StringRecord) -> Result<BatchEntry> {
        let cell = |i: usize| record.get(i).unwrap_or("");

        let raw_date = cell(self.columns.date);
        let date = parse_mixed_date(raw_date)
            .with_context(|| format!("unrecognised date '{raw_date}'"))?;

        Ok(BatchEntry {
            date,
            name: cell(self.columns.name).to_string(),
            cost: parse_optional_amount(cell(self.columns.cost)).context("cost column")?,
            payment: parse_optional_amount(cell(self.columns.payment))
                .context("payment column")?,
        })
    }
}

impl BatchSource for CsvBatchSource {
    /// All files concatenated, then stably sorted by date.
    fn load_records(&mut self) -> Result<Vec<BatchEntry>> {
        info!("Loading CSV files from {}", self.dir.display());
        let files = self.discover()?;
        info!("Found {} CSV file(s)", files.len());

        let mut batch = Vec::new();
        for path in &files {
            info!(
                "Loading: {}",
                path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
            );
            let entries = self.load_file(path)?;
            debug!("Loaded {} rows from {}", entries.len(), path.display());
            batch.extend(entries);
        }

        batch.sort_by_key(|e| e.date);
        if let (Some(first), Some(last)) = (batch.first(), batch.last()) {
            debug!("Date range: {} to {}", first.date, last.date);
        }
        Ok(batch)
    }
}

fn parse_optional_amount(text: &str) -> Result<Option<f64>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    parse_money(text).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optional_amount() {
        assert_eq!(parse_optional_amount("").unwrap(), None);
        assert_eq!(parse_optional_amount("  ").unwrap(), None);
        assert_eq!(parse_optional_amount("$1,200.00").unwrap(), Some(1200.0));
        assert!(parse_optional_amount("twelve").is_err());
    }

    #[test]
    fn test_parse_record_positional() {
        let source = CsvBatchSource::new("unused", &["date", "name", "cost", "payment"]).unwrap();
        let record = StringRecord::from(vec!["01/05/2024", "COFFEE SHOP", "4.50", ""]);
        let entry = source.parse_record(&record).unwrap();
        assert_eq!(entry.date, chrono::NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(entry.name, "COFFEE SHOP");
        assert_eq!(entry.cost, Some(4.50));
        assert_eq!(entry.payment, None);
    }

    #[test]
    fn test_short_rows_fill_missing_cells() {
        let source = CsvBatchSource::new("unused", &["date", "name", "cost", "payment"]).unwrap();
        let record = StringRecord::from(vec!["2024-01-06", "PAYROLL"]);
        let entry = source.parse_record(&record).unwrap();
        assert_eq!(entry.cost, None);
        assert_eq!(entry.payment, None);
    }

    #[test]
    fn test_bad_date_is_reported() {
        let source = CsvBatchSource::new("unused", &["date", "name", "cost", "payment"]).unwrap();
        let record = StringRecord::from(vec!["Date", "Description", "Debit", "Credit"]);
        let err = source.parse_record(&record).unwrap_err();
        assert!(err.to_string().contains("unrecognised date 'Date'"));
    }
}

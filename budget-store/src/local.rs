//! Ledger store backed by one CSV file per ledger in a local directory.
//!
//! Each file is the whole worksheet: row 1 of the file is row 1 of the
//! sheet, so a header row sits above the data range just as it does in a
//! spreadsheet.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use budget_core::store::{clear_grid, format_grid, read_grid, write_grid};
use budget_core::{A1Range, CellFormat, LedgerStore, ValueInput};
use tracing::debug;

/// Header written into newly created ledger files
pub const LEDGER_HEADER: [&str; 5] = ["Date", "Name", "Amount", "Category", "Notes"];

#[derive(Debug, Clone)]
pub struct LocalLedgerStore {
    dir: PathBuf,
}

impl LocalLedgerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ledger_path(&self, ledger: &str) -> Result<PathBuf> {
        let name = ledger.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            bail!("invalid ledger name '{ledger}'");
        }
        Ok(self.dir.join(format!("{name}.csv")))
    }

    /// Create an empty ledger holding only the header row.
    /// Returns false when the ledger already exists.
    pub fn create_ledger(&self, ledger: &str) -> Result<bool> {
        let path = self.ledger_path(ledger)?;
        if path.exists() {
            return Ok(false);
        }
        fs::create_dir_all(&self.dir).with_context(|| format!("create {}", self.dir.display()))?;
        let header: Vec<String> = LEDGER_HEADER.iter().map(|h| h.to_string()).collect();
        save_sheet(&path, &[header])?;
        Ok(true)
    }

    fn load(&self, ledger: &str) -> Result<(PathBuf, Vec<Vec<String>>)> {
        let path = self.ledger_path(ledger)?;
        if !path.is_file() {
            bail!("worksheet not found: {ledger} (expected {})", path.display());
        }
        let sheet = load_sheet(&path)?;
        Ok((path, sheet))
    }

    fn update<F>(&self, ledger: &str, range: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Vec<String>>, &A1Range) -> Result<()>,
    {
        let range = A1Range::parse(range)?;
        let (path, mut sheet) = self.load(ledger)?;
        apply(&mut sheet, &range)?;
        save_sheet(&path, &sheet)
    }
}

impl LedgerStore for LocalLedgerStore {
    fn get_range(&mut self, ledger: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let parsed = A1Range::parse(range)?;
        let (_, sheet) = self.load(ledger)?;
        Ok(read_grid(&sheet, &parsed))
    }

    fn clear_range(&mut self, ledger: &str, range: &str) -> Result<()> {
        debug!("clearing {ledger}!{range}");
        self.update(ledger, range, |sheet, r| {
            clear_grid(sheet, r);
            Ok(())
        })
    }

    fn write_range(
        &mut self,
        ledger: &str,
        range: &str,
        rows: &[Vec<String>],
        input: ValueInput,
    ) -> Result<()> {
        debug!("writing {} rows to {ledger}!{range} ({})", rows.len(), input.as_str());
        self.update(ledger, range, |sheet, r| write_grid(sheet, r, rows))
    }

    fn format_column(&mut self, ledger: &str, range: &str, format: CellFormat) -> Result<()> {
        self.update(ledger, range, |sheet, r| {
            format_grid(sheet, r, format);
            Ok(())
        })
    }
}

fn load_sheet(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut sheet = Vec::new();
    for result in rdr.records() {
        let record = result.with_context(|| format!("reading {}", path.display()))?;
        sheet.push(record.iter().map(|c| c.to_string()).collect());
    }
    Ok(sheet)
}

/// Rows are written without trailing empty cells and trailing empty rows
/// are dropped, so cleared regions do not linger as blank lines.
fn save_sheet(path: &Path, sheet: &[Vec<String>]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("write {}", path.display()))?;

    let used = sheet
        .iter()
        .rposition(|row| row.iter().any(|c| !c.is_empty()))
        .map(|i| i + 1)
        .unwrap_or(0);

    for row in &sheet[..used] {
        let width = row
            .iter()
            .rposition(|c| !c.is_empty())
            .map(|i| i + 1)
            .unwrap_or(0);
        if width == 0 {
            // csv refuses zero-field records; one empty field keeps the row.
            wtr.write_record([""])?;
        } else {
            wtr.write_record(&row[..width])?;
        }
    }
    wtr.flush().with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_create_and_read_empty_ledger() {
        let dir = TempDir::new().unwrap();
        let mut store = LocalLedgerStore::new(dir.path().join("ledgers"));
        assert!(store.create_ledger("Expenses").unwrap());
        assert!(!store.create_ledger("Expenses").unwrap());
        assert!(store.get_range("Expenses", "A2:E").unwrap().is_empty());
        assert_eq!(store.get_range("Expenses", "A1:E1").unwrap()[0][0], "Date");
    }

    #[test]
    fn test_missing_ledger_names_itself() {
        let dir = TempDir::new().unwrap();
        let mut store = LocalLedgerStore::new(dir.path());
        let err = store.get_range("Income", "A2:E").unwrap_err();
        assert!(err.to_string().contains("worksheet not found: Income"));
    }

    #[test]
    fn test_rejects_path_like_names() {
        let store = LocalLedgerStore::new("ledgers");
        assert!(store.ledger_path("../etc").is_err());
        assert!(store.ledger_path("").is_err());
        assert!(store.ledger_path("Expenses").is_ok());
    }

    #[test]
    fn test_write_format_and_shrink() {
        let dir = TempDir::new().unwrap();
        let mut store = LocalLedgerStore::new(dir.path());
        store.create_ledger("Expenses").unwrap();

        let rows = vec![
            cells(&["2024-01-01", "Rent", "1200.00", "", ""]),
            cells(&["2024-01-05", "Coffee Shop", "$4.50", "Food", "latte"]),
        ];
        store
            .write_range("Expenses", "A2:E", &rows, ValueInput::UserEntered)
            .unwrap();
        store
            .format_column("Expenses", "C2:C3", CellFormat::Currency)
            .unwrap();

        let read = store.get_range("Expenses", "A2:E").unwrap();
        assert_eq!(read[0], cells(&["2024-01-01", "Rent", "$1,200.00"]));
        assert_eq!(read[1], cells(&["2024-01-05", "Coffee Shop", "$4.50", "Food", "latte"]));

        store.clear_range("Expenses", "A2:E").unwrap();
        store
            .write_range("Expenses", "A2:E", &rows[..1], ValueInput::UserEntered)
            .unwrap();
        assert_eq!(store.get_range("Expenses", "A2:E").unwrap().len(), 1);

        let text = fs::read_to_string(store.ledger_path("Expenses").unwrap()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}

//! Seams to the outside world: where batches come from and where ledgers live.

use std::collections::HashMap;

use anyhow::{Result, bail};

use crate::money::{format_currency, parse_money};
use crate::record::BatchEntry;
use crate::settings::A1Range;

/// How the store should interpret written cell text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInput {
    /// Stored verbatim
    Raw,
    /// Interpreted as if typed by hand (numbers, dates, formulas)
    UserEntered,
}

impl ValueInput {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueInput::Raw => "RAW",
            ValueInput::UserEntered => "USER_ENTERED",
        }
    }
}

/// Cell display format applied to a range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFormat {
    /// `$#,##0.00`
    Currency,
}

/// Tabular storage holding the ledgers. Ranges use A1 notation relative to
/// the named ledger.
pub trait LedgerStore {
    fn get_range(&mut self, ledger: &str, range: &str) -> Result<Vec<Vec<String>>>;
    fn clear_range(&mut self, ledger: &str, range: &str) -> Result<()>;
    fn write_range(
        &mut self,
        ledger: &str,
        range: &str,
        rows: &[Vec<String>],
        input: ValueInput,
    ) -> Result<()>;
    fn format_column(&mut self, ledger: &str, range: &str, format: CellFormat) -> Result<()>;
}

/// Supplier of one run's import batch
pub trait BatchSource {
    /// Must fail rather than return an empty batch when nothing was found.
    fn load_records(&mut self) -> Result<Vec<BatchEntry>>;
}

impl BatchSource for Vec<BatchEntry> {
    fn load_records(&mut self) -> Result<Vec<BatchEntry>> {
        if self.is_empty() {
            bail!("no records to load");
        }
        Ok(self.clone())
    }
}

/// Grid of cells kept in memory, one per ledger. Used as the store in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    sheets: HashMap<String, Vec<Vec<String>>>,
    writes: usize,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a ledger whose sheet starts with `rows` (row 1 first).
    pub fn with_ledger(mut self, name: &str, rows: Vec<Vec<String>>) -> Self {
        self.sheets.insert(name.to_string(), rows);
        self
    }

    /// Whole sheet of a ledger, including header rows
    pub fn sheet(&self, name: &str) -> Option<&[Vec<String>]> {
        self.sheets.get(name).map(|s| s.as_slice())
    }

    /// Number of `write_range` calls seen
    pub fn write_count(&self) -> usize {
        self.writes
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut Vec<Vec<String>>> {
        match self.sheets.get_mut(name) {
            Some(sheet) => Ok(sheet),
            None => bail!("worksheet not found: {name}"),
        }
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn get_range(&mut self, ledger: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let range = A1Range::parse(range)?;
        let sheet = self.sheet_mut(ledger)?;
        Ok(read_grid(sheet, &range))
    }

    fn clear_range(&mut self, ledger: &str, range: &str) -> Result<()> {
        let range = A1Range::parse(range)?;
        let sheet = self.sheet_mut(ledger)?;
        clear_grid(sheet, &range);
        Ok(())
    }

    fn write_range(
        &mut self,
        ledger: &str,
        range: &str,
        rows: &[Vec<String>],
        _input: ValueInput,
    ) -> Result<()> {
        let range = A1Range::parse(range)?;
        let sheet = self.sheet_mut(ledger)?;
        write_grid(sheet, &range, rows)?;
        self.writes += 1;
        Ok(())
    }

    fn format_column(&mut self, ledger: &str, range: &str, format: CellFormat) -> Result<()> {
        let range = A1Range::parse(range)?;
        let sheet = self.sheet_mut(ledger)?;
        format_grid(sheet, &range, format);
        Ok(())
    }
}

/// Cells of `range` with trailing empty cells and trailing empty rows
/// removed, the way spreadsheet APIs return values.
pub fn read_grid(sheet: &[Vec<String>], range: &A1Range) -> Vec<Vec<String>> {
    let first = range.start_row as usize - 1;
    let last = range
        .end_row
        .map(|r| (r as usize).min(sheet.len()))
        .unwrap_or(sheet.len());

    let mut out: Vec<Vec<String>> = (first..last)
        .map(|r| {
            let row = &sheet[r];
            let mut cells: Vec<String> = (range.start_col..=range.end_col)
                .map(|c| row.get(c).cloned().unwrap_or_default())
                .collect();
            while cells.last().is_some_and(|c| c.is_empty()) {
                cells.pop();
            }
            cells
        })
        .collect();

    while out.last().is_some_and(|r| r.is_empty()) {
        out.pop();
    }
    out
}

pub fn clear_grid(sheet: &mut [Vec<String>], range: &A1Range) {
    let first = range.start_row as usize - 1;
    let last = range.end_row.map(|r| r as usize).unwrap_or(sheet.len());
    for row in sheet.iter_mut().take(last).skip(first) {
        for c in range.start_col..=range.end_col {
            if let Some(cell) = row.get_mut(c) {
                cell.clear();
            }
        }
    }
}

/// Write `rows` starting at the range's top-left cell. Rows wider than the
/// range are rejected; the sheet grows as needed.
pub fn write_grid(sheet: &mut Vec<Vec<String>>, range: &A1Range, rows: &[Vec<String>]) -> Result<()> {
    if let Some(end) = range.end_row {
        let capacity = (end - range.start_row + 1) as usize;
        if rows.len() > capacity {
            bail!("{} rows do not fit in {} rows of range", rows.len(), capacity);
        }
    }
    for (i, values) in rows.iter().enumerate() {
        if values.len() > range.width() {
            bail!("row {} has {} cells, range is {} wide", i + 1, values.len(), range.width());
        }
        let r = range.start_row as usize - 1 + i;
        if sheet.len() <= r {
            sheet.resize(r + 1, Vec::new());
        }
        let row = &mut sheet[r];
        let needed = range.start_col + values.len();
        if row.len() < needed {
            row.resize(needed, String::new());
        }
        for (j, value) in values.iter().enumerate() {
            row[range.start_col + j] = value.clone();
        }
    }
    Ok(())
}

/// Apply a display format to the cells of `range`. Cells that are not
/// numbers are left alone.
pub fn format_grid(sheet: &mut [Vec<String>], range: &A1Range, format: CellFormat) {
    let first = range.start_row as usize - 1;
    let last = range.end_row.map(|r| r as usize).unwrap_or(sheet.len());
    for row in sheet.iter_mut().take(last).skip(first) {
        for c in range.start_col..=range.end_col {
            let Some(cell) = row.get_mut(c) else { continue };
            match format {
                CellFormat::Currency => {
                    if let Ok(value) = parse_money(cell) {
                        *cell = format_currency(value);
                    }
                }
            }
        }
    }
}

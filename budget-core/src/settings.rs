//! Run settings consumed by the core, and A1 range helpers for the ledger
//! data region.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::merge::format_ledger_date;
use crate::record::{Kind, LEDGER_COLUMNS};

/// Offset of the amount cell within a ledger row
const AMOUNT_OFFSET: usize = 2;

/// Where ledger rows live inside each ledger: fixed start row and columns,
/// open-ended towards the bottom.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataRange {
    pub start_row: u32,
    pub start_column: String,
    pub end_column: String,
    pub amount_column: String,
}

impl Default for DataRange {
    fn default() -> Self {
        Self {
            start_row: 2,
            start_column: "A".to_string(),
            end_column: "E".to_string(),
            amount_column: "C".to_string(),
        }
    }
}

impl DataRange {
    /// The open-ended data range, e.g. `A2:E`
    pub fn a1(&self) -> String {
        format!("{}{}:{}", self.start_column, self.start_row, self.end_column)
    }

    /// Amount cells of the first `rows` data rows, e.g. `C2:C41`.
    pub fn amount_a1(&self, rows: usize) -> String {
        let last = self.start_row as usize + rows.saturating_sub(1);
        format!(
            "{col}{}:{col}{}",
            self.start_row,
            last,
            col = self.amount_column
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_row == 0 {
            bail!("data start row must be 1 or greater");
        }
        let start = column_index(&self.start_column)
            .with_context(|| format!("invalid start column '{}'", self.start_column))?;
        let end = column_index(&self.end_column)
            .with_context(|| format!("invalid end column '{}'", self.end_column))?;
        let amount = column_index(&self.amount_column)
            .with_context(|| format!("invalid amount column '{}'", self.amount_column))?;
        if end < start {
            bail!(
                "end column {} precedes start column {}",
                self.end_column,
                self.start_column
            );
        }
        if end - start + 1 != LEDGER_COLUMNS {
            bail!(
                "data range {}..{} must span exactly {LEDGER_COLUMNS} columns (date, name, amount, category, notes)",
                self.start_column,
                self.end_column
            );
        }
        if amount != start + AMOUNT_OFFSET {
            bail!(
                "amount column {} must be the third column of {}..{}",
                self.amount_column,
                self.start_column,
                self.end_column
            );
        }
        Ok(())
    }
}

/// Everything the dedup/merge engine needs to know about a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncSettings {
    /// chrono strftime pattern used for ledger date cells
    pub date_format: String,
    pub exclude_patterns: Vec<String>,
    pub keep_patterns: Vec<String>,
    pub expense_ledger: String,
    pub income_ledger: String,
    pub range: DataRange,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".to_string(),
            exclude_patterns: Vec::new(),
            keep_patterns: Vec::new(),
            expense_ledger: "Expenses".to_string(),
            income_ledger: "Income".to_string(),
            range: DataRange::default(),
        }
    }
}

impl SyncSettings {
    pub fn ledger_for(&self, kind: Kind) -> &str {
        match kind {
            Kind::Expense => &self.expense_ledger,
            Kind::Income => &self.income_ledger,
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        validate_date_format(&self.date_format)
            .and_then(|()| format_ledger_date(NaiveDate::default(), &self.date_format))
            .map_err(|e| SyncError::Config(format!("{e:#}")))?;
        if self.expense_ledger.trim().is_empty() || self.income_ledger.trim().is_empty() {
            return Err(SyncError::Config("ledger names must not be empty".to_string()));
        }
        self.range
            .validate()
            .map_err(|e| SyncError::Config(format!("{e:#}")))
    }
}

/// Reject patterns chrono would panic on while formatting.
pub fn validate_date_format(pattern: &str) -> Result<()> {
    if pattern.trim().is_empty() {
        bail!("date format is empty");
    }
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        bail!("invalid date format '{pattern}'");
    }
    Ok(())
}

/// Zero-based index of a column label: `A` → 0, `Z` → 25, `AA` → 26.
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut index = 0usize;
    for c in letters.chars() {
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    Some(index - 1)
}

/// Inverse of [`column_index`].
pub fn column_letters(mut index: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// A parsed A1 range such as `A2:E`, `C2:C10` or `B7`.
/// Columns are zero-based, rows one-based; `end_row` is `None` when open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct A1Range {
    pub start_col: usize,
    pub start_row: u32,
    pub end_col: usize,
    pub end_row: Option<u32>,
}

impl A1Range {
    pub fn parse(text: &str) -> Result<Self> {
        let (start, end) = match text.split_once(':') {
            Some((s, e)) => (s, Some(e)),
            None => (text, None),
        };

        let (start_col, start_row) = split_cell(start)?;
        let start_row = start_row.with_context(|| format!("range '{text}' has no start row"))?;

        let (end_col, end_row) = match end {
            Some(e) => split_cell(e)?,
            None => (start_col, Some(start_row)),
        };

        if end_col < start_col || end_row.is_some_and(|r| r < start_row) {
            bail!("range '{text}' is inverted");
        }

        Ok(Self {
            start_col,
            start_row,
            end_col,
            end_row,
        })
    }

    pub fn width(&self) -> usize {
        self.end_col - self.start_col + 1
    }
}

fn split_cell(cell: &str) -> Result<(usize, Option<u32>)> {
    let cell = cell.trim();
    let digits_at = cell
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(digits_at);
    let col = column_index(letters).with_context(|| format!("invalid cell reference '{cell}'"))?;
    let row = if digits.is_empty() {
        None
    } else {
        let row: u32 = digits
            .parse()
            .with_context(|| format!("invalid row in '{cell}'"))?;
        if row == 0 {
            bail!("row 0 in '{cell}'");
        }
        Some(row)
    };
    Ok((col, row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_range_a1() {
        let range = DataRange::default();
        assert_eq!(range.a1(), "A2:E");
        assert_eq!(range.amount_a1(3), "C2:C4");
        assert_eq!(range.amount_a1(1), "C2:C2");
    }

    #[test]
    fn test_data_range_validation() {
        assert!(DataRange::default().validate().is_ok());

        let bad_amount = DataRange {
            amount_column: "G".to_string(),
            ..DataRange::default()
        };
        assert!(bad_amount.validate().is_err());

        let bad_letters = DataRange {
            start_column: "1A".to_string(),
            ..DataRange::default()
        };
        assert!(bad_letters.validate().is_err());
    }

    #[test]
    fn test_data_range_must_fit_ledger_rows() {
        let narrow = DataRange {
            end_column: "D".to_string(),
            ..DataRange::default()
        };
        assert!(narrow.validate().is_err());

        let wide = DataRange {
            end_column: "F".to_string(),
            ..DataRange::default()
        };
        assert!(wide.validate().is_err());

        let shifted_amount = DataRange {
            amount_column: "D".to_string(),
            ..DataRange::default()
        };
        assert!(shifted_amount.validate().is_err());

        let offset = DataRange {
            start_row: 4,
            start_column: "B".to_string(),
            end_column: "F".to_string(),
            amount_column: "D".to_string(),
        };
        assert!(offset.validate().is_ok());
    }

    #[test]
    fn test_column_index_round_trip() {
        assert_eq!(column_index("A"), Some(0));
        assert_eq!(column_index("z"), Some(25));
        assert_eq!(column_index("AA"), Some(26));
        assert_eq!(column_index("AZ"), Some(51));
        assert_eq!(column_index(""), None);
        for i in [0, 25, 26, 51, 52, 701, 702] {
            assert_eq!(column_index(&column_letters(i)), Some(i));
        }
    }

    #[test]
    fn test_a1_range_parse() {
        let open = A1Range::parse("A2:E").unwrap();
        assert_eq!((open.start_col, open.start_row, open.end_col, open.end_row), (0, 2, 4, None));
        assert_eq!(open.width(), 5);

        let closed = A1Range::parse("C2:C10").unwrap();
        assert_eq!(closed.end_row, Some(10));

        let single = A1Range::parse("B7").unwrap();
        assert_eq!((single.start_col, single.end_col, single.end_row), (1, 1, Some(7)));

        assert!(A1Range::parse("E2:A").is_err());
        assert!(A1Range::parse("A:E").is_err());
        assert!(A1Range::parse("A0:E").is_err());
    }

    #[test]
    fn test_settings_validation() {
        assert!(SyncSettings::default().validate().is_ok());

        let bad_format = SyncSettings {
            date_format: "%Y-%m-%".to_string(),
            ..SyncSettings::default()
        };
        let err = bad_format.validate().unwrap_err();
        assert_eq!(err.kind(), "config");

        let with_time = SyncSettings {
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
            ..SyncSettings::default()
        };
        assert!(with_time.validate().is_ok());

        let with_offset = SyncSettings {
            date_format: "%Y-%m-%d %z".to_string(),
            ..SyncSettings::default()
        };
        assert_eq!(with_offset.validate().unwrap_err().kind(), "config");

        let empty = SyncSettings {
            income_ledger: " ".to_string(),
            ..SyncSettings::default()
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_ledger_for_kind() {
        let s = SyncSettings::default();
        assert_eq!(s.ledger_for(Kind::Expense), "Expenses");
        assert_eq!(s.ledger_for(Kind::Income), "Income");
    }
}

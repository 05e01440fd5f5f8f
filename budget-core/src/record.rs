//! Transaction and ledger row types shared by every stage of a sync run

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::merge::format_ledger_date;

/// Cells in a ledger row: date, name, amount, category, notes
pub const LEDGER_COLUMNS: usize = 5;

/// Which ledger a transaction belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Kind {
    #[serde(rename = "expense")]
    Expense,
    #[serde(rename = "income")]
    Income,
}

impl Kind {
    /// Label used in log lines and reports
    pub fn label(&self) -> &'static str {
        match self {
            Kind::Expense => "expense",
            Kind::Income => "income",
        }
    }
}

/// One row of an imported CSV export after parsing.
///
/// A row carries a cost, a payment, or (unexpectedly) both. Each positive
/// side becomes its own [`TransactionRecord`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchEntry {
    pub date: NaiveDate,
    pub name: String,
    pub cost: Option<f64>,
    pub payment: Option<f64>,
}

impl BatchEntry {
    pub fn new(
        date: NaiveDate,
        name: impl Into<String>,
        cost: Option<f64>,
        payment: Option<f64>,
    ) -> Self {
        Self {
            date,
            name: name.into(),
            cost,
            payment,
        }
    }

    /// Cost if positive, else payment if positive.
    pub fn positive_amount(&self) -> Option<f64> {
        positive(self.cost).or_else(|| positive(self.payment))
    }

    /// The Expense view of this row, if it has a positive cost
    pub fn expense(&self) -> Option<TransactionRecord> {
        positive(self.cost).map(|amount| self.view(amount, Kind::Expense))
    }

    /// The Income view of this row, if it has a positive payment
    pub fn income(&self) -> Option<TransactionRecord> {
        positive(self.payment).map(|amount| self.view(amount, Kind::Income))
    }

    pub fn record(&self, kind: Kind) -> Option<TransactionRecord> {
        match kind {
            Kind::Expense => self.expense(),
            Kind::Income => self.income(),
        }
    }

    fn view(&self, amount: f64, kind: Kind) -> TransactionRecord {
        TransactionRecord {
            date: self.date,
            name: self.name.clone(),
            amount,
            kind,
        }
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

/// A normalized financial event. `amount` is always positive; the sign
/// lives in `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionRecord {
    pub date: NaiveDate,
    pub name: String,
    pub amount: f64,
    pub kind: Kind,
}

impl TransactionRecord {
    pub fn new(date: NaiveDate, name: impl Into<String>, amount: f64, kind: Kind) -> Self {
        Self {
            date,
            name: name.into(),
            amount,
            kind,
        }
    }
}

/// One persisted ledger line: date, name, amount, category, notes.
///
/// Cells are kept as the store returned them; absent trailing cells are empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerRow {
    pub date: String,
    pub name: String,
    pub amount: String,
    pub category: String,
    pub notes: String,
}

impl LedgerRow {
    /// Build a row from the cells of one store row.
    /// Date and name are trimmed; the other cells are kept verbatim.
    pub fn from_cells(cells: &[String]) -> Self {
        let cell = |i: usize| cells.get(i).cloned().unwrap_or_default();
        Self {
            date: cell(0).trim().to_string(),
            name: cell(1).trim().to_string(),
            amount: cell(2),
            category: cell(3),
            notes: cell(4),
        }
    }

    /// Row for a freshly accepted transaction; category and notes stay empty.
    pub fn from_record(record: &TransactionRecord, date_format: &str) -> anyhow::Result<Self> {
        Ok(Self {
            date: format_ledger_date(record.date, date_format)?,
            name: record.name.clone(),
            amount: format!("{:.2}", record.amount),
            category: String::new(),
            notes: String::new(),
        })
    }

    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.name.clone(),
            self.amount.clone(),
            self.category.clone(),
            self.notes.clone(),
        ]
    }
}

/// Case- and whitespace-insensitive payee key used for matching
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_positive_amount_prefers_cost() {
        let entry = BatchEntry::new(date(2024, 3, 1), "ACME", Some(50.0), Some(20.0));
        assert_eq!(entry.positive_amount(), Some(50.0));

        let payment_only = BatchEntry::new(date(2024, 3, 1), "ACME", Some(0.0), Some(20.0));
        assert_eq!(payment_only.positive_amount(), Some(20.0));

        let neither = BatchEntry::new(date(2024, 3, 1), "ACME", None, Some(-5.0));
        assert_eq!(neither.positive_amount(), None);
    }

    #[test]
    fn test_views_by_kind() {
        let both = BatchEntry::new(date(2024, 3, 1), "Odd", Some(10.0), Some(12.0));
        assert_eq!(both.expense().unwrap().amount, 10.0);
        assert_eq!(both.income().unwrap().amount, 12.0);
        assert_eq!(both.record(Kind::Income).unwrap().kind, Kind::Income);

        let expense = BatchEntry::new(date(2024, 3, 1), "Rent", Some(1200.0), None);
        assert!(expense.income().is_none());
    }

    #[test]
    fn test_ledger_row_from_short_cells() {
        let cells = vec![" 2024-01-05 ".to_string(), " Coffee Shop ".to_string()];
        let row = LedgerRow::from_cells(&cells);
        assert_eq!(row.date, "2024-01-05");
        assert_eq!(row.name, "Coffee Shop");
        assert_eq!(row.amount, "");
        assert_eq!(row.to_cells().len(), 5);
    }

    #[test]
    fn test_ledger_row_from_record() {
        let rec = TransactionRecord::new(date(2024, 2, 1), "Rent", 1200.0, Kind::Expense);
        let row = LedgerRow::from_record(&rec, "%m/%d/%Y").unwrap();
        assert_eq!(row.date, "02/01/2024");
        assert_eq!(row.amount, "1200.00");
        assert!(row.category.is_empty() && row.notes.is_empty());
    }

    #[test]
    fn test_kind_serde_names() {
        assert_eq!(serde_json::to_string(&Kind::Expense).unwrap(), "\"expense\"");
        assert_eq!(normalize_name("  Coffee SHOP "), "coffee shop");
    }
}

//! Duplicate detection for incoming transactions.
//!
//! Two sources can already hold a candidate:
//!
//! 1. The target ledger. Matching is payee + amount only; the ledger date is
//!    ignored because a bank's posting date can drift between exports.
//! 2. The rest of the import batch, which catches the same charge appearing
//!    in two overlapping CSV exports. Here the other entry must carry a
//!    *different* date, so a record never matches its own batch entry.
//!    Dates are compared as rendered with the ledger date format, so a
//!    month-only format treats every day of a month as the same date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::merge::format_ledger_date;
use crate::money::{amounts_match, parse_money};
use crate::record::{BatchEntry, LedgerRow, TransactionRecord, normalize_name};

/// Which rule recognised a candidate as already recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateMatch {
    /// Index into the ledger rows
    Ledger { row: usize },
    /// Index into the batch
    Batch { entry: usize },
}

#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    date_format: String,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::with_date_format("%Y-%m-%d")
    }
}

impl DuplicateDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_format(date_format: impl Into<String>) -> Self {
        Self {
            date_format: date_format.into(),
        }
    }

    fn same_day(&self, a: NaiveDate, b: NaiveDate) -> bool {
        match (
            format_ledger_date(a, &self.date_format),
            format_ledger_date(b, &self.date_format),
        ) {
            (Ok(left), Ok(right)) => left == right,
            _ => a == b,
        }
    }

    pub fn is_duplicate(
        &self,
        candidate: &TransactionRecord,
        ledger_rows: &[LedgerRow],
        batch: &[BatchEntry],
    ) -> bool {
        self.find_match(candidate, ledger_rows, batch).is_some()
    }

    /// First matching rule, ledger scan before batch scan.
    pub fn find_match(
        &self,
        candidate: &TransactionRecord,
        ledger_rows: &[LedgerRow],
        batch: &[BatchEntry],
    ) -> Option<DuplicateMatch> {
        let name = normalize_name(&candidate.name);

        self.scan_ledger(&name, candidate.amount, ledger_rows)
            .map(|row| DuplicateMatch::Ledger { row })
            .or_else(|| {
                self.scan_batch(&name, candidate, batch)
                    .map(|entry| DuplicateMatch::Batch { entry })
            })
    }

    fn scan_ledger(&self, name: &str, amount: f64, rows: &[LedgerRow]) -> Option<usize> {
        rows.iter().position(|row| {
            if normalize_name(&row.name) != name {
                return false;
            }
            match parse_money(&row.amount) {
                Ok(existing) => amounts_match(existing, amount),
                Err(e) => {
                    debug!(name = %row.name, amount = %row.amount, "skipping ledger row: {e:#}");
                    false
                }
            }
        })
    }

    fn scan_batch(
        &self,
        name: &str,
        candidate: &TransactionRecord,
        batch: &[BatchEntry],
    ) -> Option<usize> {
        batch.iter().position(|other| {
            normalize_name(&other.name) == name
                && !self.same_day(other.date, candidate.date)
                && other
                    .positive_amount()
                    .is_some_and(|amount| amounts_match(amount, candidate.amount))
        })
    }
}

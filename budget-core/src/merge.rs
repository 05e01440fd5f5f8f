//! Ledger merger: existing rows plus accepted records, stably sorted by date

use std::fmt::Write;

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::warn;

use crate::record::{LedgerRow, TransactionRecord};

/// Merges accepted transactions into a ledger's existing rows
#[derive(Debug, Clone)]
pub struct LedgerMerger {
    date_format: String,
}

impl LedgerMerger {
    pub fn new(date_format: impl Into<String>) -> Self {
        Self {
            date_format: date_format.into(),
        }
    }

    /// Produce the full replacement row set for a ledger.
    ///
    /// Existing rows without a date are dropped. Rows whose date does not
    /// parse with the configured format sort first.
    pub fn merge(
        &self,
        existing: &[LedgerRow],
        accepted: &[TransactionRecord],
    ) -> Result<Vec<LedgerRow>> {
        let mut rows: Vec<LedgerRow> = existing
            .iter()
            .filter(|row| !row.date.is_empty())
            .cloned()
            .collect();
        for rec in accepted {
            rows.push(LedgerRow::from_record(rec, &self.date_format)?);
        }

        let mut keyed: Vec<(NaiveDateTime, LedgerRow)> = rows
            .into_iter()
            .map(|row| (self.sort_key(&row.date), row))
            .collect();

        // Stable: equal dates keep existing-then-new input order.
        keyed.sort_by_key(|(key, _)| *key);
        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }

    fn sort_key(&self, date: &str) -> NaiveDateTime {
        match parse_ledger_date(date, &self.date_format) {
            Some(parsed) => parsed,
            None => {
                warn!("Invalid date format: {date}");
                NaiveDateTime::MIN
            }
        }
    }
}

/// Parse a ledger date cell with `format`, which may or may not carry a time.
pub fn parse_ledger_date(text: &str, format: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Render a calendar date with `format`. Time fields come out as midnight;
/// fields chrono cannot fill from a naive date-time are an error.
pub fn format_ledger_date(date: NaiveDate, format: &str) -> Result<String> {
    let mut out = String::new();
    write!(out, "{}", date.and_time(NaiveTime::MIN).format(format))
        .map_err(|_| anyhow!("date format '{format}' cannot render a calendar date"))?;
    Ok(out)
}

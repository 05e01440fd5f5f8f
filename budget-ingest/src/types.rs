//! Column layout of headerless CSV exports

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Positions of the columns the loader needs, resolved from the configured
/// column names (e.g. `date,name,cost,payment,balance`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date: usize,
    pub name: usize,
    pub cost: usize,
    pub payment: usize,
}

impl ColumnMapping {
    /// Names are matched case-insensitively; unknown names are ignored.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let find = |wanted: &str| {
            names
                .iter()
                .position(|n| n.as_ref().trim().eq_ignore_ascii_case(wanted))
        };

        let mut missing = Vec::new();
        let mut get = |wanted: &'static str| {
            let found = find(wanted);
            if found.is_none() {
                missing.push(wanted);
            }
            found.unwrap_or_default()
        };
        let mapping = Self {
            date: get("date"),
            name: get("name"),
            cost: get("cost"),
            payment: get("payment"),
        };

        if !missing.is_empty() {
            bail!("CSV columns missing: {}", missing.join(", "));
        }
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_from_names() {
        let m = ColumnMapping::from_names(&["Date", "name", " cost ", "payment", "balance"]).unwrap();
        assert_eq!((m.date, m.name, m.cost, m.payment), (0, 1, 2, 3));

        let reordered = ColumnMapping::from_names(&["name", "payment", "date", "cost"]).unwrap();
        assert_eq!(reordered.date, 2);
        assert_eq!(reordered.payment, 1);
    }

    #[test]
    fn test_mapping_reports_missing() {
        let err = ColumnMapping::from_names(&["date", "name"]).unwrap_err();
        assert_eq!(err.to_string(), "CSV columns missing: cost, payment");
    }
}

//! Noise filter: drops transfers, card payments and other rows that should
//! never reach a ledger, unless a keep pattern rescues them.

use crate::record::BatchEntry;

/// Case-insensitive substring filter over payee names
#[derive(Debug, Clone, Default)]
pub struct NoiseFilter {
    exclude: Vec<String>,
    keep: Vec<String>,
}

impl NoiseFilter {
    /// Blank patterns are ignored.
    pub fn new<S: AsRef<str>>(exclude: &[S], keep: &[S]) -> Self {
        Self {
            exclude: lowered(exclude),
            keep: lowered(keep),
        }
    }

    /// True if some exclude pattern matches and no keep pattern does.
    pub fn is_noise(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        let kept = self.keep.iter().any(|k| name.contains(k.as_str()));
        self.exclude
            .iter()
            .any(|pattern| name.contains(pattern.as_str()) && !kept)
    }

    /// Order-preserving; returns the survivors.
    pub fn apply(&self, entries: Vec<BatchEntry>) -> Vec<BatchEntry> {
        entries
            .into_iter()
            .filter(|e| !self.is_noise(&e.name))
            .collect()
    }
}

fn lowered<S: AsRef<str>>(patterns: &[S]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.as_ref().trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(name: &str) -> BatchEntry {
        BatchEntry::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            name,
            Some(10.0),
            None,
        )
    }

    #[test]
    fn test_exclude_only_is_dropped() {
        let filter = NoiseFilter::new(&["transfer"], &["1234"]);
        assert!(filter.is_noise("Online TRANSFER to savings"));
        assert!(!filter.is_noise("Coffee Shop"));
    }

    #[test]
    fn test_keep_pattern_overrides_exclude() {
        let filter = NoiseFilter::new(&["transfer"], &["1234"]);
        assert!(!filter.is_noise("Transfer to account ...1234"));
    }

    #[test]
    fn test_each_exclude_is_an_independent_veto() {
        let filter = NoiseFilter::new(&["transfer", "payment"], &["acct 99"]);
        assert!(filter.is_noise("Card PAYMENT thank you"));
        assert!(filter.is_noise("transfer"));
        assert!(!filter.is_noise("payment to acct 99"));
    }

    #[test]
    fn test_blank_patterns_ignored() {
        let filter = NoiseFilter::new(&["", "  "], &[""]);
        assert!(!filter.is_noise("anything"));
    }

    #[test]
    fn test_apply_preserves_order() {
        let filter = NoiseFilter::new(&["transfer"], &[]);
        let out = filter.apply(vec![
            entry("Rent"),
            entry("Transfer out"),
            entry("Groceries"),
            entry("transfer in"),
        ]);
        let names: Vec<_> = out.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Rent", "Groceries"]);
    }
}

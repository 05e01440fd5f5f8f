//! Lenient date parsing for bank exports, which rarely agree on a format.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%m.%d.%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
];

// Two-digit years, tried last so that 4-digit years win.
const SHORT_YEAR_FORMATS: &[&str] = &["%m/%d/%y", "%m-%d-%y", "%d-%b-%y"];

static ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").expect("valid ordinal regex"));

/// Parse a date cell in any of the formats bank exports commonly use.
pub fn parse_mixed_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let text = ORDINAL_RE.replace_all(text, "$1");
    let text = text.as_ref();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .map(|dt| dt.date())
        .filter(plausible)
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .filter_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .find(plausible)
        })
        .or_else(|| {
            SHORT_YEAR_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
        })
}

// "%Y" happily reads "24" as the year 24.
fn plausible(date: &NaiveDate) -> bool {
    date.year() >= 1000
}

//! Currency text parsing and formatting.

use anyhow::{Context, Result, bail};

/// Amounts within this distance are the same amount
pub const AMOUNT_TOLERANCE: f64 = 0.01;

// Absorbs binary rounding so that e.g. 100.01 vs 100.00 sits inside the tolerance.
const FLOAT_SLACK: f64 = 1e-9;

/// Spreadsheet number-format pattern applied to amount columns
pub const CURRENCY_PATTERN: &str = "$#,##0.00";

/// Parse an amount cell such as `$1,234.50`, `4.5` or `-3`.
///
/// Dollar signs, thousands separators and surrounding whitespace are
/// stripped before parsing.
pub fn parse_money(text: &str) -> Result<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        bail!("empty amount");
    }
    let value: f64 = cleaned
        .parse()
        .with_context(|| format!("invalid amount '{text}'"))?;
    if !value.is_finite() {
        bail!("invalid amount '{text}'");
    }
    Ok(value)
}

pub fn amounts_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= AMOUNT_TOLERANCE + FLOAT_SLACK
}

/// Render an amount the way [`CURRENCY_PATTERN`] displays it: `$1,234.50`.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac:02}")
}

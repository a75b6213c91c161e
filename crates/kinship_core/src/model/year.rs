//! Year display values and their provenance marker.
//!
//! A stored year wrapped in brackets (`"[1874]"`) was imputed by inference.
//! Any other non-empty value came from the source document and is
//! authoritative.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::RangeInclusive;

/// Years whose imputed form `extract_year` can read back.
pub const IMPUTABLE_YEARS: RangeInclusive<i32> = 1000..=9999;

static FOUR_DIGIT_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])([0-9]{4})(?:[^0-9]|$)").expect("valid year regex")
});

/// Returns whether `value` carries the imputed-provenance marker.
pub fn is_imputed(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.len() >= 2 && trimmed.starts_with('[') && trimmed.ends_with(']')
}

/// Returns whether a stored year is unknown (`None` or blank).
pub fn is_unknown(value: Option<&str>) -> bool {
    value.map_or(true, |value| value.trim().is_empty())
}

/// Formats an imputed year for storage.
pub fn mark_imputed(year: i32) -> String {
    format!("[{year}]")
}

/// Extracts a year from a stored or raw date value.
///
/// Brackets are stripped, then the first run of exactly four digits is taken.
/// Partial or longer digit runs never produce a guess.
pub fn extract_year(value: &str) -> Option<i32> {
    let stripped = value.trim().trim_start_matches('[').trim_end_matches(']');
    FOUR_DIGIT_YEAR_RE
        .captures(stripped)
        .and_then(|captures| captures.get(1))
        .and_then(|matched| matched.as_str().parse().ok())
}

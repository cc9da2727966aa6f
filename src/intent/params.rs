//! Deterministic parameter extraction: time range and metric hints.
//! Runs unconditionally, never gated on `service_type`.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::TimeRange;

static YEAR_RANGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2})\s*\.\.\s*(\d{4}-\d{2}-\d{2})").unwrap());
static LAST_N_YEARS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"last\s+(\d+)\s+years?").unwrap());
static BARE_YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

const METRIC_KEYWORDS: &[&str] = &[
    "mean", "average", "max", "maximum", "min", "minimum", "change", "trend", "stddev",
    "std dev", "median", "total", "sum",
];

/// Recognizes, at minimum: `"last year"`, `"this year"`, `"last N years"`,
/// `"summer"`, `"winter"`, `"monsoon"`, bare four-digit years and
/// `"YYYY-MM-DD..YYYY-MM-DD"` ranges.
pub fn extract_time_range(text: &str, today: NaiveDate) -> Option<TimeRange> {
    let lower = text.to_lowercase();

    if let Some(captures) = YEAR_RANGE_PATTERN.captures(&lower) {
        let start = captures.get(1)?.as_str().parse().ok()?;
        let end = captures.get(2)?.as_str().parse().ok()?;
        return Some(TimeRange { start, end });
    }

    if let Some(captures) = LAST_N_YEARS_PATTERN.captures(&lower) {
        let n: i32 = captures.get(1)?.as_str().parse().ok()?;
        let start = today
            .with_year(today.year() - n)
            .unwrap_or(today);
        return Some(TimeRange { start, end: today });
    }

    if lower.contains("last year") {
        let year = today.year() - 1;
        return Some(TimeRange {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31)?,
        });
    }

    if lower.contains("this year") {
        return Some(TimeRange {
            start: NaiveDate::from_ymd_opt(today.year(), 1, 1)?,
            end: today,
        });
    }

    if lower.contains("monsoon") {
        let year = today.year();
        return Some(TimeRange {
            start: NaiveDate::from_ymd_opt(year, 6, 1)?,
            end: NaiveDate::from_ymd_opt(year, 9, 30)?,
        });
    }

    if lower.contains("summer") {
        let year = today.year();
        return Some(TimeRange {
            start: NaiveDate::from_ymd_opt(year, 3, 1)?,
            end: NaiveDate::from_ymd_opt(year, 6, 30)?,
        });
    }

    if lower.contains("winter") {
        let year = today.year();
        return Some(TimeRange {
            start: NaiveDate::from_ymd_opt(year, 12, 1)?,
            end: NaiveDate::from_ymd_opt(year + 1, 2, 28)?,
        });
    }

    if let Some(captures) = BARE_YEAR_PATTERN.find(&lower) {
        let year: i32 = captures.as_str().parse().ok()?;
        return Some(TimeRange {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31)?,
        });
    }

    None
}

pub fn extract_metrics(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    METRIC_KEYWORDS
        .iter()
        .filter(|k| lower.contains(*k))
        .map(|k| k.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn recognizes_bare_year() {
        let range = extract_time_range("NDVI for Mumbai, 2023", today()).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn recognizes_explicit_range() {
        let range = extract_time_range("from 2022-01-01 .. 2022-06-30", today()).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2022, 6, 30).unwrap());
    }

    #[test]
    fn recognizes_last_n_years() {
        let range = extract_time_range("trend over the last 3 years", today()).unwrap();
        assert_eq!(range.start.year(), 2021);
        assert_eq!(range.end, today());
    }

    #[test]
    fn recognizes_monsoon() {
        let range = extract_time_range("monsoon water coverage", today()).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn no_match_returns_none() {
        assert!(extract_time_range("NDVI for Mumbai", today()).is_none());
    }

    #[test]
    fn extracts_metric_hints() {
        let metrics = extract_metrics("show the mean and max change over time");
        assert!(metrics.contains(&"mean".to_string()));
        assert!(metrics.contains(&"max".to_string()));
        assert!(metrics.contains(&"change".to_string()));
    }
}

//! Reporting period parsing and the localized date formats templates expose.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

const ISO_FORMAT: &str = "%Y-%m-%d";

/// Inclusive reporting period for a batch. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AppError> {
        if end < start {
            return Err(AppError::DateRange(format!(
                "end date {} is before start date {}",
                end.format(ISO_FORMAT),
                start.format(ISO_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, AppError> {
        Self::new(parse_iso(start)?, parse_iso(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn start_iso(&self) -> String {
        self.start.format(ISO_FORMAT).to_string()
    }

    pub fn end_iso(&self) -> String {
        self.end.format(ISO_FORMAT).to_string()
    }

    /// e.g. `2025年12月1日至2025年12月20日`
    pub fn range_cn(&self) -> String {
        format!("{}至{}", cn_date(self.start), cn_date(self.end))
    }
}

fn parse_iso(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), ISO_FORMAT).map_err(|_| {
        AppError::DateRange(format!("'{}' is not a YYYY-MM-DD date", raw.trim()))
    })
}

/// Long-form Chinese date without zero padding: `2025年12月20日`.
pub fn cn_date(date: NaiveDate) -> String {
    format!("{}年{}月{}日", date.year(), date.month(), date.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_range() {
        let range = DateRange::parse("2025-12-01", "2025-12-20").unwrap();
        assert_eq!(range.start_iso(), "2025-12-01");
        assert_eq!(range.end_iso(), "2025-12-20");
    }

    #[test]
    fn test_single_day_range_allowed() {
        assert!(DateRange::parse("2025-03-04", "2025-03-04").is_ok());
    }

    #[test]
    fn test_end_before_start_rejected() {
        let err = DateRange::parse("2025-12-20", "2025-12-01").unwrap_err();
        assert!(matches!(err, AppError::DateRange(_)));
    }

    #[test]
    fn test_unparsable_date_rejected() {
        let err = DateRange::parse("2025/12/01", "2025-12-20").unwrap_err();
        assert!(matches!(err, AppError::DateRange(_)));
    }

    #[test]
    fn test_cn_formats_have_no_padding() {
        let range = DateRange::parse("2025-03-04", "2025-12-20").unwrap();
        assert_eq!(cn_date(range.start()), "2025年3月4日");
        assert_eq!(range.range_cn(), "2025年3月4日至2025年12月20日");
    }
}

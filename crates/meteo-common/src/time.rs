//! Time handling utilities for archive partitioning.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MeteoError, MeteoResult};

/// Six-digit `YYYYMM` key partitioning archives by month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> MeteoResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(MeteoError::InvalidMonthKey(format!(
                "{:04}{:02}",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    /// Month containing the given instant.
    pub fn of(ts: DateTime<Utc>) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
        }
    }

    /// Parse a six-digit `YYYYMM` string.
    pub fn parse(s: &str) -> MeteoResult<Self> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MeteoError::InvalidMonthKey(s.to_string()));
        }
        let year: i32 = s[0..4]
            .parse()
            .map_err(|_| MeteoError::InvalidMonthKey(s.to_string()))?;
        let month: u32 = s[4..6]
            .parse()
            .map_err(|_| MeteoError::InvalidMonthKey(s.to_string()))?;
        Self::new(year, month)
    }

    /// The key following this one.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// All month keys from the month of `start` through the month of `end`, inclusive.
    ///
    /// Used by range queries to enumerate the archives a time window spans.
    pub fn spanning(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Self> {
        let mut months = Vec::new();
        let mut current = Self::of(start);
        let last = Self::of(end);
        while current <= last {
            months.push(current);
            current = current.next();
        }
        months
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

/// Parse the leading `YYYYMMDDHH` of a converted-grid filename into an
/// hour-truncated UTC timestamp.
///
/// Returns None for anything that is not exactly ten digits describing a
/// valid calendar hour; callers treat that as "not a grid file", never as an
/// error.
pub fn parse_filename_datetime(digits: &str) -> Option<DateTime<Utc>> {
    if digits.len() != 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year: i32 = digits[0..4].parse().ok()?;
    let month: u32 = digits[4..6].parse().ok()?;
    let day: u32 = digits[6..8].parse().ok()?;
    let hour: u32 = digits[8..10].parse().ok()?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let naive = date.and_hms_opt(hour, 0, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Format a timestamp the way archive time axes and logs present it:
/// ISO-8601 truncated to seconds, no timezone suffix.
pub fn format_archive_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_key_display() {
        let key = MonthKey::new(2025, 4).unwrap();
        assert_eq!(key.to_string(), "202504");
    }

    #[test]
    fn test_month_key_parse_roundtrip() {
        let key = MonthKey::parse("202512").unwrap();
        assert_eq!(key.year, 2025);
        assert_eq!(key.month, 12);
        assert_eq!(key.next().to_string(), "202601");
    }

    #[test]
    fn test_month_key_rejects_garbage() {
        assert!(MonthKey::parse("2025").is_err());
        assert!(MonthKey::parse("202513").is_err());
        assert!(MonthKey::parse("20251x").is_err());
    }

    #[test]
    fn test_spanning_crosses_year_boundary() {
        let start = Utc.with_ymd_and_hms(2024, 11, 15, 6, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();

        let months: Vec<String> = MonthKey::spanning(start, end)
            .iter()
            .map(|m| m.to_string())
            .collect();
        assert_eq!(months, vec!["202411", "202412", "202501", "202502"]);
    }

    #[test]
    fn test_parse_filename_datetime() {
        let ts = parse_filename_datetime("2025012112").unwrap();
        assert_eq!(format_archive_time(ts), "2025-01-21T12:00:00");
    }

    #[test]
    fn test_parse_filename_datetime_rejects_invalid() {
        assert!(parse_filename_datetime("202501211").is_none()); // 9 digits
        assert!(parse_filename_datetime("2025012125").is_none()); // hour 25
        assert!(parse_filename_datetime("2025013212").is_none()); // day 32
        assert!(parse_filename_datetime("20250121ab").is_none());
    }
}

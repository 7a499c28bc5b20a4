use crate::snapshot::SnapshotId;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid date '{0}': expected YYYYMMDD")]
    InvalidDate(String),

    #[error("start date must be before end date")]
    StartAfterEnd,

    #[error("invalid date range: outside of capture range")]
    OutsideCaptures,
}

/// Inclusive range of capture timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: SnapshotId,
    pub end: SnapshotId,
}

fn day_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{8}$").expect("valid regex"))
}

/// Parse a `YYYYMMDD` day into the timestamp at midnight of that day.
pub fn parse_day(input: &str) -> Result<SnapshotId, RangeError> {
    let day = input.trim();
    if !day_pattern().is_match(day) {
        return Err(RangeError::InvalidDate(input.to_string()));
    }
    format!("{day}000000")
        .parse()
        .map_err(|_| RangeError::InvalidDate(input.to_string()))
}

impl DateRange {
    /// Build a range from two `YYYYMMDD` days.
    pub fn from_days(start: &str, end: &str) -> Result<Self, RangeError> {
        let range = Self {
            start: parse_day(start)?,
            end: parse_day(end)?,
        };
        if range.start > range.end {
            return Err(RangeError::StartAfterEnd);
        }
        Ok(range)
    }

    pub fn contains(&self, id: SnapshotId) -> bool {
        self.start <= id && id <= self.end
    }

    /// Select the captures that fall inside the range, keeping index order.
    ///
    /// `captures` is expected in ascending order, as the index returns it;
    /// the first and last entries define the capture span.
    pub fn select(&self, captures: &[SnapshotId]) -> Result<Vec<SnapshotId>, RangeError> {
        if self.start > self.end {
            return Err(RangeError::StartAfterEnd);
        }
        let (Some(first), Some(last)) = (captures.first(), captures.last()) else {
            return Ok(Vec::new());
        };
        if self.start > *last || self.end < *first {
            return Err(RangeError::OutsideCaptures);
        }

        Ok(captures
            .iter()
            .copied()
            .take_while(|id| *id <= self.end)
            .filter(|id| self.contains(*id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<SnapshotId> {
        raw.iter().copied().map(SnapshotId::new).collect()
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(parse_day("20200315").unwrap(), SnapshotId::new(20200315000000));
        assert_eq!(parse_day(" 20200315 ").unwrap(), SnapshotId::new(20200315000000));
        assert!(matches!(parse_day("2020315"), Err(RangeError::InvalidDate(_))));
        assert!(matches!(parse_day("2020-03-15"), Err(RangeError::InvalidDate(_))));
    }

    #[test]
    fn test_from_days_rejects_reversed() {
        assert_eq!(
            DateRange::from_days("20200102", "20200101"),
            Err(RangeError::StartAfterEnd)
        );
    }

    #[test]
    fn test_select_inclusive() {
        let captures = ids(&[
            20191231235959,
            20200101000000,
            20200105120000,
            20200110000000,
            20200110000001,
        ]);
        let range = DateRange::from_days("20200101", "20200110").unwrap();
        let selected = range.select(&captures).unwrap();
        assert_eq!(selected, ids(&[20200101000000, 20200105120000, 20200110000000]));
    }

    #[test]
    fn test_select_outside_capture_span() {
        let captures = ids(&[20200101000000, 20200601000000]);
        let before = DateRange::from_days("20190101", "20191231").unwrap();
        assert_eq!(before.select(&captures), Err(RangeError::OutsideCaptures));

        let after = DateRange::from_days("20200602", "20201231").unwrap();
        assert_eq!(after.select(&captures), Err(RangeError::OutsideCaptures));
    }

    #[test]
    fn test_select_empty_captures() {
        let range = DateRange::from_days("20200101", "20201231").unwrap();
        assert!(range.select(&[]).unwrap().is_empty());
    }
}

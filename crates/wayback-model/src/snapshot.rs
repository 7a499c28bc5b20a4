use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Capture timestamp format used by the archive: `YYYYMMDDhhmmss`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Identifier of one archived capture, i.e. its capture timestamp.
///
/// Unique within a single run's identifier list, but nothing more: the same
/// timestamp can legitimately appear twice in an index response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(u64);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid capture timestamp '{0}': expected up to 14 digits (YYYYMMDDhhmmss)")]
pub struct InvalidSnapshotId(pub String);

impl SnapshotId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Interpret the identifier as a calendar timestamp, if it is one.
    pub fn datetime(self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.0.to_string(), TIMESTAMP_FORMAT).ok()
    }

    /// `MM/DD/YYYY` rendering used when describing a capture span.
    pub fn display_date(self) -> String {
        match self.datetime() {
            Some(dt) => dt.format("%m/%d/%Y").to_string(),
            None => {
                let raw = self.0.to_string();
                if raw.len() >= 8 {
                    format!("{}/{}/{}", &raw[4..6], &raw[6..8], &raw[..4])
                } else {
                    raw
                }
            }
        }
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = InvalidSnapshotId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.len() > 14 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidSnapshotId(s.to_string()));
        }
        trimmed
            .parse::<u64>()
            .map(SnapshotId)
            .map_err(|_| InvalidSnapshotId(s.to_string()))
    }
}

impl From<u64> for SnapshotId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

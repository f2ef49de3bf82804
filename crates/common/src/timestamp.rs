//! Timestamp utilities for archive entries.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A wrapper around DateTime<Utc> with consistent serialization.
///
/// Archive entries are stamped with one of these so that two runs over
/// the same tree can produce identical bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a new timestamp from the current time.
    pub fn now() -> Self {
        Timestamp(Utc::now())
    }

    /// Create a timestamp from seconds since the Unix epoch.
    pub fn from_unix(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Timestamp)
    }

    /// Format as ISO 8601 string.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }

    /// Seconds since the Unix epoch, clamped at zero for tar headers.
    pub fn unix_seconds(&self) -> u64 {
        self.0.timestamp().max(0) as u64
    }

    /// Calendar fields (year, month, day, hour, minute, second) in UTC.
    pub fn civil(&self) -> (i32, u32, u32, u32, u32, u32) {
        (
            self.0.year(),
            self.0.month(),
            self.0.day(),
            self.0.hour(),
            self.0.minute(),
            self.0.second(),
        )
    }
}

impl FromStr for Timestamp {
    type Err = crate::Error;

    /// Parse an RFC 3339 date, such as the output of `git log --format=%cI`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| Timestamp(dt.with_timezone(&Utc)))
            .map_err(|e| crate::Error::Config(format!("invalid date '{}': {}", s.trim(), e)))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_iso8601())
    }
}

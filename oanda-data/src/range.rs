use crate::error::DataError;
use chrono::{DateTime, NaiveDateTime, Utc};

/// Inclusive range of instants `[start, end]`, with `start <= end`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DataError> {
        if start > end {
            return Err(DataError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Construct a [`TimeRange`] from UNIX seconds.
    pub fn from_unix(start: i64, end: i64) -> Result<Self, DataError> {
        Self::new(from_unix_seconds(start)?, from_unix_seconds(end)?)
    }

    /// Construct a [`TimeRange`] from ISO-8601 dates.
    ///
    /// Accepts `YYYY-MM-DDTHH:MM:SS` or a full RFC 3339 timestamp, see [`iso_to_utc`].
    pub fn from_iso(start: &str, end: &str) -> Result<Self, DataError> {
        Self::new(iso_to_utc(start)?, iso_to_utc(end)?)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

fn from_unix_seconds(seconds: i64) -> Result<DateTime<Utc>, DataError> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| DataError::InvalidInstant(format!("UNIX seconds {seconds} out of range")))
}

/// Parse an ISO-8601 date into a UTC instant.
///
/// Naive values (no offset) are read as UTC, never as the host's local time, so the same input
/// maps to the same instant on every machine. Use an RFC 3339 offset to express local times.
pub fn iso_to_utc(input: &str) -> Result<DateTime<Utc>, DataError> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(input) {
        return Ok(datetime.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|error| {
            DataError::InvalidInstant(format!("failed to parse '{input}': {error}"))
        })
}

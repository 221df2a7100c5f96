//! The `olderThan` pagination watermark.
//!
//! The cursor is the oldest `createdAt` seen so far in a run, truncated to
//! the start of its UTC day. Several items can share one upload timestamp,
//! so the cursor is kept at day granularity rather than exact. Items the
//! service hands back twice are absorbed by the ledger.

use std::fmt;

use chrono::{DateTime, DurationRound, FixedOffset, SecondsFormat, TimeDelta, Utc};

/// Running minimum of item timestamps observed during one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermark {
    oldest: Option<DateTime<FixedOffset>>,
}

impl Watermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower the watermark if `created_at` is older than anything seen.
    pub fn observe(&mut self, created_at: DateTime<FixedOffset>) {
        match self.oldest {
            Some(current) if current <= created_at => {}
            _ => self.oldest = Some(created_at),
        }
    }

    pub fn oldest(&self) -> Option<DateTime<FixedOffset>> {
        self.oldest
    }

    /// The cursor to send with the next request, `None` before any item.
    pub fn cursor(&self) -> Option<Cursor> {
        self.oldest.map(Cursor::from_timestamp)
    }
}

/// Day-truncated `olderThan` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(DateTime<Utc>);

impl Cursor {
    pub fn from_timestamp(ts: DateTime<FixedOffset>) -> Self {
        let utc = ts.with_timezone(&Utc);
        // Only fails for timestamps outside chrono's nanosecond range.
        Self(utc.duration_trunc(TimeDelta::days(1)).unwrap_or(utc))
    }

    #[cfg(test)]
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// RFC 3339 with a numeric offset, e.g. `2024-01-05T00:00:00+00:00`.
    pub fn to_query_value(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, false)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_value())
    }
}

use chrono::{DateTime, Duration, Utc};

use crate::types::SourceKind;

pub const SHORT_LIVED_DAYS: i64 = 7;
pub const LONG_LIVED_DAYS: i64 = 30;

/// Maximum age a record of a given kind may have to be collected.
///
/// Undated records have unknown age: they are always admitted and it is up to
/// ordering to rank them behind dated ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyWindow {
    max_age: Duration,
}

impl RecencyWindow {
    pub fn days(days: i64) -> Self {
        Self {
            max_age: Duration::days(days),
        }
    }

    pub fn for_kind(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Video | SourceKind::News => Self::days(SHORT_LIVED_DAYS),
            SourceKind::Blog | SourceKind::Paper | SourceKind::Podcast => Self::days(LONG_LIVED_DAYS),
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Oldest admissible publication time relative to `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.max_age
    }

    pub fn admits(&self, published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match published_at {
            Some(at) => at >= self.cutoff(now),
            None => true,
        }
    }
}

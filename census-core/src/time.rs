//! Time helpers shared by the cleaner and the dashboard.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Index of the UTC minute containing `timestamp` (floor, also before the epoch).
pub fn minute_bucket(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp().div_euclid(60)
}

/// Fractional minutes from `earlier` to `later`; negative if `later` comes first.
pub fn gap_minutes(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    later
        .signed_duration_since(earlier)
        .num_milliseconds() as f64
        / 60_000.0
}

/// History window requested from the API, in days.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct HistoryWindow(u32);

impl HistoryWindow {
    pub const DAY: Self = Self(1);
    pub const WEEK: Self = Self(7);
    pub const MONTH: Self = Self(30);

    pub const fn from_days(days: u32) -> Self {
        Self(days)
    }

    pub const fn days(self) -> u32 {
        self.0
    }

    pub fn label(self) -> String {
        match self.0 {
            1 => "Last 24 hours".to_string(),
            7 => "Last 7 days".to_string(),
            30 => "Last 30 days".to_string(),
            days => format!("Last {days} days"),
        }
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::WEEK
    }
}

impl fmt::Display for HistoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Plain-language age of an update, as shown on the hospital cards.
pub fn describe_elapsed(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let minutes = now.signed_duration_since(then).num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes == 1 {
        return "1 minute ago".to_string();
    }
    if minutes < 60 {
        return format!("{minutes} minutes ago");
    }

    let hours = minutes / 60;
    match hours {
        1 => "1 hour ago".to_string(),
        2..=23 => format!("{hours} hours ago"),
        _ => "over a day ago".to_string(),
    }
}

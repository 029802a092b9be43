//! Bucket timelines for time-series aggregation.
//!
//! A timeline is a contiguous run of half-open `[start, end)` buckets, all
//! computed in UTC. The first bucket starts at the floor of `since` for the
//! chosen granularity, and buckets are appended until one ends at or after
//! `until`, so the last bucket may extend past the requested window.
//!
//! Week labels are `YYYY-Www` using the ISO week-numbering year, not the
//! calendar year of the bucket's Monday. The week starting 2024-12-30 is
//! therefore `2025-W01`, where a calendar-year label would read `2024-W01`.

use crate::error::{Result, StatsError};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The unit of a time bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    Week,
    Month,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(StatsError::InvalidRequest(format!(
                "bucket must be one of day, week, month; got '{other}'"
            ))),
        }
    }
}

/// A half-open interval `[start, end)` of the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    #[serde(rename = "bucket_start")]
    pub start: DateTime<Utc>,
    #[serde(rename = "bucket_end")]
    pub end: DateTime<Utc>,
    pub label: String,
}

impl TimeBucket {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Rounds `instant` down to the start of its bucket.
///
/// Weeks start on Monday. Returns `None` only at the edges of chrono's
/// representable range.
pub fn floor(instant: DateTime<Utc>, granularity: Granularity) -> Option<DateTime<Utc>> {
    let date = instant.date_naive();
    let start = match granularity {
        Granularity::Day => date,
        Granularity::Week => {
            date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))?
        }
        Granularity::Month => date.checked_sub_days(Days::new(u64::from(date.day0())))?,
    };
    Some(midnight(start))
}

/// Moves a bucket start forward by one unit. Months are calendar months.
pub fn advance(start: DateTime<Utc>, granularity: Granularity) -> Option<DateTime<Utc>> {
    match granularity {
        Granularity::Day => start.checked_add_signed(TimeDelta::days(1)),
        Granularity::Week => start.checked_add_signed(TimeDelta::days(7)),
        Granularity::Month => start.checked_add_months(Months::new(1)),
    }
}

/// Display label for the bucket starting at `start`.
pub fn label(start: DateTime<Utc>, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day => start.format("%Y-%m-%d").to_string(),
        Granularity::Week => {
            let week = start.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        Granularity::Month => start.format("%Y-%m").to_string(),
    }
}

/// Builds the bucket timeline covering `[since, until)`.
///
/// An empty timeline is returned when `since >= until`.
pub fn build_timeline(
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    granularity: Granularity,
) -> Vec<TimeBucket> {
    let mut timeline = Vec::new();
    if since >= until {
        return timeline;
    }
    let Some(mut current) = floor(since, granularity) else {
        return timeline;
    };

    while current < until {
        let Some(end) = advance(current, granularity) else {
            break;
        };
        timeline.push(TimeBucket {
            start: current,
            end,
            label: label(current, granularity),
        });
        current = end;
    }

    timeline
}

/// Index of the bucket containing `instant`, if any.
///
/// The timeline is sorted and contiguous, so a binary search gives the same
/// answer as scanning for `start <= instant < end`.
pub fn bucket_index(timeline: &[TimeBucket], instant: DateTime<Utc>) -> Option<usize> {
    let idx = timeline.partition_point(|bucket| bucket.end <= instant);
    timeline
        .get(idx)
        .filter(|bucket| bucket.contains(instant))
        .map(|_| idx)
}

/// Parses an ISO-8601 instant into UTC.
///
/// Accepts RFC 3339 with any offset, a naive date-time (taken as UTC), or a
/// bare date (UTC midnight).
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(midnight(date));
    }

    Err(StatsError::InvalidWindow(format!(
        "'{value}' is not an ISO-8601 instant"
    )))
}

/// Rejects windows where `since` is not strictly before `until`.
pub fn validate_window(since: DateTime<Utc>, until: DateTime<Utc>) -> Result<()> {
    if since >= until {
        return Err(StatsError::InvalidWindow(format!(
            "since ({}) must be earlier than until ({})",
            since.to_rfc3339(),
            until.to_rfc3339()
        )));
    }
    Ok(())
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

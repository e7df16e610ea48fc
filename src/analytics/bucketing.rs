//! Time-bucket conversions for analytics.
//!
//! Converts record timestamps into calendar bucket keys (`YYYY-MM-DD`,
//! ISO `YYYY-Www`, `YYYY-MM`) and back into representative dates and
//! half-open time windows used for chronological ordering and lead time.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};

use super::types::{AnalyticsError, AnalyticsResult, GroupBy};
use crate::model::{Commit, Job, Run};

/// Bucket key for records without a resolvable date. Always sorts last.
pub const UNKNOWN_BUCKET: &str = "unknown";

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a stored timestamp into UTC.
///
/// Accepts RFC 3339 (`Z` or numeric offset, `T` or space separator), naive
/// date-times taken as UTC, and bare dates as midnight UTC. Anything else is
/// `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a caller-supplied `YYYY-MM-DD` bound. Unlike stored timestamps this
/// fails fast: a bad bound is a usage mistake.
pub fn parse_date(field: &str, raw: &str) -> AnalyticsResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        AnalyticsError::InvalidDateRange {
            field: field.to_string(),
            value: raw.to_string(),
        }
    })
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Bucket key for a calendar date.
pub fn date_bucket_key(date: NaiveDate, group_by: GroupBy) -> String {
    match group_by {
        GroupBy::Day => date.format("%Y-%m-%d").to_string(),
        GroupBy::Week => {
            let iso = date.iso_week();
            format!("{}-W{:02}", iso.year(), iso.week())
        }
        GroupBy::Month => date.format("%Y-%m").to_string(),
    }
}

/// Bucket key for a UTC timestamp.
pub fn bucket_key(ts: &DateTime<Utc>, group_by: GroupBy) -> String {
    date_bucket_key(ts.date_naive(), group_by)
}

/// Records that carry the timestamp used for bucketing.
pub trait Timestamped {
    fn bucket_time(&self) -> Option<DateTime<Utc>>;
}

impl Timestamped for Run {
    fn bucket_time(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl Timestamped for Job {
    fn bucket_time(&self) -> Option<DateTime<Utc>> {
        self.started_at.or(self.created_at)
    }
}

impl Timestamped for Commit {
    fn bucket_time(&self) -> Option<DateTime<Utc>> {
        self.authored_at
    }
}

/// Bucket key of a record, [`UNKNOWN_BUCKET`] when it has no usable date.
pub fn record_bucket<T: Timestamped>(record: &T, group_by: GroupBy) -> String {
    record
        .bucket_time()
        .map(|ts| bucket_key(&ts, group_by))
        .unwrap_or_else(|| UNKNOWN_BUCKET.to_string())
}

/// Sort bucket keys ascending with [`UNKNOWN_BUCKET`] moved to the end.
///
/// Keys are zero-padded, so lexical order is chronological order.
pub fn sort_bucket_keys(keys: &mut [String]) {
    keys.sort_by(|a, b| {
        (a == UNKNOWN_BUCKET)
            .cmp(&(b == UNKNOWN_BUCKET))
            .then_with(|| a.cmp(b))
    });
}

// ---------------------------------------------------------------------------
// Representative dates and windows
// ---------------------------------------------------------------------------

/// The calendar date standing in for a bucket on a chronological axis: the
/// day itself, the Monday of the ISO week, or the first of the month.
pub fn representative_date(key: &str, group_by: GroupBy) -> Option<NaiveDate> {
    match group_by {
        GroupBy::Day => NaiveDate::parse_from_str(key, "%Y-%m-%d").ok(),
        GroupBy::Week => {
            let (year, week) = key.split_once("-W")?;
            let year: i32 = year.parse().ok()?;
            let week: u32 = week.parse().ok()?;
            NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
        }
        GroupBy::Month => {
            let (year, month) = key.split_once('-')?;
            NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
        }
    }
}

/// Representative date of the bucket containing `date`.
pub fn representative_of(date: NaiveDate, group_by: GroupBy) -> NaiveDate {
    match group_by {
        GroupBy::Day => date,
        GroupBy::Week => date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
        GroupBy::Month => date.with_day(1).unwrap_or(date),
    }
}

/// Half-open UTC window `[start, end)` covered by a bucket key.
pub fn bucket_window(key: &str, group_by: GroupBy) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = representative_date(key, group_by)?;
    let end = match group_by {
        GroupBy::Day => start.checked_add_signed(Duration::days(1))?,
        GroupBy::Week => start.checked_add_signed(Duration::days(7))?,
        GroupBy::Month => {
            let (y, m) = if start.month() == 12 {
                (start.year() + 1, 1)
            } else {
                (start.year(), start.month() + 1)
            };
            NaiveDate::from_ymd_opt(y, m, 1)?
        }
    };
    Some((midnight_utc(start)?, midnight_utc(end)?))
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Every calendar day in `[start, end]`, empty when `start > end`.
pub fn days_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

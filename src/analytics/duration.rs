//! Execution-duration statistics.
//!
//! Durations are minutes; a record with a missing endpoint or a negative
//! delta contributes nothing (its group's count is unaffected).

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::Serialize;

use super::bucketing::{Timestamped, days_in_range};
use super::derive::{round2, safe_div};
use super::engine::PipelineQuery;
use super::types::{Aggregate, AnalyticsResult, EmptyReason, Metric, QueryOptions};

/// Rows kept when the caller gives no `top`.
pub const DEFAULT_TOP: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationRow {
    pub name: String,
    pub count: usize,
    pub average_minutes: f64,
    pub total_minutes: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DurationSummary {
    pub metric: Metric,
    /// Records in scope, with or without a usable duration.
    pub records: usize,
    /// Records skipped for a missing endpoint or a negative delta.
    pub skipped: usize,
    pub rows: Vec<DurationRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyDuration {
    pub date: NaiveDate,
    pub count: usize,
    pub average_minutes: f64,
    pub total_minutes: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyDurationSeries {
    /// One row per calendar day in range, zero-filled.
    pub days: Vec<DailyDuration>,
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    total: f64,
}

impl Accumulator {
    fn add(&mut self, minutes: f64) {
        self.count += 1;
        self.total += minutes;
    }

    fn average(&self) -> f64 {
        safe_div(self.total, self.count as u64).unwrap_or(0.0)
    }
}

/// Group `(name, minutes)` samples, sort by `metric` descending, keep `top`.
///
/// Ties keep first-seen order.
pub fn rank_durations<I>(samples: I, metric: Metric, top: usize) -> Vec<DurationRow>
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut order: Vec<String> = Vec::new();
    let mut groups: FxHashMap<String, Accumulator> = FxHashMap::default();
    for (name, minutes) in samples {
        groups
            .entry(name)
            .or_insert_with_key(|k| {
                order.push(k.clone());
                Accumulator::default()
            })
            .add(minutes);
    }

    let mut rows: Vec<DurationRow> = order
        .into_iter()
        .filter_map(|name| {
            let acc = groups.get(&name)?;
            Some(DurationRow {
                count: acc.count,
                average_minutes: round2(acc.average()),
                total_minutes: round2(acc.total),
                name,
            })
        })
        .collect();

    let key = |row: &DurationRow| match metric {
        Metric::Avg => row.average_minutes,
        Metric::Sum => row.total_minutes,
        Metric::Count => row.count as f64,
    };
    rows.sort_by(|a, b| key(b).total_cmp(&key(a)));
    rows.truncate(top);
    rows
}

/// Per-day series over `[start, end]`, zero-filled.
pub fn daily_series<I>(samples: I, start: NaiveDate, end: NaiveDate) -> DailyDurationSeries
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let mut by_day: FxHashMap<NaiveDate, Accumulator> = FxHashMap::default();
    for (day, minutes) in samples {
        by_day.entry(day).or_default().add(minutes);
    }
    let days = days_in_range(start, end)
        .into_iter()
        .map(|date| {
            let acc = by_day.remove(&date).unwrap_or_default();
            DailyDuration {
                date,
                count: acc.count,
                average_minutes: round2(acc.average()),
                total_minutes: round2(acc.total),
            }
        })
        .collect();
    DailyDurationSeries { days }
}

impl<'a> PipelineQuery<'a> {
    /// Average job execution time grouped by job name.
    pub fn jobs_average_time(&self, opts: &QueryOptions) -> AnalyticsResult<Aggregate<DurationSummary>> {
        if !self.has_jobs() {
            return Ok(Aggregate::empty(EmptyReason::NoData));
        }
        let scope = self.scope(opts)?;
        let samples: Vec<(String, f64)> = scope
            .jobs
            .iter()
            .filter_map(|j| Some((j.display_name().to_string(), j.duration_minutes()?)))
            .collect();
        Ok(summarize(scope.jobs.len(), samples, opts))
    }

    /// Run wall-clock time grouped by workflow path.
    pub fn runs_duration(&self, opts: &QueryOptions) -> AnalyticsResult<Aggregate<DurationSummary>> {
        if !self.has_runs() {
            return Ok(Aggregate::empty(EmptyReason::NoData));
        }
        let scope = self.scope(opts)?;
        let samples: Vec<(String, f64)> = scope
            .runs
            .iter()
            .filter_map(|r| Some((r.workflow_key().to_string(), r.duration_minutes()?)))
            .collect();
        Ok(summarize(scope.runs.len(), samples, opts))
    }

    /// Job execution time per calendar day of `started_at`.
    ///
    /// The range is the requested `start_date..=end_date`; a missing bound
    /// falls back to the earliest / latest day with data.
    pub fn daily_duration(&self, opts: &QueryOptions) -> AnalyticsResult<Aggregate<DailyDurationSeries>> {
        if !self.has_jobs() {
            return Ok(Aggregate::empty(EmptyReason::NoData));
        }
        let scope = self.scope(opts)?;
        let samples: Vec<(NaiveDate, f64)> = scope
            .jobs
            .iter()
            .filter_map(|j| Some((j.bucket_time()?.date_naive(), j.duration_minutes()?)))
            .collect();

        let data_min = samples.iter().map(|(d, _)| *d).min();
        let data_max = samples.iter().map(|(d, _)| *d).max();
        let (Some(start), Some(end)) = (
            scope.spec.start_date.or(data_min),
            scope.spec.end_date.or(data_max),
        ) else {
            return Ok(Aggregate::empty(EmptyReason::NoMatches));
        };
        Ok(Aggregate::populated(daily_series(samples, start, end)))
    }
}

fn summarize(records: usize, samples: Vec<(String, f64)>, opts: &QueryOptions) -> Aggregate<DurationSummary> {
    if samples.is_empty() {
        tracing::debug!(records, "no records with a usable duration");
        return Aggregate::empty(EmptyReason::NoMatches);
    }
    let skipped = records - samples.len();
    Aggregate::populated(DurationSummary {
        metric: opts.metric,
        records,
        skipped,
        rows: rank_durations(samples, opts.metric, opts.top.unwrap_or(DEFAULT_TOP)),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

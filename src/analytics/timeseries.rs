//! Time-bucketed count matrices.
//!
//! A [`BucketMatrix`] is dense: every `[dimension][bucket]` cell exists and
//! absent combinations are `0`. Records without a resolvable date are kept
//! out of the matrix and counted in `unknown`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::Serialize;

use super::bucketing::{Timestamped, UNKNOWN_BUCKET, date_bucket_key, representative_of};
use super::engine::PipelineQuery;
use super::summary::UNDEFINED_KEY;
use super::types::{Aggregate, AnalyticsResult, EmptyReason, GroupBy, QueryOptions};
use crate::model::{Job, Run};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BucketMatrix {
    pub group_by: GroupBy,
    /// Ascending bucket keys, never including `unknown`.
    pub buckets: Vec<String>,
    /// One per bucket: the day, the Monday of the ISO week, or the first of
    /// the month.
    pub representative_dates: Vec<NaiveDate>,
    pub dimensions: Vec<String>,
    /// `matrix[dimension][bucket]`.
    pub matrix: Vec<Vec<usize>>,
    /// Records without a usable date.
    pub unknown: usize,
    /// `unknown` split by dimension, aligned with `dimensions`.
    pub unknown_by_dimension: Vec<usize>,
}

impl BucketMatrix {
    /// Bucket `records` by their timestamp and `dimension`.
    pub fn build<'r, T, I, D>(records: I, group_by: GroupBy, dimension: D) -> Self
    where
        T: Timestamped + 'r,
        I: IntoIterator<Item = &'r T>,
        D: Fn(&T) -> String,
    {
        let mut cells: FxHashMap<(String, String), usize> = FxHashMap::default();
        let mut reps: BTreeMap<String, NaiveDate> = BTreeMap::new();
        let mut dims: BTreeSet<String> = BTreeSet::new();
        let mut unknown_by: FxHashMap<String, usize> = FxHashMap::default();

        for record in records {
            let dim = dimension(record);
            match record.bucket_time() {
                Some(ts) => {
                    let date = ts.date_naive();
                    let key = date_bucket_key(date, group_by);
                    reps.entry(key.clone())
                        .or_insert_with(|| representative_of(date, group_by));
                    *cells.entry((dim.clone(), key)).or_insert(0) += 1;
                }
                None => *unknown_by.entry(dim.clone()).or_insert(0) += 1,
            }
            dims.insert(dim);
        }

        let buckets: Vec<String> = reps.keys().cloned().collect();
        let representative_dates: Vec<NaiveDate> = reps.values().copied().collect();
        let dimensions: Vec<String> = dims.into_iter().collect();
        let matrix = dimensions
            .iter()
            .map(|d| {
                buckets
                    .iter()
                    .map(|b| cells.get(&(d.clone(), b.clone())).copied().unwrap_or(0))
                    .collect()
            })
            .collect();
        let unknown_by_dimension: Vec<usize> = dimensions
            .iter()
            .map(|d| unknown_by.get(d).copied().unwrap_or(0))
            .collect();

        Self {
            group_by,
            buckets,
            representative_dates,
            dimensions,
            matrix,
            unknown: unknown_by_dimension.iter().sum(),
            unknown_by_dimension,
        }
    }

    pub fn count(&self, dimension: &str, bucket: &str) -> usize {
        let Some(d) = self.dimensions.iter().position(|x| x == dimension) else {
            return 0;
        };
        if bucket == UNKNOWN_BUCKET {
            return self.unknown_by_dimension[d];
        }
        self.buckets
            .iter()
            .position(|x| x == bucket)
            .map(|b| self.matrix[d][b])
            .unwrap_or(0)
    }

    /// Dated plus undated records.
    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum::<usize>() + self.unknown
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Buckets and rows with a terminal `unknown` column appended when any
    /// record lacked a date.
    pub fn with_unknown_column(&self) -> (Vec<String>, Vec<Vec<usize>>) {
        let mut buckets = self.buckets.clone();
        let mut rows = self.matrix.clone();
        if self.unknown > 0 {
            buckets.push(UNKNOWN_BUCKET.to_string());
            for (row, extra) in rows.iter_mut().zip(&self.unknown_by_dimension) {
                row.push(*extra);
            }
        }
        (buckets, rows)
    }

    /// Reorder dimensions: `preferred` first (when present, in that order),
    /// the rest alphabetically.
    pub fn prioritize(&mut self, preferred: &[&str]) {
        let rank = |d: &str| {
            preferred
                .iter()
                .position(|p| *p == d)
                .unwrap_or(preferred.len())
        };
        let mut order: Vec<usize> = (0..self.dimensions.len()).collect();
        order.sort_by(|&a, &b| {
            let (da, db) = (&self.dimensions[a], &self.dimensions[b]);
            rank(da).cmp(&rank(db)).then_with(|| da.cmp(db))
        });
        self.dimensions = order.iter().map(|&i| self.dimensions[i].clone()).collect();
        self.matrix = order.iter().map(|&i| self.matrix[i].clone()).collect();
        self.unknown_by_dimension = order.iter().map(|&i| self.unknown_by_dimension[i]).collect();
    }

    /// Reorder dimensions by row total (undated included) descending and keep
    /// the first `top`. Equal totals keep their current order.
    pub fn rank_by_total(&mut self, top: Option<usize>) {
        let totals: Vec<usize> = self
            .matrix
            .iter()
            .zip(&self.unknown_by_dimension)
            .map(|(row, unknown)| row.iter().sum::<usize>() + unknown)
            .collect();
        let mut order: Vec<usize> = (0..self.dimensions.len()).collect();
        order.sort_by(|&a, &b| totals[b].cmp(&totals[a]));
        if let Some(top) = top {
            order.truncate(top);
        }
        self.dimensions = order.iter().map(|&i| self.dimensions[i].clone()).collect();
        self.matrix = order.iter().map(|&i| self.matrix[i].clone()).collect();
        self.unknown_by_dimension = order.iter().map(|&i| self.unknown_by_dimension[i]).collect();
        self.unknown = self.unknown_by_dimension.iter().sum();
    }
}

/// One job's executions bucketed by conclusion, next to the run
/// conclusions of the same scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobsByStatus {
    pub job_name: String,
    /// Workflow the job was resolved against, `<any>` when unknown.
    pub workflow: String,
    pub run_conclusions: BTreeMap<String, usize>,
    /// Dimensions are job conclusions: `success`, `failure`, then the rest.
    pub executions: BucketMatrix,
}

impl<'a> PipelineQuery<'a> {
    /// `[workflow path][bucket]` run counts at `opts.aggregate_by`.
    pub fn runs_by_period(&self, opts: &QueryOptions) -> AnalyticsResult<Aggregate<BucketMatrix>> {
        if !self.has_runs() {
            return Ok(Aggregate::empty(EmptyReason::NoData));
        }
        let scope = self.scope(opts)?;
        if scope.runs.is_empty() {
            return Ok(Aggregate::empty(EmptyReason::NoMatches));
        }
        let matrix = BucketMatrix::build(scope.runs.iter().copied(), opts.aggregate_by, |r: &Run| {
            r.workflow_key().to_string()
        });
        tracing::debug!(
            buckets = matrix.buckets.len(),
            workflows = matrix.dimensions.len(),
            unknown = matrix.unknown,
            "runs bucketed"
        );
        Ok(Aggregate::populated(matrix))
    }

    /// Executions of `opts.job_name` by conclusion per bucket.
    pub fn jobs_by_status(&self, opts: &QueryOptions) -> AnalyticsResult<Aggregate<JobsByStatus>> {
        let Some(job_name) = opts.job_name() else {
            return Ok(Aggregate::empty(EmptyReason::MissingParameter("job_name".into())));
        };
        if !self.has_jobs() {
            return Ok(Aggregate::empty(EmptyReason::NoData));
        }
        let scope = self.scope(opts)?;
        if scope.jobs.is_empty() {
            return Ok(Aggregate::empty(EmptyReason::NoMatches));
        }

        let run_conclusions = {
            let mut counts = BTreeMap::new();
            for run in &scope.runs {
                let key = run
                    .conclusion
                    .as_deref()
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or(UNDEFINED_KEY);
                *counts.entry(key.to_string()).or_insert(0) += 1;
            }
            counts
        };

        let mut executions = BucketMatrix::build(scope.jobs.iter().copied(), opts.aggregate_by, |j: &Job| {
            j.conclusion
                .as_deref()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "unknown".to_string())
        });
        executions.prioritize(&["success", "failure"]);

        let workflow = opts
            .workflow_path()
            .map(str::to_string)
            .or_else(|| {
                scope.jobs.iter().find_map(|j| {
                    j.workflow_name
                        .clone()
                        .or_else(|| self.index().parent_run(j).and_then(|r| r.path.clone()))
                })
            })
            .unwrap_or_else(|| "<any>".to_string());

        Ok(Aggregate::populated(JobsByStatus {
            job_name: scope
                .jobs
                .first()
                .map(|j| j.display_name().to_string())
                .unwrap_or_else(|| job_name.to_string()),
            workflow,
            run_conclusions,
            executions,
        }))
    }

    /// Failed job executions per `[job name][bucket]`, rows ranked by total
    /// failures and cut to `opts.top`.
    pub fn jobs_top_failed(&self, opts: &QueryOptions) -> AnalyticsResult<Aggregate<BucketMatrix>> {
        if !self.has_jobs() {
            return Ok(Aggregate::empty(EmptyReason::NoData));
        }
        let scope = self.scope(opts)?;
        let failed: Vec<&Job> = scope
            .jobs
            .iter()
            .copied()
            .filter(|j| {
                j.conclusion
                    .as_deref()
                    .is_some_and(|c| c.trim().eq_ignore_ascii_case("failure"))
            })
            .collect();
        if failed.is_empty() {
            return Ok(Aggregate::empty(EmptyReason::NoMatches));
        }

        let mut matrix = BucketMatrix::build(failed.iter().copied(), opts.aggregate_by, |j: &Job| {
            j.display_name().to_string()
        });
        matrix.rank_by_total(opts.top);
        tracing::debug!(
            failed = failed.len(),
            jobs = matrix.dimensions.len(),
            buckets = matrix.buckets.len(),
            "failed jobs ranked"
        );
        Ok(Aggregate::populated(matrix))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

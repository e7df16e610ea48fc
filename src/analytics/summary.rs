//! Status/summary aggregates over runs and jobs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use super::engine::PipelineQuery;
use super::types::{Aggregate, AnalyticsResult, EmptyReason, QueryOptions};
use crate::indexer::RunJobIndex;
use crate::model::{Job, Run};

/// Key used for runs without a status or conclusion.
pub const UNDEFINED_KEY: &str = "undefined";
/// Key used for jobs without a conclusion.
pub const UNKNOWN_KEY: &str = "unknown";
/// `most_failed` when nothing failed.
pub const NOT_APPLICABLE: &str = "N/A";

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Compact view of a run for result payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRef {
    pub id: i64,
    pub name: Option<String>,
    pub path: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub html_url: Option<String>,
}

impl From<&Run> for RunRef {
    fn from(run: &Run) -> Self {
        Self {
            id: run.id,
            name: run.name.clone(),
            path: run.path.clone(),
            status: run.status.clone(),
            conclusion: run.conclusion.clone(),
            created_at: run.created_at,
            html_url: run.html_url.clone(),
        }
    }
}

/// Compact view of a job for result payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRef {
    pub id: i64,
    pub run_id: Option<i64>,
    pub name: Option<String>,
    pub conclusion: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub html_url: Option<String>,
}

impl From<&Job> for JobRef {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            run_id: job.run_id,
            name: job.name.clone(),
            conclusion: job.conclusion.clone(),
            started_at: job.started_at,
            completed_at: job.completed_at,
            html_url: job.html_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowRunCount {
    pub count: usize,
    /// First path seen for this workflow name.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub total_runs: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub queued: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub conclusion_counts: BTreeMap<String, usize>,
    /// Distinct workflow paths.
    pub unique_workflows: usize,
    /// Keyed by workflow name.
    pub runs_by_workflow: BTreeMap<String, WorkflowRunCount>,
    pub first_run: Option<RunRef>,
    pub last_run: Option<RunRef>,
    /// `"{path} ({count})"` or `"N/A"`.
    pub most_failed: String,
}

impl Default for PipelineSummary {
    fn default() -> Self {
        Self {
            total_runs: 0,
            completed: 0,
            in_progress: 0,
            queued: 0,
            status_counts: BTreeMap::new(),
            conclusion_counts: BTreeMap::new(),
            unique_workflows: 0,
            runs_by_workflow: BTreeMap::new(),
            first_run: None,
            last_run: None,
            most_failed: NOT_APPLICABLE.to_string(),
        }
    }
}

/// Counts plus the ordered run list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSummary {
    pub status_counts: BTreeMap<String, usize>,
    pub conclusion_counts: BTreeMap<String, usize>,
    pub runs: Vec<RunRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobNameCount {
    pub count: usize,
    /// First run id seen for this job key.
    pub run_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobsSummary {
    pub total_jobs: usize,
    pub first_job: Option<JobRef>,
    pub last_job: Option<JobRef>,
    pub conclusions: BTreeMap<String, usize>,
    /// Distinct `"{job} :: {workflow}"` keys.
    pub unique_jobs: usize,
    pub jobs_by_name: BTreeMap<String, JobNameCount>,
}

// ---------------------------------------------------------------------------
// Pure aggregation
// ---------------------------------------------------------------------------

fn count_by<'r, T: 'r, I, F>(records: I, default: &str, key: F) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'r T>,
    F: Fn(&T) -> Option<&str>,
{
    let mut counts = BTreeMap::new();
    for record in records {
        let k = key(record)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default);
        *counts.entry(k.to_string()).or_insert(0) += 1;
    }
    counts
}

/// The workflow path with the most `failure` runs, as `"{path} ({count})"`.
///
/// Ties go to the workflow whose first failure comes earliest in `runs`.
pub fn most_failed_workflow(runs: &[&Run]) -> String {
    let mut order: Vec<(&str, usize)> = Vec::new();
    let mut slots: FxHashMap<&str, usize> = FxHashMap::default();
    for run in runs {
        let failed = run
            .conclusion
            .as_deref()
            .is_some_and(|c| c.trim().eq_ignore_ascii_case("failure"));
        if !failed {
            continue;
        }
        let key = run.workflow_key();
        let slot = *slots.entry(key).or_insert_with(|| {
            order.push((key, 0));
            order.len() - 1
        });
        order[slot].1 += 1;
    }

    // `max_by_key` keeps the last maximum; fold keeps the first.
    order
        .into_iter()
        .fold(None::<(&str, usize)>, |best, cur| match best {
            Some(b) if b.1 >= cur.1 => Some(b),
            _ => Some(cur),
        })
        .map(|(path, count)| format!("{path} ({count})"))
        .unwrap_or_else(|| NOT_APPLICABLE.to_string())
}

/// Summarize runs already in ascending `created_at` order.
pub fn summarize_runs(runs: &[&Run]) -> PipelineSummary {
    if runs.is_empty() {
        return PipelineSummary::default();
    }

    let status_counts = count_by(runs.iter().copied(), UNDEFINED_KEY, |r: &Run| {
        r.status.as_deref()
    });
    let conclusion_counts = count_by(runs.iter().copied(), UNDEFINED_KEY, |r: &Run| {
        r.conclusion.as_deref()
    });
    let status = |key: &str| status_counts.get(key).copied().unwrap_or(0);

    let unique_workflows = runs
        .iter()
        .filter_map(|r| r.path.as_deref().map(str::trim).filter(|p| !p.is_empty()))
        .collect::<FxHashSet<_>>()
        .len();

    let mut runs_by_workflow: BTreeMap<String, WorkflowRunCount> = BTreeMap::new();
    for run in runs {
        let name = run
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("<unnamed>");
        let entry = runs_by_workflow
            .entry(name.to_string())
            .or_insert_with(|| WorkflowRunCount {
                count: 0,
                path: run.path.clone().unwrap_or_else(|| "<no path>".to_string()),
            });
        entry.count += 1;
    }

    PipelineSummary {
        total_runs: runs.len(),
        completed: status("completed"),
        in_progress: status("in_progress"),
        queued: status("queued"),
        unique_workflows,
        runs_by_workflow,
        first_run: runs.first().map(|r| RunRef::from(*r)),
        last_run: runs.last().map(|r| RunRef::from(*r)),
        most_failed: most_failed_workflow(runs),
        status_counts,
        conclusion_counts,
    }
}

/// Summarize jobs; workflow names for the composite key come from the job
/// itself or, failing that, its parent run through `index`.
pub fn summarize_jobs(jobs: &[&Job], index: &RunJobIndex<'_>) -> JobsSummary {
    if jobs.is_empty() {
        return JobsSummary::default();
    }

    let conclusions = count_by(jobs.iter().copied(), UNKNOWN_KEY, |j: &Job| {
        j.conclusion.as_deref()
    });

    let mut jobs_by_name: BTreeMap<String, JobNameCount> = BTreeMap::new();
    for job in jobs {
        let workflow = job
            .workflow_name
            .as_deref()
            .or_else(|| index.parent_run(job).and_then(|r| r.name.as_deref()))
            .map(str::trim)
            .filter(|w| !w.is_empty());
        let key = match workflow {
            Some(wf) => format!("{} :: {wf}", job.display_name()),
            None => job.display_name().to_string(),
        };
        let entry = jobs_by_name.entry(key).or_default();
        entry.count += 1;
        if entry.run_id.is_none() {
            entry.run_id = job.run_id;
        }
    }

    JobsSummary {
        total_jobs: jobs.len(),
        first_job: jobs.first().map(|j| JobRef::from(*j)),
        last_job: jobs.last().map(|j| JobRef::from(*j)),
        conclusions,
        unique_jobs: jobs_by_name.len(),
        jobs_by_name,
    }
}

// ---------------------------------------------------------------------------
// Query entry points
// ---------------------------------------------------------------------------

impl<'a> PipelineQuery<'a> {
    /// Totals, status breakdowns, first/last run and most-failed workflow.
    pub fn pipeline_summary(&self, opts: &QueryOptions) -> AnalyticsResult<Aggregate<PipelineSummary>> {
        if !self.has_runs() {
            return Ok(Aggregate::empty(EmptyReason::NoData));
        }
        let scope = self.scope(opts)?;
        if scope.runs.is_empty() {
            return Ok(Aggregate::empty(EmptyReason::NoMatches));
        }
        Ok(Aggregate::populated(summarize_runs(&scope.runs)))
    }

    /// Run counts keyed by status and conclusion plus the ordered runs.
    pub fn runs_by_status(&self, opts: &QueryOptions) -> AnalyticsResult<Aggregate<StatusSummary>> {
        if !self.has_runs() {
            return Ok(Aggregate::empty(EmptyReason::NoData));
        }
        let scope = self.scope(opts)?;
        if scope.runs.is_empty() {
            return Ok(Aggregate::empty(EmptyReason::NoMatches));
        }
        let runs = &scope.runs;
        Ok(Aggregate::populated(StatusSummary {
            status_counts: count_by(runs.iter().copied(), UNDEFINED_KEY, |r: &Run| {
                r.status.as_deref()
            }),
            conclusion_counts: count_by(runs.iter().copied(), UNDEFINED_KEY, |r: &Run| {
                r.conclusion.as_deref()
            }),
            runs: runs.iter().map(|r| RunRef::from(*r)).collect(),
        }))
    }

    /// Job totals, conclusions and per-job counts.
    pub fn jobs_summary(&self, opts: &QueryOptions) -> AnalyticsResult<Aggregate<JobsSummary>> {
        if !self.has_jobs() {
            return Ok(Aggregate::empty(EmptyReason::NoData));
        }
        let scope = self.scope(opts)?;
        if scope.jobs.is_empty() {
            return Ok(Aggregate::empty(EmptyReason::NoMatches));
        }
        Ok(Aggregate::populated(summarize_jobs(&scope.jobs, self.index())))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

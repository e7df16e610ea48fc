//! Snapshot validation.
//!
//! Checks run against a loaded snapshot:
//! - **Association**: jobs whose `run_id` matches no loaded run.
//! - **Timestamps**: records that cannot be placed in any time bucket.
//! - **Durations**: jobs that completed before they started.
//! - **Ordering**: runs out of ascending `created_at` order, duplicate ids.
//! - **Performance guardrails**: timing budget for the run–job index build.
//!
//! `smm pipelines validate --json` prints the [`ValidationReport`] next to
//! the index build timing.

use itertools::Itertools;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::indexer::RunJobIndex;
use crate::model::{Job, Run};
use crate::storage::PipelineSnapshot;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// How serious a failed check is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Outcome of one named check.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub id: String,
    pub ok: bool,
    pub severity: Severity,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl Check {
    fn pass(id: &str, details: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ok: true,
            severity: Severity::Info,
            details: details.into(),
            suggested_action: None,
        }
    }

    fn fail(id: &str, severity: Severity, details: impl Into<String>, action: &str) -> Self {
        Self {
            id: id.into(),
            ok: false,
            severity,
            details: details.into(),
            suggested_action: Some(action.into()),
        }
    }
}

/// Snapshot sizes and timing for a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub elapsed_ms: u64,
    pub runs: usize,
    pub jobs: usize,
    pub commits: usize,
}

/// Every check run over one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<Check>,
    pub _meta: ReportMeta,
}

impl ValidationReport {
    /// True if every check passed.
    pub fn all_ok(&self) -> bool {
        self.checks.iter().all(|c| c.ok)
    }

    /// Count of checks that failed with a given severity.
    pub fn count_failures(&self, sev: Severity) -> usize {
        self.checks
            .iter()
            .filter(|c| !c.ok && c.severity == sev)
            .count()
    }

    pub fn check(&self, id: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.id == id)
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Run every snapshot check in a fixed order.
pub fn run_validation(snapshot: &PipelineSnapshot) -> ValidationReport {
    let start = std::time::Instant::now();
    let index = snapshot.index();

    let mut checks = Vec::new();
    checks.push(validate_has_data(snapshot));
    checks.push(validate_orphans(&index));
    checks.push(validate_run_timestamps(&snapshot.runs));
    checks.push(validate_job_timestamps(&snapshot.jobs));
    checks.push(validate_job_durations(&snapshot.jobs));
    checks.push(validate_run_order(&snapshot.runs));
    checks.push(validate_unique_run_ids(&snapshot.runs));

    let elapsed_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        checks = checks.len(),
        failed = checks.iter().filter(|c| !c.ok).count(),
        elapsed_ms,
        "validation finished"
    );

    ValidationReport {
        checks,
        _meta: ReportMeta {
            elapsed_ms,
            runs: snapshot.runs.len(),
            jobs: snapshot.jobs.len(),
            commits: snapshot.commits.len(),
        },
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn validate_has_data(snapshot: &PipelineSnapshot) -> Check {
    if snapshot.runs.is_empty() {
        return Check::fail(
            "data.has_runs",
            Severity::Warning,
            "no workflow runs loaded",
            "Fetch workflow runs into the data directory",
        );
    }
    Check::pass(
        "data.has_runs",
        format!("{} runs, {} jobs", snapshot.runs.len(), snapshot.jobs.len()),
    )
}

fn validate_orphans(index: &RunJobIndex<'_>) -> Check {
    let orphans = index.orphans();
    if orphans.is_empty() {
        return Check::pass("jobs.orphans", "every job belongs to a loaded run");
    }
    let sample = orphans.iter().take(5).map(|j| j.id).join(", ");
    Check::fail(
        "jobs.orphans",
        Severity::Warning,
        format!(
            "{} of {} jobs reference no loaded run (e.g. {sample})",
            orphans.len(),
            index.job_count()
        ),
        "Re-fetch runs for the same period as the jobs",
    )
}

fn validate_run_timestamps(runs: &[Run]) -> Check {
    let undated = runs.iter().filter(|r| r.created_at.is_none()).count();
    if undated == 0 {
        return Check::pass("runs.timestamps", "every run has created_at");
    }
    Check::fail(
        "runs.timestamps",
        Severity::Warning,
        format!("{undated} runs have no usable created_at and land in the unknown bucket"),
        "Check the stored timestamps for non ISO-8601 values",
    )
}

fn validate_job_timestamps(jobs: &[Job]) -> Check {
    let undated = jobs
        .iter()
        .filter(|j| j.started_at.or(j.created_at).is_none())
        .count();
    let unfinished = jobs
        .iter()
        .filter(|j| j.started_at.is_some() && j.completed_at.is_none())
        .count();
    if undated == 0 {
        return Check::pass(
            "jobs.timestamps",
            format!("every job is dated; {unfinished} have no completed_at"),
        );
    }
    Check::fail(
        "jobs.timestamps",
        Severity::Warning,
        format!("{undated} jobs have neither started_at nor created_at"),
        "Check the stored timestamps for non ISO-8601 values",
    )
}

fn validate_job_durations(jobs: &[Job]) -> Check {
    let negative: Vec<i64> = jobs
        .iter()
        .filter(|j| matches!((j.started_at, j.completed_at), (Some(s), Some(c)) if c < s))
        .map(|j| j.id)
        .collect();
    if negative.is_empty() {
        return Check::pass("jobs.durations", "no job completes before it starts");
    }
    Check::fail(
        "jobs.durations",
        Severity::Warning,
        format!(
            "{} jobs complete before they start and are ignored by duration aggregates (e.g. {})",
            negative.len(),
            negative.iter().take(5).join(", ")
        ),
        "Inspect the listed jobs in the forge",
    )
}

fn validate_run_order(runs: &[Run]) -> Check {
    let inversions = runs
        .iter()
        .filter_map(|r| r.created_at)
        .tuple_windows()
        .filter(|(a, b)| b < a)
        .count();
    if inversions == 0 {
        return Check::pass("runs.order", "runs ascend by created_at");
    }
    Check::fail(
        "runs.order",
        Severity::Error,
        format!("{inversions} adjacent runs are out of created_at order"),
        "Build the snapshot through the loader or PipelineSnapshot::from_records",
    )
}

fn validate_unique_run_ids(runs: &[Run]) -> Check {
    let mut seen = FxHashSet::default();
    let duplicates: Vec<i64> = runs
        .iter()
        .filter(|r| !seen.insert(r.id))
        .map(|r| r.id)
        .unique()
        .collect();
    if duplicates.is_empty() {
        return Check::pass("runs.unique_ids", "run ids are unique");
    }
    Check::fail(
        "runs.unique_ids",
        Severity::Warning,
        format!(
            "{} run ids repeat; only the first occurrence is indexed (e.g. {})",
            duplicates.len(),
            duplicates.iter().take(5).join(", ")
        ),
        "Deduplicate workflows.json",
    )
}

// ---------------------------------------------------------------------------
// Performance guardrails
// ---------------------------------------------------------------------------

/// Wall-clock timing of one guarded operation.
#[derive(Debug, Clone, Serialize)]
pub struct PerfMeasurement {
    pub id: String,
    pub elapsed_ms: u64,
    pub budget_ms: u64,
    pub within_budget: bool,
    pub details: String,
}

/// Time one run–job index build against a fixed budget.
pub fn perf_index_guardrail(runs: &[Run], jobs: &[Job]) -> PerfMeasurement {
    let start = std::time::Instant::now();
    let budget_ms = 500_u64;

    let index = RunJobIndex::build(runs, jobs);
    let associated = index.job_count() - index.orphans().len();

    let elapsed_ms = start.elapsed().as_millis() as u64;

    PerfMeasurement {
        id: "perf.index_build".into(),
        elapsed_ms,
        budget_ms,
        within_budget: elapsed_ms <= budget_ms,
        details: format!(
            "Indexed {associated} of {} jobs across {} runs in {elapsed_ms}ms",
            index.job_count(),
            index.run_count()
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

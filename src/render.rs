//! Plain-text rendering of aggregates for terminal output.
//!
//! JSON output goes through serde directly; this module only covers the
//! human form.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::analytics::summary::RunRef;
use crate::analytics::validate::Severity;
use crate::analytics::{
    Aggregate, BucketMatrix, DailyDurationSeries, DeploymentFrequency, DurationSummary,
    JobsByStatus, JobsSummary, LeadTime, PairingIndex, PipelineSummary, StatusSummary,
};
use crate::ValidateOutput;

pub trait Render {
    fn render(&self) -> String;
}

impl<T: Render> Render for Aggregate<T> {
    fn render(&self) -> String {
        match self {
            Aggregate::Populated { data } => data.render(),
            Aggregate::Empty { reason } => format!("Nothing to report: {reason}"),
        }
    }
}

/// Left-aligned first column, right-aligned numbers.
fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }
    let mut out = vec![table_line(headers.iter().copied(), &widths)];
    out.extend(
        rows.iter()
            .map(|row| table_line(row.iter().map(String::as_str), &widths)),
    );
    out.join("\n")
}

fn table_line<'c>(cells: impl Iterator<Item = &'c str>, widths: &[usize]) -> String {
    cells
        .enumerate()
        .map(|(i, cell)| {
            let w = widths.get(i).copied().unwrap_or(0);
            if i == 0 {
                format!("{cell:<w$}")
            } else {
                format!("{cell:>w$}")
            }
        })
        .join("  ")
        .trim_end()
        .to_string()
}

fn counts(title: &str, map: &BTreeMap<String, usize>) -> String {
    let rows: Vec<Vec<String>> = map
        .iter()
        .map(|(k, v)| vec![k.clone(), v.to_string()])
        .collect();
    table(&[title, "count"], &rows)
}

fn run_line(label: &str, run: Option<&RunRef>) -> String {
    match run {
        Some(r) => format!(
            "{label}: #{} {} ({})",
            r.id,
            r.name.as_deref().or(r.path.as_deref()).unwrap_or("<unnamed>"),
            r.created_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "undated".into())
        ),
        None => format!("{label}: -"),
    }
}

fn minutes(value: f64) -> String {
    format!("{value:.2}")
}

impl Render for PipelineSummary {
    fn render(&self) -> String {
        [
            format!("Total runs: {}", self.total_runs),
            format!(
                "Completed: {}  In progress: {}  Queued: {}",
                self.completed, self.in_progress, self.queued
            ),
            format!("Unique workflows: {}", self.unique_workflows),
            format!("Most failed: {}", self.most_failed),
            run_line("First run", self.first_run.as_ref()),
            run_line("Last run", self.last_run.as_ref()),
            String::new(),
            counts("conclusion", &self.conclusion_counts),
        ]
        .join("\n")
    }
}

impl Render for StatusSummary {
    fn render(&self) -> String {
        format!(
            "{}\n\n{}\n\n{} runs",
            counts("status", &self.status_counts),
            counts("conclusion", &self.conclusion_counts),
            self.runs.len()
        )
    }
}

impl Render for BucketMatrix {
    fn render(&self) -> String {
        let mut headers: Vec<&str> = vec!["", "total"];
        headers.extend(self.buckets.iter().map(String::as_str));
        if self.unknown > 0 {
            headers.push("unknown");
        }
        let rows: Vec<Vec<String>> = self
            .dimensions
            .iter()
            .enumerate()
            .map(|(d, dim)| {
                let cells = self.matrix.get(d).map(Vec::as_slice).unwrap_or_default();
                let unknown = self.unknown_by_dimension.get(d).copied().unwrap_or(0);
                let mut row = vec![
                    dim.clone(),
                    (cells.iter().sum::<usize>() + unknown).to_string(),
                ];
                row.extend(cells.iter().map(usize::to_string));
                if self.unknown > 0 {
                    row.push(unknown.to_string());
                }
                row
            })
            .collect();
        table(&headers, &rows)
    }
}

impl Render for JobsByStatus {
    fn render(&self) -> String {
        format!(
            "Job: {} ({})\n\n{}\n\n{}",
            self.job_name,
            self.workflow,
            counts("run conclusion", &self.run_conclusions),
            self.executions.render()
        )
    }
}

impl Render for JobsSummary {
    fn render(&self) -> String {
        let top: Vec<Vec<String>> = self
            .jobs_by_name
            .iter()
            .sorted_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)))
            .take(10)
            .map(|(name, entry)| vec![name.clone(), entry.count.to_string()])
            .collect();
        format!(
            "Total jobs: {}\nUnique jobs: {}\n\n{}\n\n{}",
            self.total_jobs,
            self.unique_jobs,
            counts("conclusion", &self.conclusions),
            table(&["job", "count"], &top)
        )
    }
}

impl Render for DurationSummary {
    fn render(&self) -> String {
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| {
                vec![
                    r.name.clone(),
                    r.count.to_string(),
                    minutes(r.average_minutes),
                    minutes(r.total_minutes),
                ]
            })
            .collect();
        format!(
            "{}\n\nRanked by {}; {} of {} records had no usable duration",
            table(&["name", "count", "avg min", "total min"], &rows),
            self.metric,
            self.skipped,
            self.records
        )
    }
}

impl Render for DailyDurationSeries {
    fn render(&self) -> String {
        let rows: Vec<Vec<String>> = self
            .days
            .iter()
            .map(|d| {
                vec![
                    d.date.to_string(),
                    d.count.to_string(),
                    minutes(d.average_minutes),
                    minutes(d.total_minutes),
                ]
            })
            .collect();
        table(&["date", "count", "avg min", "total min"], &rows)
    }
}

impl Render for DeploymentFrequency {
    fn render(&self) -> String {
        let section = |title: &str, buckets: &[crate::analytics::DeploymentBucket]| {
            let rows: Vec<Vec<String>> = buckets
                .iter()
                .map(|b| {
                    vec![
                        b.key.clone(),
                        b.count.to_string(),
                        b.commit.as_deref().map(short_sha).unwrap_or("-").to_string(),
                    ]
                })
                .collect();
            table(&[title, "deployments", "latest commit"], &rows)
        };
        [
            section("day", &self.days),
            section("week", &self.weeks),
            section("month", &self.months),
        ]
        .join("\n\n")
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

impl Render for LeadTime {
    fn render(&self) -> String {
        let rows: Vec<Vec<String>> = self
            .windows
            .iter()
            .map(|w| {
                vec![
                    w.key.clone(),
                    w.deployments.to_string(),
                    w.commits.len().to_string(),
                    w.mean_lead_time_hours
                        .map(|h| format!("{h:.2}"))
                        .unwrap_or_else(|| "-".into()),
                ]
            })
            .collect();
        table(&[self.group_by.to_string().as_str(), "deployments", "commits", "mean hours"], &rows)
    }
}

impl Render for PairingIndex {
    fn render(&self) -> String {
        format!(
            "Pairing index: {:.2}% ({} of {} commits paired)",
            self.pairing_index_percentage, self.paired_commits, self.total_commits
        )
    }
}

impl Render for ValidateOutput {
    fn render(&self) -> String {
        let mut lines: Vec<String> = self
            .report
            .checks
            .iter()
            .map(|c| {
                let tag = match (c.ok, c.severity) {
                    (true, _) => "ok",
                    (false, Severity::Info) => "info",
                    (false, Severity::Warning) => "warn",
                    (false, Severity::Error) => "FAIL",
                };
                match &c.suggested_action {
                    Some(action) if !c.ok => format!("[{tag}] {}: {} ({action})", c.id, c.details),
                    _ => format!("[{tag}] {}: {}", c.id, c.details),
                }
            })
            .collect();
        lines.extend(self.perf.iter().map(|p| {
            format!(
                "[{}] {}: {} (budget {}ms)",
                if p.within_budget { "ok" } else { "slow" },
                p.id,
                p.details,
                p.budget_ms
            )
        }));
        lines.join("\n")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

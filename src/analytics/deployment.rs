//! Deployment frequency and lead time.
//!
//! A deployment is a successful execution of one named job inside a run of
//! one workflow. Both names are required; without them the aggregate is
//! empty and the snapshot is never scanned. Lead time is a windowed join of
//! the commit log against the deployment buckets.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::bucketing::{bucket_key, bucket_window, representative_of};
use super::derive::{hours_between, mean, round2};
use super::engine::PipelineQuery;
use super::filter::{FilterSpec, apply, parse_raw};
use super::types::{Aggregate, AnalyticsResult, EmptyReason, GroupBy, QueryOptions};
use crate::indexer::{restrict_to_runs, run_id_set};
use crate::model::Commit;

/// One successful execution of the deployment job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deployment {
    pub job_id: i64,
    pub run_id: Option<i64>,
    pub deployed_at: DateTime<Utc>,
    /// `head_commit.id` of the parent run.
    pub commit: Option<String>,
    /// `html_url` of the parent run.
    pub link: Option<String>,
}

/// Deployments within one calendar bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentBucket {
    pub key: String,
    pub date: NaiveDate,
    pub count: usize,
    /// Commit and link of the latest deployment in the bucket.
    pub commit: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeploymentFrequency {
    pub days: Vec<DeploymentBucket>,
    pub weeks: Vec<DeploymentBucket>,
    pub months: Vec<DeploymentBucket>,
    /// Ascending by `deployed_at`.
    pub deployments: Vec<Deployment>,
}

impl DeploymentFrequency {
    pub fn buckets(&self, group_by: GroupBy) -> &[DeploymentBucket] {
        match group_by {
            GroupBy::Day => &self.days,
            GroupBy::Week => &self.weeks,
            GroupBy::Month => &self.months,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadTimeCommit {
    pub hash: String,
    pub author: Option<String>,
    pub authored_at: DateTime<Utc>,
    /// Hours until the first deployment at or after `authored_at` in the
    /// same window.
    pub lead_time_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadTimeWindow {
    pub key: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub deployments: usize,
    pub commits: Vec<LeadTimeCommit>,
    pub mean_lead_time_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeadTime {
    pub group_by: GroupBy,
    /// Only buckets with at least one deployment.
    pub windows: Vec<LeadTimeWindow>,
}

// ---------------------------------------------------------------------------
// Bucketing and joins
// ---------------------------------------------------------------------------

/// Group deployments (ascending) into buckets at `group_by`.
pub fn bucket_deployments(deployments: &[Deployment], group_by: GroupBy) -> Vec<DeploymentBucket> {
    let mut buckets: BTreeMap<String, DeploymentBucket> = BTreeMap::new();
    for d in deployments {
        let key = bucket_key(&d.deployed_at, group_by);
        let bucket = buckets.entry(key.clone()).or_insert_with(|| DeploymentBucket {
            key,
            date: representative_of(d.deployed_at.date_naive(), group_by),
            count: 0,
            commit: None,
            link: None,
        });
        bucket.count += 1;
        bucket.commit = d.commit.clone();
        bucket.link = d.link.clone();
    }
    buckets.into_values().collect()
}

/// Match commits (ascending by `authored_at`) against the windows of
/// deployments (ascending by `deployed_at`).
pub fn join_lead_time(
    deployments: &[Deployment],
    commits: &[Commit],
    group_by: GroupBy,
) -> LeadTime {
    let dated: Vec<(&Commit, DateTime<Utc>)> = commits
        .iter()
        .filter_map(|c| Some((c, c.authored_at?)))
        .collect();

    let windows = bucket_deployments(deployments, group_by)
        .into_iter()
        .filter_map(|bucket| {
            let (start, end) = bucket_window(&bucket.key, group_by)?;
            let in_window = dated.partition_point(|(_, t)| *t < start)
                ..dated.partition_point(|(_, t)| *t < end);
            let deployed = &deployments[deployments.partition_point(|d| d.deployed_at < start)
                ..deployments.partition_point(|d| d.deployed_at < end)];

            let commits: Vec<LeadTimeCommit> = dated[in_window]
                .iter()
                .map(|(commit, authored_at)| {
                    let first = deployed.partition_point(|d| d.deployed_at < *authored_at);
                    LeadTimeCommit {
                        hash: commit.hash.clone(),
                        author: commit.author.clone(),
                        authored_at: *authored_at,
                        lead_time_hours: deployed
                            .get(first)
                            .and_then(|d| hours_between(*authored_at, d.deployed_at))
                            .map(round2),
                    }
                })
                .collect();

            let hours: Vec<f64> = commits.iter().filter_map(|c| c.lead_time_hours).collect();
            Some(LeadTimeWindow {
                key: bucket.key,
                start,
                end,
                deployments: bucket.count,
                mean_lead_time_hours: mean(&hours).map(round2),
                commits,
            })
        })
        .collect();

    LeadTime { group_by, windows }
}

// ---------------------------------------------------------------------------
// Query entry points
// ---------------------------------------------------------------------------

/// True when `raw_filters` names a workflow through `path` or `workflow_path`.
pub fn has_raw_workflow_path(opts: &QueryOptions) -> bool {
    opts.raw_filters.as_deref().is_some_and(|raw| {
        parse_raw(raw)
            .iter()
            .any(|(k, v)| (k == "path" || k == "workflow_path") && !v.is_empty())
    })
}

/// Which required parameter is absent, checked without reading any data.
fn missing_parameter(opts: &QueryOptions) -> Option<EmptyReason> {
    if opts.workflow_path().is_none() && !has_raw_workflow_path(opts) {
        return Some(EmptyReason::MissingParameter("workflow_path".into()));
    }
    if opts.job_name().is_none() {
        return Some(EmptyReason::MissingParameter("job_name".into()));
    }
    None
}

impl<'a> PipelineQuery<'a> {
    /// Successful executions of `opts.job_name` in runs of the filtered
    /// workflow, ascending by deployment time.
    pub fn deployments(&self, opts: &QueryOptions) -> AnalyticsResult<Aggregate<Vec<Deployment>>> {
        if let Some(reason) = missing_parameter(opts) {
            return Ok(Aggregate::empty(reason));
        }
        if !self.has_runs() || !self.has_jobs() {
            return Ok(Aggregate::empty(EmptyReason::NoData));
        }

        // Filters narrow runs only. Deployment jobs are the named jobs of
        // those runs, whatever their own dates and `force_all_jobs`.
        let spec = FilterSpec::from_options(opts)?;
        let runs = self.filtered_runs(&spec);
        let run_ids = run_id_set(runs.iter().copied());
        let named = apply(&self.snapshot().jobs, &FilterSpec::named(opts.job_name()));
        let jobs = restrict_to_runs(named, &run_ids);

        let mut deployments: Vec<Deployment> = jobs
            .iter()
            .filter(|job| job.is_successful())
            .filter_map(|job| {
                let Some(deployed_at) = job.completed_at.or(job.started_at) else {
                    tracing::debug!(job_id = job.id, "deployment without a timestamp skipped");
                    return None;
                };
                let run = self.index().parent_run(job);
                Some(Deployment {
                    job_id: job.id,
                    run_id: job.run_id,
                    deployed_at,
                    commit: run.and_then(|r| r.commit_id()).map(str::to_string),
                    link: run.and_then(|r| r.html_url.clone()),
                })
            })
            .collect();
        deployments.sort_by_key(|d| d.deployed_at);

        tracing::debug!(
            runs = runs.len(),
            deployments = deployments.len(),
            "deployments resolved"
        );
        if deployments.is_empty() {
            return Ok(Aggregate::empty(EmptyReason::NoMatches));
        }
        Ok(Aggregate::populated(deployments))
    }

    /// Deployment counts per day, ISO week and month.
    pub fn deployment_frequency(&self, opts: &QueryOptions) -> AnalyticsResult<Aggregate<DeploymentFrequency>> {
        Ok(self.deployments(opts)?.map(|deployments| DeploymentFrequency {
            days: bucket_deployments(&deployments, GroupBy::Day),
            weeks: bucket_deployments(&deployments, GroupBy::Week),
            months: bucket_deployments(&deployments, GroupBy::Month),
            deployments,
        }))
    }

    /// Commits per deployment window at `opts.aggregate_by`.
    pub fn lead_time(&self, opts: &QueryOptions) -> AnalyticsResult<Aggregate<LeadTime>> {
        let deployments = self.deployments(opts)?;
        Ok(deployments
            .map(|d| join_lead_time(&d, &self.snapshot().commits, opts.aggregate_by)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

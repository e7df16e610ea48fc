//! Query entry point: one snapshot, one index, many aggregates.
//!
//! [`PipelineQuery::new`] builds the run–job index before anything else, so
//! every run-scoped filter and aggregate sees a complete association. The
//! aggregators live in sibling modules as further `impl PipelineQuery`
//! blocks and all start from [`PipelineQuery::scope`].

use super::filter::{FilterSpec, apply};
use super::types::{AnalyticsResult, QueryOptions};
use crate::indexer::{RunJobIndex, restrict_to_runs, run_id_set};
use crate::model::{Job, Run};
use crate::storage::PipelineSnapshot;

/// Read-only query handle over a snapshot.
#[derive(Debug)]
pub struct PipelineQuery<'a> {
    snapshot: &'a PipelineSnapshot,
    index: RunJobIndex<'a>,
}

/// The filtered record set one aggregate works on.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    pub spec: FilterSpec,
    /// Runs passing `spec`, in snapshot (`created_at`) order.
    pub runs: Vec<&'a Run>,
    /// Jobs passing the job-side spec and, unless `force_all_jobs`,
    /// belonging to one of `runs`.
    pub jobs: Vec<&'a Job>,
}

impl<'a> PipelineQuery<'a> {
    pub fn new(snapshot: &'a PipelineSnapshot) -> Self {
        let index = snapshot.index();
        Self { snapshot, index }
    }

    pub fn snapshot(&self) -> &'a PipelineSnapshot {
        self.snapshot
    }

    pub fn index(&self) -> &RunJobIndex<'a> {
        &self.index
    }

    pub fn has_runs(&self) -> bool {
        !self.snapshot.runs.is_empty()
    }

    pub fn has_jobs(&self) -> bool {
        !self.snapshot.jobs.is_empty()
    }

    /// Runs passing `spec`.
    pub fn filtered_runs(&self, spec: &FilterSpec) -> Vec<&'a Run> {
        apply(&self.snapshot.runs, spec)
    }

    /// Parse `opts` once and narrow runs and jobs.
    ///
    /// Fails only on caller input (bad dates, inverted range).
    pub fn scope(&self, opts: &QueryOptions) -> AnalyticsResult<Scope<'a>> {
        let spec = FilterSpec::from_options(opts)?;
        let runs = self.filtered_runs(&spec);

        let job_spec = spec.job_scope(opts.job_name());
        let mut jobs = apply(&self.snapshot.jobs, &job_spec);
        if !opts.force_all_jobs {
            let ids = run_id_set(runs.iter().copied());
            jobs = restrict_to_runs(jobs, &ids);
        }

        let exclude = opts.exclude_tokens();
        if !exclude.is_empty() {
            jobs.retain(|job| {
                let name = job.name.as_deref().unwrap_or_default().to_lowercase();
                !exclude.iter().any(|token| name.contains(token.as_str()))
            });
        }

        tracing::debug!(
            runs = runs.len(),
            jobs = jobs.len(),
            force_all_jobs = opts.force_all_jobs,
            "query scope resolved"
        );
        Ok(Scope { spec, runs, jobs })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::bucketing::parse_timestamp;

    fn snapshot() -> PipelineSnapshot {
        let runs = vec![
            Run {
                id: 1,
                path: Some(".github/workflows/ci.yml".into()),
                event: Some("push".into()),
                created_at: parse_timestamp("2023-10-01T10:00:00Z"),
                ..Default::default()
            },
            Run {
                id: 2,
                path: Some(".github/workflows/deploy.yml".into()),
                event: Some("push".into()),
                created_at: parse_timestamp("2023-10-02T10:00:00Z"),
                ..Default::default()
            },
        ];
        let job = |id, run_id, name: &str| Job {
            id,
            run_id,
            name: Some(name.into()),
            started_at: parse_timestamp("2023-10-01T10:05:00Z"),
            ..Default::default()
        };
        let jobs = vec![
            job(10, Some(1), "build"),
            job(11, Some(2), "deploy"),
            job(12, Some(99), "build"),
            job(13, Some(1), "lint docs"),
        ];
        PipelineSnapshot::from_records(runs, jobs, vec![])
    }

    fn job_ids(scope: &Scope<'_>) -> Vec<i64> {
        scope.jobs.iter().map(|j| j.id).collect()
    }

    #[test]
    fn jobs_are_restricted_to_filtered_runs() {
        let snap = snapshot();
        let query = PipelineQuery::new(&snap);
        let opts = QueryOptions {
            workflow_path: Some("ci".into()),
            ..Default::default()
        };
        let scope = query.scope(&opts).unwrap();
        assert_eq!(scope.runs.len(), 1);
        assert_eq!(job_ids(&scope), vec![10, 13]);
    }

    #[test]
    fn orphans_only_visible_with_force_all_jobs() {
        let snap = snapshot();
        let query = PipelineQuery::new(&snap);

        let scoped = query.scope(&QueryOptions::default()).unwrap();
        assert!(!job_ids(&scoped).contains(&12));

        let forced = query
            .scope(&QueryOptions {
                force_all_jobs: true,
                ..Default::default()
            })
            .unwrap();
        assert!(job_ids(&forced).contains(&12));
    }

    #[test]
    fn job_name_and_exclusions_narrow_jobs() {
        let snap = snapshot();
        let query = PipelineQuery::new(&snap);
        let named = query
            .scope(&QueryOptions {
                job_name: Some("BUILD".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(job_ids(&named), vec![10]);

        let excluded = query
            .scope(&QueryOptions {
                exclude_jobs: Some("Docs".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(job_ids(&excluded), vec![10, 11]);
    }

    #[test]
    fn invalid_dates_propagate() {
        let snap = snapshot();
        let query = PipelineQuery::new(&snap);
        let opts = QueryOptions {
            end_date: Some("31-10-2023".into()),
            ..Default::default()
        };
        assert!(query.scope(&opts).is_err());
    }
}

//! Run–job association index.
//!
//! [`RunJobIndex::build`] makes one pass over runs and one pass over jobs,
//! so association is `O(R + J)` time and `O(J)` space. Jobs whose `run_id`
//! matches no loaded run are kept aside as orphans: they stay visible to
//! job-scoped queries and are absent from every run-correlated view.

use std::collections::hash_map::Entry;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{Job, Run};

/// Borrowed index over a snapshot's runs and jobs.
#[derive(Debug)]
pub struct RunJobIndex<'a> {
    runs: &'a [Run],
    runs_by_id: FxHashMap<i64, &'a Run>,
    jobs_by_run: FxHashMap<i64, Vec<&'a Job>>,
    orphans: Vec<&'a Job>,
    job_count: usize,
}

impl<'a> RunJobIndex<'a> {
    /// Build the association in a single pass over each sequence.
    pub fn build(runs: &'a [Run], jobs: &'a [Job]) -> Self {
        let mut runs_by_id: FxHashMap<i64, &'a Run> =
            FxHashMap::with_capacity_and_hasher(runs.len(), Default::default());
        for run in runs {
            match runs_by_id.entry(run.id) {
                Entry::Vacant(slot) => {
                    slot.insert(run);
                }
                // First occurrence wins.
                Entry::Occupied(_) => {
                    tracing::debug!(run_id = run.id, "duplicate run id in snapshot");
                }
            }
        }

        let mut jobs_by_run: FxHashMap<i64, Vec<&'a Job>> = FxHashMap::default();
        let mut orphans = Vec::new();
        for job in jobs {
            match job.run_id.filter(|id| runs_by_id.contains_key(id)) {
                Some(run_id) => jobs_by_run.entry(run_id).or_default().push(job),
                None => orphans.push(job),
            }
        }

        if !orphans.is_empty() {
            tracing::debug!(
                orphans = orphans.len(),
                jobs = jobs.len(),
                "jobs without a loaded parent run"
            );
        }

        Self {
            runs,
            runs_by_id,
            jobs_by_run,
            orphans,
            job_count: jobs.len(),
        }
    }

    /// Jobs belonging to `run_id`, in snapshot order.
    pub fn jobs_for(&self, run_id: i64) -> &[&'a Job] {
        self.jobs_by_run
            .get(&run_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn run(&self, run_id: i64) -> Option<&'a Run> {
        self.runs_by_id.get(&run_id).copied()
    }

    /// The run a job belongs to, `None` for orphans.
    pub fn parent_run(&self, job: &Job) -> Option<&'a Run> {
        job.run_id.and_then(|id| self.run(id))
    }

    pub fn orphans(&self) -> &[&'a Job] {
        &self.orphans
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    pub fn job_count(&self) -> usize {
        self.job_count
    }

    /// Eager association: every run with its jobs, in run order.
    pub fn associations<'s>(&'s self) -> impl Iterator<Item = (&'a Run, &'s [&'a Job])> + 's {
        self.runs.iter().map(|run| (run, self.jobs_for(run.id)))
    }
}

/// Ids of a (filtered) run subset.
pub fn run_id_set<'r, I>(runs: I) -> FxHashSet<i64>
where
    I: IntoIterator<Item = &'r Run>,
{
    runs.into_iter().map(|r| r.id).collect()
}

/// Keep only jobs whose `run_id` is in `run_ids`, preserving order.
///
/// Jobs without a `run_id` never match.
pub fn restrict_to_runs<'a, I>(jobs: I, run_ids: &FxHashSet<i64>) -> Vec<&'a Job>
where
    I: IntoIterator<Item = &'a Job>,
{
    jobs.into_iter()
        .filter(|job| job.run_id.is_some_and(|id| run_ids.contains(&id)))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

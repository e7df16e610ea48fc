//! Record loader and the in-memory snapshot every query runs against.

pub mod json_store;

pub use json_store::{COMMITS_FILE, JOBS_FILE, JsonStore, StorageError, WORKFLOWS_FILE};

use crate::indexer::RunJobIndex;
use crate::model::{Commit, Job, Run};

/// Fully materialized, immutable input for one query.
///
/// Runs and jobs are in ascending `created_at` order (undated records
/// first, ties in load order); commits in ascending `authored_at` order.
#[derive(Debug, Clone, Default)]
pub struct PipelineSnapshot {
    pub runs: Vec<Run>,
    pub jobs: Vec<Job>,
    pub commits: Vec<Commit>,
}

impl PipelineSnapshot {
    /// Normalize in-memory records the same way the loader does.
    pub fn from_records(mut runs: Vec<Run>, mut jobs: Vec<Job>, mut commits: Vec<Commit>) -> Self {
        runs.sort_by_key(|r| r.created_at);
        jobs.sort_by_key(|j| j.created_at);
        commits.sort_by_key(|c| c.authored_at);
        Self {
            runs,
            jobs,
            commits,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty() && self.jobs.is_empty()
    }

    /// Build the run–job association over this snapshot.
    pub fn index(&self) -> RunJobIndex<'_> {
        RunJobIndex::build(&self.runs, &self.jobs)
    }
}

//! Fuzz target for the JSON record loader.
//!
//! Arbitrary file contents must produce either a snapshot or a typed
//! `StorageError`, and any snapshot must survive indexing and validation.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::fs;
use tempfile::TempDir;

use software_metrics::analytics::validate::run_validation;
use software_metrics::storage::{COMMITS_FILE, JOBS_FILE, JsonStore, WORKFLOWS_FILE};

#[derive(Arbitrary, Debug)]
struct StoreInput {
    workflows: String,
    jobs: String,
    commits: Option<String>,
}

fuzz_target!(|input: StoreInput| {
    let temp_dir = match TempDir::new() {
        Ok(dir) => dir,
        Err(_) => return,
    };
    let dir = temp_dir.path();
    if fs::write(dir.join(WORKFLOWS_FILE), &input.workflows).is_err()
        || fs::write(dir.join(JOBS_FILE), &input.jobs).is_err()
    {
        return;
    }
    if let Some(commits) = &input.commits
        && fs::write(dir.join(COMMITS_FILE), commits).is_err()
    {
        return;
    }

    if let Ok(snapshot) = JsonStore::new(dir).load_snapshot() {
        let index = snapshot.index();
        assert!(index.orphans().len() <= snapshot.jobs.len());
        let _ = run_validation(&snapshot);
    }
});

//! JSON file store written by the forge fetch clients.
//!
//! Layout under the store directory:
//!
//! ```text
//! <store_data>/
//!   workflows.json   # Run[]
//!   jobs.json        # Job[]
//!   commits.json     # Commit[]
//! ```
//!
//! A missing file means "not fetched yet" and loads as an empty array.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use super::PipelineSnapshot;
use crate::config::Configuration;
use crate::model::{Commit, Job, Run};

pub const WORKFLOWS_FILE: &str = "workflows.json";
pub const JOBS_FILE: &str = "jobs.json";
pub const COMMITS_FILE: &str = "commits.json";

/// Errors raised while reading stored records.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", file.display())]
    Parse {
        file: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads the JSON arrays under one store directory.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &Configuration) -> Self {
        Self::new(config.store_data.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load_runs(&self) -> Result<Vec<Run>, StorageError> {
        self.read_array(WORKFLOWS_FILE)
    }

    pub fn load_jobs(&self) -> Result<Vec<Job>, StorageError> {
        self.read_array(JOBS_FILE)
    }

    pub fn load_commits(&self) -> Result<Vec<Commit>, StorageError> {
        self.read_array(COMMITS_FILE)
    }

    /// Load and normalize all three arrays.
    pub fn load_snapshot(&self) -> Result<PipelineSnapshot, StorageError> {
        let runs = self.load_runs()?;
        let jobs = self.load_jobs()?;
        let commits = self.load_commits()?;
        tracing::info!(
            dir = %self.dir.display(),
            runs = runs.len(),
            jobs = jobs.len(),
            commits = commits.len(),
            "loaded pipeline snapshot"
        );
        Ok(PipelineSnapshot::from_records(runs, jobs, commits))
    }

    fn read_array<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, StorageError> {
        let path = self.dir.join(file);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "no data file found; fetch it first");
                return Ok(Vec::new());
            }
            Err(source) => return Err(StorageError::Read { path, source }),
        };
        if content.trim().is_empty() {
            tracing::warn!(path = %path.display(), "data file is empty");
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|source| StorageError::Parse { file: path, source })
    }
}

//! Normalized pipeline record structs.
//!
//! These mirror the JSON arrays written by the forge fetch clients
//! (`workflows.json`, `jobs.json`, `commits.json`). Every field the fetchers
//! may omit is optional; unknown fields are ignored. Timestamps are parsed
//! exactly once, while deserializing, and malformed values become `None`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::derive::minutes_between;

/// One execution of a CI workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    #[serde(default)]
    pub id: i64,
    /// Workflow file identifier, e.g. `.github/workflows/ci.yml`.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// queued / in_progress / completed / ...
    #[serde(default)]
    pub status: Option<String>,
    /// success / failure / cancelled / ...
    #[serde(default)]
    pub conclusion: Option<String>,
    /// Trigger type (push, pull_request, schedule, ...).
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp::deserialize")]
    pub run_started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp::deserialize")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub head_commit: Option<HeadCommit>,
    #[serde(default)]
    pub run_attempt: Option<u32>,
}

impl Run {
    /// Commit hash this run was triggered for, if the fetcher recorded one.
    pub fn commit_id(&self) -> Option<&str> {
        self.head_commit.as_ref().and_then(|c| c.id.as_deref())
    }

    /// Wall-clock duration in minutes, from `run_started_at` (or `created_at`)
    /// to `updated_at`. `None` when an endpoint is missing or the delta is
    /// negative.
    pub fn duration_minutes(&self) -> Option<f64> {
        let start = self.run_started_at.or(self.created_at)?;
        minutes_between(start, self.updated_at?)
    }

    /// Workflow path used as the grouping key, `<unnamed>` when absent.
    pub fn workflow_key(&self) -> &str {
        self.path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or("<unnamed>")
    }

    /// True when the run comes from a YAML workflow definition rather than a
    /// dynamic or built-in workflow.
    pub fn is_defined_workflow(&self) -> bool {
        self.path.as_deref().is_some_and(|p| {
            let p = p.trim().to_lowercase();
            p.ends_with(".yml") || p.ends_with(".yaml")
        })
    }
}

/// Commit metadata attached to a run by the forge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadCommit {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp::deserialize")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitAuthor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// One unit of work inside a run.
///
/// `run_id` is a lookup key, not ownership: a job whose run is not in the
/// snapshot is an orphan and only shows up in job-scoped views.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub run_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp::deserialize")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp::deserialize")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub workflow_name: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Job {
    /// Execution time in minutes. Both endpoints are required and negative
    /// deltas are discarded.
    pub fn duration_minutes(&self) -> Option<f64> {
        minutes_between(self.started_at?, self.completed_at?)
    }

    /// Trimmed job name, `<unnamed>` when absent or blank.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("<unnamed>")
    }

    pub fn is_successful(&self) -> bool {
        self.conclusion
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case("success"))
    }
}

/// An entry of the commit log, used for lead time and pairing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    #[serde(default, alias = "sha", alias = "id")]
    pub hash: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(
        default,
        alias = "date",
        alias = "timestamp",
        deserialize_with = "lenient_timestamp::deserialize"
    )]
    pub authored_at: Option<DateTime<Utc>>,
}

/// Accepts any JSON value for a timestamp field; strings that parse become
/// `Some`, everything else (null, numbers, garbage) becomes `None`.
mod lenient_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    use crate::analytics::bucketing::parse_timestamp;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(parse_timestamp))
    }
}

//! Shared types for the analytics library.
//!
//! These types are used by the CLI commands and every aggregator, keeping
//! query options, bucketing granularity, and the empty/populated result
//! distinction in one place.

use std::str::FromStr;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Caller-input errors. Data-quality problems never surface here; they are
/// recovered inside the aggregators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalyticsError {
    /// A `start_date` / `end_date` that is not an ISO `YYYY-MM-DD` date.
    #[error("invalid {field} '{value}': expected YYYY-MM-DD")]
    InvalidDateRange { field: String, value: String },
    /// Any other option that cannot be interpreted (unknown metric, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience alias.
pub type AnalyticsResult<T> = std::result::Result<T, AnalyticsError>;

// ---------------------------------------------------------------------------
// GroupBy
// ---------------------------------------------------------------------------

/// Calendar bucket granularity (library-side, no clap dependency).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Day,
    Week,
    Month,
}

impl std::fmt::Display for GroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Day => write!(f, "day"),
            Self::Week => write!(f, "week"),
            Self::Month => write!(f, "month"),
        }
    }
}

impl FromStr for GroupBy {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(AnalyticsError::InvalidArgument(format!(
                "aggregate_by must be day, week or month (got '{other}')"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

/// Sort key for duration rankings.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Avg,
    Sum,
    Count,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Avg => write!(f, "avg"),
            Self::Sum => write!(f, "sum"),
            Self::Count => write!(f, "count"),
        }
    }
}

impl FromStr for Metric {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "avg" | "average" => Ok(Self::Avg),
            "sum" | "total" => Ok(Self::Sum),
            "count" => Ok(Self::Count),
            other => Err(AnalyticsError::InvalidArgument(format!(
                "metric must be avg, sum or count (got '{other}')"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Query options
// ---------------------------------------------------------------------------

/// Parameters accepted by every aggregator entry point.
///
/// Dates and raw filters stay as caller strings here; they are parsed once
/// into a [`FilterSpec`](super::filter::FilterSpec) when a query starts.
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    /// Inclusive lower bound, `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    pub end_date: Option<String>,
    /// Case-insensitive substring of the workflow `path`.
    pub workflow_path: Option<String>,
    pub job_name: Option<String>,
    /// Flat `k=v,k2=v2` filter string.
    pub raw_filters: Option<String>,
    /// Keep only the first N rows of ranked results.
    pub top: Option<usize>,
    pub metric: Metric,
    pub aggregate_by: GroupBy,
    /// Skip restricting jobs to the filtered run set.
    pub force_all_jobs: bool,
    /// Comma-separated substrings; matching job names are dropped.
    pub exclude_jobs: Option<String>,
    /// Only runs whose workflow path is a `.yml` / `.yaml` definition.
    pub include_defined_only: bool,
}

impl QueryOptions {
    /// Trimmed, non-empty job name.
    pub fn job_name(&self) -> Option<&str> {
        non_blank(self.job_name.as_deref())
    }

    /// Trimmed, non-empty workflow path.
    pub fn workflow_path(&self) -> Option<&str> {
        non_blank(self.workflow_path.as_deref())
    }

    /// Lowercased exclusion tokens from `exclude_jobs`.
    pub fn exclude_tokens(&self) -> Vec<String> {
        self.exclude_jobs
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// Why an aggregator had nothing to compute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// The snapshot holds no records of the needed kind.
    NoData,
    /// A parameter the aggregate cannot run without was not supplied.
    MissingParameter(String),
    /// Records exist but none survived filtering.
    NoMatches,
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoData => write!(f, "no pipeline data loaded"),
            Self::MissingParameter(name) => write!(f, "missing required parameter '{name}'"),
            Self::NoMatches => write!(f, "no records matched the filters"),
        }
    }
}

/// Either a populated aggregate or an explicit "nothing to compute".
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Aggregate<T> {
    Populated { data: T },
    Empty { reason: EmptyReason },
}

impl<T> Aggregate<T> {
    pub fn populated(data: T) -> Self {
        Self::Populated { data }
    }

    pub fn empty(reason: EmptyReason) -> Self {
        Self::Empty { reason }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Populated { data } => Some(data),
            Self::Empty { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&EmptyReason> {
        match self {
            Self::Populated { .. } => None,
            Self::Empty { reason } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Aggregate<U> {
        match self {
            Self::Populated { data } => Aggregate::Populated { data: f(data) },
            Self::Empty { reason } => Aggregate::Empty { reason },
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Populated { data } => Some(data),
            Self::Empty { .. } => None,
        }
    }
}

impl<T: Default> Aggregate<T> {
    /// The data, or the empty-shaped value (empty counts, empty lists).
    pub fn unwrap_or_default(self) -> T {
        self.into_data().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

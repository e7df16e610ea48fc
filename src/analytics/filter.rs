//! Filter engine: flat `k=v,k2=v2` grammar → typed [`FilterSpec`] →
//! compiled predicates.
//!
//! Raw strings are parsed once at the boundary. Predicates for different keys
//! are ANDed, tokens within a multi-value key are ORed, comparisons are
//! case-insensitive, and a record missing the inspected field fails the
//! predicate. An empty spec compiles to no predicates, so `apply` is the
//! identity.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::bucketing::{Timestamped, parse_date};
use super::types::{AnalyticsError, AnalyticsResult, QueryOptions};
use crate::model::{Commit, Job, Run};

// ---------------------------------------------------------------------------
// Raw grammar
// ---------------------------------------------------------------------------

/// Split a raw filter string on `,` then `=`.
///
/// Keys are trimmed and lowercased, values trimmed. Fragments without `=`
/// or with an empty key are dropped, so for `status=queued,completed` only
/// `queued` reaches the `status` filter. A repeated key keeps its last value.
pub fn parse_raw(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim().to_lowercase();
            (!key.is_empty()).then(|| (key, value.trim().to_string()))
        })
        .collect()
}

/// Normalize a value into its lowercase, de-duplicated token set.
fn value_set(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in raw.split(',').map(|t| t.trim().to_lowercase()) {
        if !token.is_empty() && !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// FilterSpec
// ---------------------------------------------------------------------------

/// Typed filter description shared by runs and jobs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterSpec {
    /// Inclusive lower day bound on the record date.
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper day bound on the record date.
    pub end_date: Option<NaiveDate>,
    /// Lowercased substring of the workflow path.
    pub path: Option<String>,
    pub event: Vec<String>,
    pub target_branch: Vec<String>,
    pub status: Vec<String>,
    pub conclusion: Vec<String>,
    pub name: Vec<String>,
    pub include_defined_only: bool,
}

impl FilterSpec {
    /// Parse a raw `k=v,k2=v2` string.
    pub fn parse(raw: &str) -> AnalyticsResult<Self> {
        Self::from_pairs(&parse_raw(raw))
    }

    /// Build from already split key/value pairs. Unrecognized keys are
    /// ignored; unparseable date bounds fail fast.
    pub fn from_pairs(pairs: &BTreeMap<String, String>) -> AnalyticsResult<Self> {
        let mut spec = Self::default();
        for (key, value) in pairs {
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "start_date" => spec.start_date = Some(parse_date("start_date", value)?),
                "end_date" => spec.end_date = Some(parse_date("end_date", value)?),
                "path" | "workflow_path" => spec.path = Some(value.to_lowercase()),
                "event" => spec.event = value_set(value),
                "target_branch" => spec.target_branch = value_set(value),
                "status" => spec.status = value_set(value),
                "conclusion" => spec.conclusion = value_set(value),
                "name" => spec.name = value_set(value),
                "include_defined_only" => spec.include_defined_only = is_truthy(value),
                other => tracing::debug!(key = other, "ignoring unrecognized filter key"),
            }
        }
        spec.check_range()?;
        Ok(spec)
    }

    /// Normalize query options: `raw_filters` first, then typed parameters
    /// override the same keys.
    pub fn from_options(opts: &QueryOptions) -> AnalyticsResult<Self> {
        let mut spec = match opts.raw_filters.as_deref() {
            Some(raw) => Self::parse(raw)?,
            None => Self::default(),
        };
        if let Some(raw) = opts.start_date.as_deref().filter(|s| !s.trim().is_empty()) {
            spec.start_date = Some(parse_date("start_date", raw)?);
        }
        if let Some(raw) = opts.end_date.as_deref().filter(|s| !s.trim().is_empty()) {
            spec.end_date = Some(parse_date("end_date", raw)?);
        }
        if let Some(path) = opts.workflow_path() {
            spec.path = Some(path.to_lowercase());
        }
        if opts.include_defined_only {
            spec.include_defined_only = true;
        }
        spec.check_range()?;
        Ok(spec)
    }

    fn check_range(&self) -> AnalyticsResult<()> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if start > end => Err(AnalyticsError::InvalidArgument(
                format!("start_date {start} is after end_date {end}"),
            )),
            _ => Ok(()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Jobs named exactly `job_name`, ignoring case and surrounding spaces.
    ///
    /// A typed name is one value: commas belong to the name and are never
    /// split into alternatives the way raw `name=` values are.
    pub fn named(job_name: Option<&str>) -> FilterSpec {
        let name = job_name
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty());
        FilterSpec {
            name: name.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Only the date bounds.
    pub fn dates_only(&self) -> FilterSpec {
        FilterSpec {
            start_date: self.start_date,
            end_date: self.end_date,
            ..Default::default()
        }
    }

    /// The subset that applies to jobs directly: the date bounds, plus the
    /// exact `job_name`. Run keys reach jobs through the run set.
    pub fn job_scope(&self, job_name: Option<&str>) -> FilterSpec {
        FilterSpec {
            name: Self::named(job_name).name,
            ..self.dates_only()
        }
    }

    /// Compile each recognized key into a predicate.
    pub fn compile(&self) -> CompiledFilter {
        let mut predicates = Vec::new();
        if let Some(d) = self.start_date {
            predicates.push(Predicate::OnOrAfter(d));
        }
        if let Some(d) = self.end_date {
            predicates.push(Predicate::OnOrBefore(d));
        }
        if let Some(p) = &self.path {
            predicates.push(Predicate::PathContains(p.clone()));
        }
        for (field, values) in [
            (Field::Event, &self.event),
            (Field::TargetBranch, &self.target_branch),
            (Field::Status, &self.status),
            (Field::Conclusion, &self.conclusion),
            (Field::Name, &self.name),
        ] {
            if !values.is_empty() {
                predicates.push(Predicate::AnyOf {
                    field,
                    values: values.clone(),
                });
            }
        }
        if self.include_defined_only {
            predicates.push(Predicate::DefinedWorkflow);
        }
        CompiledFilter { predicates }
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// Record fields a predicate can inspect.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Field {
    Path,
    Event,
    TargetBranch,
    Status,
    Conclusion,
    Name,
}

/// Records the filter engine can evaluate.
pub trait Filterable: Timestamped {
    fn field(&self, field: Field) -> Option<&str>;

    fn is_defined_workflow(&self) -> bool {
        false
    }
}

impl Filterable for Run {
    fn field(&self, field: Field) -> Option<&str> {
        match field {
            Field::Path => self.path.as_deref(),
            Field::Event => self.event.as_deref(),
            Field::TargetBranch => self.head_branch.as_deref(),
            Field::Status => self.status.as_deref(),
            Field::Conclusion => self.conclusion.as_deref(),
            Field::Name => self.name.as_deref(),
        }
    }

    fn is_defined_workflow(&self) -> bool {
        Run::is_defined_workflow(self)
    }
}

impl Filterable for Job {
    fn field(&self, field: Field) -> Option<&str> {
        match field {
            Field::Path | Field::Event => None,
            Field::TargetBranch => self.head_branch.as_deref(),
            Field::Status => self.status.as_deref(),
            Field::Conclusion => self.conclusion.as_deref(),
            Field::Name => self.name.as_deref(),
        }
    }
}

/// Commits carry no filterable fields; only date bounds reach them.
impl Filterable for Commit {
    fn field(&self, _field: Field) -> Option<&str> {
        None
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    OnOrAfter(NaiveDate),
    OnOrBefore(NaiveDate),
    PathContains(String),
    AnyOf { field: Field, values: Vec<String> },
    DefinedWorkflow,
}

impl Predicate {
    pub fn test<T: Filterable + ?Sized>(&self, record: &T) -> bool {
        match self {
            Self::OnOrAfter(bound) => record
                .bucket_time()
                .is_some_and(|ts| ts.date_naive() >= *bound),
            Self::OnOrBefore(bound) => record
                .bucket_time()
                .is_some_and(|ts| ts.date_naive() <= *bound),
            Self::PathContains(needle) => record
                .field(Field::Path)
                .is_some_and(|p| p.to_lowercase().contains(needle.as_str())),
            Self::AnyOf { field, values } => record.field(*field).is_some_and(|v| {
                let v = v.trim().to_lowercase();
                values.iter().any(|allowed| *allowed == v)
            }),
            Self::DefinedWorkflow => record.is_defined_workflow(),
        }
    }
}

/// A compiled [`FilterSpec`]: the AND of its predicates.
#[derive(Clone, Debug, Default)]
pub struct CompiledFilter {
    predicates: Vec<Predicate>,
}

impl CompiledFilter {
    pub fn matches<T: Filterable + ?Sized>(&self, record: &T) -> bool {
        self.predicates.iter().all(|p| p.test(record))
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_identity(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Pure filter over borrowed records; input order is preserved.
pub fn apply<'a, T, I>(records: I, spec: &FilterSpec) -> Vec<&'a T>
where
    T: Filterable + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let compiled = spec.compile();
    records.into_iter().filter(|r| compiled.matches(*r)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Pipeline analytics over an in-memory snapshot.
//!
//! Every query goes through [`PipelineQuery`]: the run–job index is built
//! once, a typed [`FilterSpec`] narrows runs and jobs, and one aggregator
//! turns the filtered set into an [`Aggregate`].
//!
//! # Module structure
//!
//! - [`types`]: query options, grouping, `Aggregate`, error type
//! - [`bucketing`]: timestamp parsing, day / ISO week / month keys and windows
//! - [`derive`]: safe derived-metric computation
//! - [`filter`]: raw filter grammar and compiled predicates
//! - [`engine`]: `PipelineQuery` and shared run/job scoping
//! - [`summary`]: status counts, first/last run, most-failed workflow
//! - [`timeseries`]: dense dimension × bucket count matrices
//! - [`duration`]: per-job, per-workflow and per-day execution time
//! - [`deployment`]: deployment frequency and lead time
//! - [`pairing`]: co-authored commit ratio
//! - [`validate`]: snapshot checks and performance guardrails

pub mod bucketing;
pub mod deployment;
pub mod derive;
pub mod duration;
pub mod engine;
pub mod filter;
pub mod pairing;
pub mod summary;
pub mod timeseries;
pub mod types;
pub mod validate;

// Re-export the most commonly used items at the crate::analytics level.
pub use deployment::{DeploymentBucket, DeploymentFrequency, LeadTime, LeadTimeWindow};
pub use duration::{DailyDurationSeries, DurationRow, DurationSummary};
pub use engine::{PipelineQuery, Scope};
pub use filter::FilterSpec;
pub use pairing::PairingIndex;
pub use summary::{JobsSummary, PipelineSummary, StatusSummary};
pub use timeseries::{BucketMatrix, JobsByStatus};
pub use types::{
    Aggregate, AnalyticsError, AnalyticsResult, EmptyReason, GroupBy, Metric, QueryOptions,
};
pub use validate::{PerfMeasurement, Severity, ValidationReport};

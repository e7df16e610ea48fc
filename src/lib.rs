//! software-metrics: CI pipeline analytics over stored workflow runs, jobs
//! and commits.
//!
//! The library half is the query engine ([`analytics`]) and its inputs
//! ([`model`], [`storage`], [`indexer`], [`config`]). The `smm` binary is a
//! thin shell around [`parse_cli`] and [`run_with_parsed`].

pub mod analytics;
pub mod config;
pub mod indexer;
pub mod model;
pub mod render;
pub mod storage;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::analytics::deployment::has_raw_workflow_path;
use crate::analytics::validate::{Severity, perf_index_guardrail, run_validation};
use crate::analytics::{
    Aggregate, AnalyticsError, GroupBy, Metric, PerfMeasurement, PipelineQuery, QueryOptions,
    ValidationReport,
};
use crate::config::{ConfigError, Configuration};
use crate::render::Render;
use crate::storage::{JsonStore, PipelineSnapshot, StorageError};

/// Log filter variable checked before `RUST_LOG`.
pub const ENV_LOG: &str = "SMM_LOG";

// ---------------------------------------------------------------------------
// Command tree
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "smm",
    version,
    about = "Delivery metrics from stored CI workflow runs, jobs and commits"
)]
pub struct Cli {
    /// Directory holding workflows.json, jobs.json and commits.json
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Configuration file (defaults to <data dir>/smm.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON
    #[arg(long, global = true, visible_alias = "robot")]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Workflow run and job analytics
    #[command(subcommand)]
    Pipelines(PipelineCommand),
    /// Commit history analytics
    #[command(subcommand)]
    Code(CodeCommand),
}

/// Filters shared by every pipeline command.
#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Inclusive lower bound (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<String>,
    /// Inclusive upper bound (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<String>,
    /// Case-insensitive substring of the workflow path
    #[arg(long)]
    pub workflow_path: Option<String>,
    #[arg(long)]
    pub job_name: Option<String>,
    /// Flat filter string, e.g. "event=push,conclusion=failure"
    #[arg(long)]
    pub raw_filters: Option<String>,
    /// Do not restrict jobs to the filtered runs
    #[arg(long)]
    pub force_all_jobs: bool,
    /// Only runs of .yml/.yaml workflow definitions
    #[arg(long)]
    pub include_defined_only: bool,
}

impl QueryArgs {
    pub fn to_options(&self) -> QueryOptions {
        QueryOptions {
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            workflow_path: self.workflow_path.clone(),
            job_name: self.job_name.clone(),
            raw_filters: self.raw_filters.clone(),
            force_all_jobs: self.force_all_jobs,
            include_defined_only: self.include_defined_only,
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum PipelineCommand {
    /// Run totals, status breakdown and most-failed workflow
    Summary(QueryArgs),
    /// Runs counted by status and conclusion
    ByStatus(QueryArgs),
    /// Run counts per workflow per period
    RunsBy {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, default_value = "day")]
        aggregate_by: GroupBy,
    },
    /// One job's executions by conclusion per period
    JobsByStatus {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, default_value = "week")]
        aggregate_by: GroupBy,
    },
    /// Failed job executions per job name per period, most failed first
    JobsTopFailed {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long)]
        top: Option<usize>,
        #[arg(long, default_value = "day")]
        aggregate_by: GroupBy,
    },
    /// Job totals, conclusions and distinct job names
    JobsSummary(QueryArgs),
    /// Job execution time by job name
    JobsDuration {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long)]
        top: Option<usize>,
        #[arg(long, default_value = "avg")]
        metric: Metric,
        /// Comma-separated substrings of job names to skip
        #[arg(long)]
        exclude_jobs: Option<String>,
    },
    /// Run execution time by workflow
    RunsDuration {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long)]
        top: Option<usize>,
        #[arg(long, default_value = "avg")]
        metric: Metric,
    },
    /// Job execution time per calendar day
    DailyDuration {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long)]
        exclude_jobs: Option<String>,
    },
    /// Successful deployment job executions per day, week and month
    DeploymentFrequency(QueryArgs),
    /// Commits matched against deployment windows
    LeadTime {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, default_value = "week")]
        aggregate_by: GroupBy,
    },
    /// Data quality checks and the index build guardrail
    Validate,
}

#[derive(Subcommand, Debug)]
pub enum CodeCommand {
    /// Share of commits carrying the co-author trailer
    PairingIndex {
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structured CLI failure, printed as JSON under `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct CliError {
    pub code: i32,
    pub kind: String,
    pub message: String,
    pub hint: Option<String>,
    pub retryable: bool,
}

pub type CliResult<T = ()> = Result<T, CliError>;

impl CliError {
    fn new(code: i32, kind: &str, message: impl Into<String>) -> Self {
        Self {
            code,
            kind: kind.into(),
            message: message.into(),
            hint: None,
            retryable: false,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(2, "usage", message).with_hint("Run 'smm --help' for usage")
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<AnalyticsError> for CliError {
    fn from(err: AnalyticsError) -> Self {
        Self::new(2, "invalid_input", err.to_string())
            .with_hint("Dates are YYYY-MM-DD and start_date must not be after end_date")
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::new(3, "config", err.to_string())
            .with_hint("Check --config, smm.toml and the SMM_* environment variables")
    }
}

impl From<StorageError> for CliError {
    fn from(err: StorageError) -> Self {
        let mut cli = Self::new(4, "storage", err.to_string())
            .with_hint("Check that --data-dir points at the fetched JSON files");
        cli.retryable = matches!(err, StorageError::Read { .. });
        cli
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ParsedCli {
    pub cli: Cli,
}

/// Parse raw process arguments. Help and version requests print and exit.
pub fn parse_cli<I, T>(args: I) -> CliResult<ParsedCli>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(ParsedCli { cli }),
        Err(err)
            if matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp
                    | clap::error::ErrorKind::DisplayVersion
                    | clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) =>
        {
            err.exit()
        }
        Err(err) => Err(CliError::usage(err.to_string().trim_end())),
    }
}

/// Install the stderr subscriber. `-v` flags win over `SMM_LOG`/`RUST_LOG`.
pub fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok()
            .and_then(|spec| EnvFilter::try_new(spec).ok())
            .unwrap_or_else(|| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    let ansi = std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .try_init();
}

pub fn run_with_parsed(parsed: ParsedCli) -> CliResult {
    let cli = parsed.cli;
    init_tracing(cli.verbose);

    let config = Configuration::resolve(cli.config.as_deref(), cli.data_dir.as_deref())?;
    let store = JsonStore::from_config(&config);
    tracing::info!(store = %store.dir().display(), "resolved data directory");
    let snapshot = store.load_snapshot()?;

    match cli.command {
        Commands::Pipelines(cmd) => run_pipelines(cmd, &snapshot, &config, cli.json),
        Commands::Code(CodeCommand::PairingIndex {
            start_date,
            end_date,
        }) => {
            let opts = QueryOptions {
                start_date,
                end_date,
                ..Default::default()
            };
            let query = PipelineQuery::new(&snapshot);
            emit(&query.pairing_index(&opts, &config.pairing_trailer)?, cli.json)
        }
    }
}

/// Output of `pipelines validate`.
#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    #[serde(flatten)]
    pub report: ValidationReport,
    pub perf: Vec<PerfMeasurement>,
}

fn run_pipelines(
    cmd: PipelineCommand,
    snapshot: &PipelineSnapshot,
    config: &Configuration,
    json: bool,
) -> CliResult {
    let query = PipelineQuery::new(snapshot);
    match cmd {
        PipelineCommand::Summary(q) => emit(&query.pipeline_summary(&q.to_options())?, json),
        PipelineCommand::ByStatus(q) => emit(&query.runs_by_status(&q.to_options())?, json),
        PipelineCommand::RunsBy {
            query: q,
            aggregate_by,
        } => {
            let opts = QueryOptions {
                aggregate_by,
                ..q.to_options()
            };
            emit(&query.runs_by_period(&opts)?, json)
        }
        PipelineCommand::JobsByStatus {
            query: q,
            aggregate_by,
        } => {
            let opts = QueryOptions {
                aggregate_by,
                ..q.to_options()
            };
            emit(&query.jobs_by_status(&opts)?, json)
        }
        PipelineCommand::JobsTopFailed {
            query: q,
            top,
            aggregate_by,
        } => {
            let opts = QueryOptions {
                top,
                aggregate_by,
                ..q.to_options()
            };
            emit(&query.jobs_top_failed(&opts)?, json)
        }
        PipelineCommand::JobsSummary(q) => emit(&query.jobs_summary(&q.to_options())?, json),
        PipelineCommand::JobsDuration {
            query: q,
            top,
            metric,
            exclude_jobs,
        } => {
            let opts = QueryOptions {
                top,
                metric,
                exclude_jobs,
                ..q.to_options()
            };
            emit(&query.jobs_average_time(&opts)?, json)
        }
        PipelineCommand::RunsDuration {
            query: q,
            top,
            metric,
        } => {
            let opts = QueryOptions {
                top,
                metric,
                ..q.to_options()
            };
            emit(&query.runs_duration(&opts)?, json)
        }
        PipelineCommand::DailyDuration {
            query: q,
            exclude_jobs,
        } => {
            let opts = QueryOptions {
                exclude_jobs,
                ..q.to_options()
            };
            emit(&query.daily_duration(&opts)?, json)
        }
        PipelineCommand::DeploymentFrequency(q) => {
            let opts = with_deployment_defaults(q.to_options(), config);
            emit(&query.deployment_frequency(&opts)?, json)
        }
        PipelineCommand::LeadTime {
            query: q,
            aggregate_by,
        } => {
            let opts = QueryOptions {
                aggregate_by,
                ..with_deployment_defaults(q.to_options(), config)
            };
            emit(&query.lead_time(&opts)?, json)
        }
        PipelineCommand::Validate => {
            let output = ValidateOutput {
                report: run_validation(snapshot),
                perf: vec![perf_index_guardrail(&snapshot.runs, &snapshot.jobs)],
            };
            let errors = output.report.count_failures(Severity::Error);
            print_output(&output, json)?;
            if errors > 0 {
                return Err(CliError::new(
                    1,
                    "validation_failed",
                    format!("{errors} validation checks failed with severity error"),
                ));
            }
            Ok(())
        }
    }
}

/// Fill `workflow_path` / `job_name` from configuration when not given.
///
/// A `path` in `--raw-filters` counts as given: the typed value would
/// otherwise override it.
pub fn with_deployment_defaults(mut opts: QueryOptions, config: &Configuration) -> QueryOptions {
    if opts.workflow_path().is_none() && !has_raw_workflow_path(&opts) {
        opts.workflow_path = config.deployment_frequency_target_pipeline.clone();
    }
    if opts.job_name().is_none() {
        opts.job_name = config.deployment_frequency_target_job.clone();
    }
    opts
}

fn emit<T>(aggregate: &Aggregate<T>, json: bool) -> CliResult
where
    T: Serialize + Render,
{
    print_output(aggregate, json)
}

fn print_output<T>(value: &T, json: bool) -> CliResult
where
    T: Serialize + Render,
{
    if json {
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| CliError::new(9, "internal", format!("failed to serialize output: {e}")))?;
        println!("{text}");
    } else {
        println!("{}", value.render());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

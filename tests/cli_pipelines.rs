//! CLI subprocess integration tests.
//!
//! Each test runs the real `smm` binary against a copy of the fixture store
//! with an isolated environment, then checks exit codes, JSON structure and
//! the human output.

mod util;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

/// Base command isolated from the caller's config and `SMM_*` variables.
fn base_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("smm"));
    cmd.current_dir(home);
    cmd.env("HOME", home);
    cmd.env("XDG_CONFIG_HOME", home.join(".config"));
    cmd.env("XDG_DATA_HOME", home.join(".local/share"));
    cmd.env("NO_COLOR", "1");
    for key in [
        "SMM_STORE_DATA_AT",
        "SMM_DEPLOYMENT_PIPELINE",
        "SMM_DEPLOYMENT_JOB",
        "SMM_PAIRING_TRAILER",
        "SMM_LOG",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

/// Run `smm --json --data-dir <store> <args>` and parse stdout.
fn json_output(store: &Path, args: &[&str]) -> Value {
    let home = TempDir::new().unwrap();
    let output = base_cmd(home.path())
        .arg("--json")
        .arg("--data-dir")
        .arg(store)
        .args(args)
        .assert()
        .success()
        .get_output()
        .clone();
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

// =============================================================================
// Summaries
// =============================================================================

#[test]
fn summary_reports_totals_and_most_failed() {
    let store = util::fixture_store();
    let json = json_output(store.path(), &["pipelines", "summary"]);

    assert_eq!(json["state"], "populated");
    let data = &json["data"];
    assert_eq!(data["total_runs"], 6);
    assert_eq!(data["completed"], 4);
    assert_eq!(data["in_progress"], 1);
    assert_eq!(data["queued"], 1);
    assert_eq!(data["unique_workflows"], 3);
    assert_eq!(data["most_failed"], ".github/workflows/ci.yml (1)");
    assert_eq!(data["first_run"]["id"], 101);
    assert_eq!(data["last_run"]["id"], 106);
}

#[test]
fn summary_human_output() {
    let store = util::fixture_store();
    let home = TempDir::new().unwrap();
    base_cmd(home.path())
        .arg("--data-dir")
        .arg(store.path())
        .args(["pipelines", "summary"])
        .assert()
        .success()
        .stdout(contains("Total runs: 6"))
        .stdout(contains("Most failed: .github/workflows/ci.yml (1)"));
}

#[test]
fn include_defined_only_drops_dynamic_workflows() {
    let store = util::fixture_store();
    let json = json_output(
        store.path(),
        &["pipelines", "summary", "--include-defined-only"],
    );
    assert_eq!(json["data"]["total_runs"], 5);
    assert_eq!(json["data"]["queued"], 0);
}

#[test]
fn raw_filters_narrow_runs() {
    let store = util::fixture_store();
    let json = json_output(
        store.path(),
        &["pipelines", "by-status", "--raw-filters", "event=push,conclusion=failure"],
    );
    let runs = json["data"]["runs"].as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["id"], 102);
}

#[test]
fn end_date_is_inclusive() {
    let store = util::fixture_store();
    let json = json_output(
        store.path(),
        &["pipelines", "summary", "--start-date", "2023-10-03", "--end-date", "2023-10-03"],
    );
    assert_eq!(json["data"]["total_runs"], 2);
}

// =============================================================================
// Time buckets and durations
// =============================================================================

#[test]
fn runs_by_week_matrix_is_dense() {
    let store = util::fixture_store();
    let json = json_output(
        store.path(),
        &["pipelines", "runs-by", "--aggregate-by", "week"],
    );
    let data = &json["data"];
    assert_eq!(data["buckets"], serde_json::json!(["2023-W40", "2023-W41"]));
    assert_eq!(
        data["representative_dates"],
        serde_json::json!(["2023-10-02", "2023-10-09"])
    );
    let dims = data["dimensions"].as_array().unwrap();
    let matrix = data["matrix"].as_array().unwrap();
    assert_eq!(dims.len(), matrix.len());
    for row in matrix {
        assert_eq!(row.as_array().unwrap().len(), 2);
    }
}

#[test]
fn jobs_duration_ranks_by_average() {
    let store = util::fixture_store();
    let json = json_output(store.path(), &["pipelines", "jobs-duration"]);
    let rows = json["data"]["rows"].as_array().unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["deploy", "build", "test"]);
    assert_eq!(rows[0]["average_minutes"], 9.0);
    assert_eq!(rows[0]["count"], 2);
    assert_eq!(rows[1]["count"], 3);
    // Only the unfinished build lacks a duration; the orphan deploy is out of scope.
    assert_eq!(json["data"]["skipped"], 1);
}

#[test]
fn jobs_top_failed_counts_failures_per_day() {
    let store = util::fixture_store();
    let json = json_output(
        store.path(),
        &["pipelines", "jobs-top-failed", "--top", "5"],
    );
    assert_eq!(json["state"], "populated");
    let data = &json["data"];
    assert_eq!(data["dimensions"], serde_json::json!(["build"]));
    assert_eq!(data["buckets"], serde_json::json!(["2023-10-03"]));
    assert_eq!(data["matrix"], serde_json::json!([[1]]));
}

#[test]
fn jobs_top_failed_human_output() {
    let store = util::fixture_store();
    let home = TempDir::new().unwrap();
    base_cmd(home.path())
        .arg("--data-dir")
        .arg(store.path())
        .args(["pipelines", "jobs-top-failed", "--aggregate-by", "week"])
        .assert()
        .success()
        .stdout(contains("2023-W40"))
        .stdout(contains("build"));
}

#[test]
fn jobs_duration_force_all_jobs_includes_orphans() {
    let store = util::fixture_store();
    let json = json_output(
        store.path(),
        &["pipelines", "jobs-duration", "--force-all-jobs", "--metric", "sum"],
    );
    let rows = json["data"]["rows"].as_array().unwrap();
    assert_eq!(rows[0]["name"], "deploy");
    assert_eq!(rows[0]["count"], 3);
    assert_eq!(rows[0]["total_minutes"], 25.0);
}

#[test]
fn daily_duration_zero_fills_range() {
    let store = util::fixture_store();
    let json = json_output(
        store.path(),
        &[
            "pipelines",
            "daily-duration",
            "--start-date",
            "2023-10-01",
            "--end-date",
            "2023-10-04",
        ],
    );
    let days = json["data"]["days"].as_array().unwrap();
    assert_eq!(days.len(), 4);
    assert_eq!(days[0]["date"], "2023-10-01");
    assert_eq!(days[0]["count"], 0);
    assert_eq!(days[1]["count"], 2);
}

// =============================================================================
// Deployments
// =============================================================================

#[test]
fn deployment_frequency_without_parameters_is_empty_not_error() {
    let store = util::fixture_store();
    let json = json_output(store.path(), &["pipelines", "deployment-frequency"]);
    assert_eq!(json["state"], "empty");
    assert_eq!(json["reason"]["missing_parameter"], "workflow_path");
}

#[test]
fn deployment_frequency_buckets_successful_deploys() {
    let store = util::fixture_store();
    let json = json_output(
        store.path(),
        &[
            "pipelines",
            "deployment-frequency",
            "--workflow-path",
            "deploy.yml",
            "--job-name",
            "deploy",
        ],
    );
    let data = &json["data"];
    let weeks = data["weeks"].as_array().unwrap();
    assert_eq!(weeks.len(), 2);
    assert_eq!(weeks[0]["key"], "2023-W40");
    assert_eq!(weeks[0]["commit"], "c0ffee1c0ffee1");
    assert_eq!(
        weeks[0]["link"],
        "https://github.com/acme/shop/actions/runs/103"
    );
    assert_eq!(data["months"][0]["count"], 2);
    assert_eq!(data["deployments"].as_array().unwrap().len(), 2);
}

#[test]
fn deployment_defaults_come_from_store_config() {
    let store = util::fixture_store();
    std::fs::write(
        store.path().join("smm.toml"),
        "deployment_frequency_target_pipeline = \"deploy.yml\"\n\
         deployment_frequency_target_job = \"deploy\"\n",
    )
    .unwrap();
    let json = json_output(store.path(), &["pipelines", "deployment-frequency"]);
    assert_eq!(json["state"], "populated");
    assert_eq!(json["data"]["days"].as_array().unwrap().len(), 2);
}

#[test]
fn raw_path_filter_wins_over_configured_pipeline() {
    let store = util::fixture_store();
    std::fs::write(
        store.path().join("smm.toml"),
        "deployment_frequency_target_pipeline = \"ci.yml\"\n\
         deployment_frequency_target_job = \"deploy\"\n",
    )
    .unwrap();
    let json = json_output(
        store.path(),
        &[
            "pipelines",
            "deployment-frequency",
            "--raw-filters",
            "path=deploy.yml",
        ],
    );
    assert_eq!(json["state"], "populated");
    assert_eq!(json["data"]["days"].as_array().unwrap().len(), 2);
}

#[test]
fn lead_time_matches_commits_per_week() {
    let store = util::fixture_store();
    let json = json_output(
        store.path(),
        &[
            "pipelines",
            "lead-time",
            "--workflow-path",
            "deploy.yml",
            "--job-name",
            "deploy",
        ],
    );
    let windows = json["data"]["windows"].as_array().unwrap();
    assert_eq!(windows.len(), 2);
    assert_eq!(windows[0]["key"], "2023-W40");
    assert_eq!(windows[0]["commits"].as_array().unwrap().len(), 2);
    assert_eq!(windows[0]["mean_lead_time_hours"], 15.5);
    assert_eq!(windows[1]["mean_lead_time_hours"], 21.22);
}

// =============================================================================
// Code analytics and validation
// =============================================================================

#[test]
fn pairing_index_counts_trailers() {
    let store = util::fixture_store();
    let json = json_output(store.path(), &["code", "pairing-index"]);
    assert_eq!(json["data"]["total_commits"], 4);
    assert_eq!(json["data"]["paired_commits"], 1);
    assert_eq!(json["data"]["pairing_index_percentage"], 25.0);
}

#[test]
fn validate_flags_orphan_job() {
    let store = util::fixture_store();
    let json = json_output(store.path(), &["pipelines", "validate"]);
    let checks = json["checks"].as_array().unwrap();
    let orphans = checks
        .iter()
        .find(|c| c["id"] == "jobs.orphans")
        .expect("orphan check present");
    assert_eq!(orphans["ok"], false);
    assert!(orphans["details"].as_str().unwrap().contains("1007"));
    assert_eq!(json["perf"][0]["id"], "perf.index_build");
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn invalid_date_exits_with_usage_code() {
    let store = util::fixture_store();
    let home = TempDir::new().unwrap();
    base_cmd(home.path())
        .arg("--data-dir")
        .arg(store.path())
        .args(["pipelines", "summary", "--start-date", "2023/10/01"])
        .assert()
        .code(2)
        .stderr(contains("invalid start_date '2023/10/01'"));
}

#[test]
fn invalid_date_in_json_mode_is_structured() {
    let store = util::fixture_store();
    let home = TempDir::new().unwrap();
    let output = base_cmd(home.path())
        .arg("--json")
        .arg("--data-dir")
        .arg(store.path())
        .args(["pipelines", "runs-duration", "--end-date", "tomorrow"])
        .assert()
        .code(2)
        .get_output()
        .clone();
    let err: Value = serde_json::from_slice(&output.stderr).expect("stderr is JSON");
    assert_eq!(err["error"]["kind"], "invalid_input");
    assert_eq!(err["error"]["retryable"], false);
}

#[test]
fn malformed_store_exits_with_storage_code() {
    let store = util::fixture_store();
    std::fs::write(store.path().join("jobs.json"), "[{").unwrap();
    let home = TempDir::new().unwrap();
    base_cmd(home.path())
        .arg("--data-dir")
        .arg(store.path())
        .args(["pipelines", "summary"])
        .assert()
        .code(4)
        .stderr(contains("jobs.json"));
}

#[test]
fn missing_config_file_exits_with_config_code() {
    let home = TempDir::new().unwrap();
    base_cmd(home.path())
        .args(["--config", "does-not-exist.toml", "pipelines", "summary"])
        .assert()
        .code(3)
        .stderr(contains("does not exist"));
}

#[test]
fn empty_store_reports_no_data() {
    let store = TempDir::new().unwrap();
    let home = TempDir::new().unwrap();
    base_cmd(home.path())
        .arg("--data-dir")
        .arg(store.path())
        .args(["pipelines", "summary"])
        .assert()
        .success()
        .stdout(contains("Nothing to report: no pipeline data loaded"));
}

#[test]
fn unknown_subcommand_is_usage_error() {
    let home = TempDir::new().unwrap();
    base_cmd(home.path())
        .args(["pipelines", "explode"])
        .assert()
        .code(2)
        .stderr(predicate::str::is_empty().not());
}


use bench_utils::{PipelineBenchParams, SCALING_SIZES, bench_scaling, configure_criterion};
use criterion::{Criterion, criterion_group};
use software_metrics::analytics::{GroupBy, PipelineQuery, QueryOptions};
use software_metrics::indexer::RunJobIndex;
use std::hint::black_box;

fn snapshot_for(runs: usize) -> software_metrics::storage::PipelineSnapshot {
    PipelineBenchParams::default().with_runs(runs).snapshot()
}

fn bench_index_build(c: &mut Criterion) {
    bench_scaling(c, "index_build", SCALING_SIZES, snapshot_for, |snap| {
        let index = RunJobIndex::build(&snap.runs, &snap.jobs);
        black_box(index.orphans().len());
    });
}

fn bench_run_scoped_filter(c: &mut Criterion) {
    let opts = QueryOptions {
        workflow_path: Some("wf1".into()),
        raw_filters: Some("event=push,conclusion=success".into()),
        ..Default::default()
    };
    bench_scaling(c, "scope_filter", SCALING_SIZES, snapshot_for, |snap| {
        let query = PipelineQuery::new(snap);
        let scope = query.scope(&opts).expect("valid options");
        black_box(scope.jobs.len());
    });
}

fn bench_deployment_frequency(c: &mut Criterion) {
    let opts = QueryOptions {
        workflow_path: Some("wf2".into()),
        job_name: Some("deploy".into()),
        aggregate_by: GroupBy::Week,
        ..Default::default()
    };
    bench_scaling(c, "deployment_frequency", SCALING_SIZES, snapshot_for, |snap| {
        let query = PipelineQuery::new(snap);
        black_box(query.deployment_frequency(&opts).expect("valid options"));
    });
}

fn bench_runs_by_period(c: &mut Criterion) {
    let opts = QueryOptions {
        aggregate_by: GroupBy::Day,
        ..Default::default()
    };
    bench_scaling(c, "runs_by_period", SCALING_SIZES, snapshot_for, |snap| {
        let query = PipelineQuery::new(snap);
        black_box(query.runs_by_period(&opts).expect("valid options"));
    });
}

criterion_group! {
    name = index_perf;
    config = configure_criterion();
    targets = bench_index_build, bench_run_scoped_filter, bench_deployment_frequency, bench_runs_by_period
}
criterion::criterion_main!(index_perf);

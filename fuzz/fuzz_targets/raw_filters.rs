//! Fuzz target for the flat `k=v,k2=v2` filter grammar.
//!
//! Parsing must never panic, and a spec that parses must filter a small
//! fixed history idempotently.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use software_metrics::analytics::filter::{FilterSpec, apply};
use software_metrics::analytics::bucketing::parse_timestamp;
use software_metrics::model::Run;

#[derive(Arbitrary, Debug)]
struct FilterInput {
    raw: String,
    paths: Vec<String>,
    created: Vec<String>,
}

fuzz_target!(|input: FilterInput| {
    let Ok(spec) = FilterSpec::parse(&input.raw) else {
        return;
    };

    let runs: Vec<Run> = input
        .paths
        .iter()
        .zip(input.created.iter().chain(std::iter::repeat(&String::new())))
        .take(32)
        .enumerate()
        .map(|(i, (path, created))| Run {
            id: i as i64,
            path: Some(path.clone()),
            created_at: parse_timestamp(created),
            ..Default::default()
        })
        .collect();

    let once: Vec<&Run> = apply(&runs, &spec);
    let twice: Vec<&Run> = apply(once.iter().copied(), &spec);
    assert_eq!(once, twice);
});

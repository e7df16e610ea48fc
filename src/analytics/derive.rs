//! Derived metric computation for aggregates.
//!
//! Ratios over a zero denominator come back as `None` (JSON `null`) or
//! `0.0`, never NaN or infinity.

use chrono::{DateTime, Utc};

/// Minutes from `start` to `end`. Negative deltas are discarded.
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<f64> {
    let secs = (end - start).num_milliseconds() as f64 / 1000.0;
    (secs >= 0.0).then_some(secs / 60.0)
}

/// Hours from `start` to `end`. Negative deltas are discarded.
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<f64> {
    minutes_between(start, end).map(|m| m / 60.0)
}

/// Percentage safe against zero denominator. Returns 0.0 when the
/// denominator is zero; otherwise rounded to 2 decimal places.
pub fn safe_pct(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        round2((numerator as f64 / denominator as f64) * 100.0)
    }
}

/// Safe division returning `None` when the denominator is zero.
pub fn safe_div(numerator: f64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator / denominator as f64)
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    safe_div(values.iter().sum(), values.len() as u64)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

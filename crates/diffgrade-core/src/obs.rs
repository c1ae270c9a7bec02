//! Structured observability hooks for the grading lifecycle.
//!
//! This module provides:
//! - A suite-scoped tracing span via [`suite_span`]
//! - Emission functions for key lifecycle events: suite start/finish, spec
//!   registration and outcome, timeouts, ambiguous resolution, report writes
//!
//! Events are emitted at `info!` level unless noted. Filtering follows
//! `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use std::path::Path;

use tracing::{info, warn};

/// Span tagging every event of one suite run with its run id.
///
/// Attach it to the suite future with `tracing::Instrument::instrument`.
pub fn suite_span(run_id: &str, owner: &str) -> tracing::Span {
    tracing::info_span!("diffgrade.suite", run_id = %run_id, owner = %owner)
}

/// Emit event: suite started.
pub fn emit_suite_started(run_id: &str, owner: &str, specs: usize) {
    info!(event = "suite.started", run_id = %run_id, owner = %owner, specs = specs);
}

/// Emit event: suite finished with its aggregate score.
pub fn emit_suite_finished(run_id: &str, score: f64, max_score: f64, duration_ms: u64) {
    info!(
        event = "suite.finished",
        run_id = %run_id,
        score = score,
        max_score = max_score,
        duration_ms = duration_ms,
    );
}

/// Emit event: a spec entered the registry.
pub fn emit_spec_registered(number: u64, name: &str, kind: &str) {
    info!(event = "spec.registered", number = number, name = %name, kind = %kind);
}

pub fn emit_spec_started(number: u64, name: &str) {
    info!(event = "spec.started", number = number, name = %name);
}

/// Emit event: spec finished. `category` is set for failures.
pub fn emit_spec_finished(number: u64, name: &str, passed: bool, category: Option<&str>) {
    info!(
        event = "spec.finished",
        number = number,
        name = %name,
        passed = passed,
        category = category.unwrap_or("none"),
    );
}

/// Emit event: an invocation exceeded its time bound (warning level).
pub fn emit_invocation_timeout(class_name: &str, operation: &str, limit_ms: u64) {
    warn!(
        event = "invocation.timeout",
        class_name = %class_name,
        operation = %operation,
        limit_ms = limit_ms,
    );
}

/// Emit event: loose resolution found several equally good members (warning level).
pub fn emit_resolution_ambiguous(class_name: &str, member: &str, chosen: &str, tied: usize) {
    warn!(
        event = "resolution.ambiguous",
        class_name = %class_name,
        member = %member,
        chosen = %chosen,
        tied = tied,
    );
}

/// Emit event: the reference implementation misbehaved (error level).
pub fn emit_reference_failure(class_name: &str, error: &dyn std::fmt::Display) {
    tracing::error!(event = "reference.failure", class_name = %class_name, error = %error);
}

/// Emit event: report written to disk.
pub fn emit_report_written(path: &Path, tests: usize) {
    info!(event = "report.written", path = %path.display(), tests = tests);
}

/// Log the point distribution, one line per bucket.
pub fn emit_point_distribution(buckets: &[(String, f64)]) {
    let total: f64 = buckets.iter().map(|(_, v)| v).sum();
    info!("Point Distribution:");
    for (name, points) in buckets {
        let pct = if total > 0.0 { points / total * 100.0 } else { 0.0 };
        info!("({:5.2}%) {}: {}", pct, name, points);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suite_span_create() {
        let span = suite_span("run-1", "AdderTest");
        let _entered = span.enter();
        emit_spec_started(1, "add");
    }

    #[test]
    fn test_point_distribution_handles_empty_total() {
        emit_point_distribution(&[("Checkstyle".into(), 0.0)]);
        emit_point_distribution(&[]);
    }
}

//! The results document: per-test entries, overall score and leaderboard,
//! sanitized and written as pretty JSON. Also the emergency report flushed
//! when the submission runs out of memory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::GraderConfig;
use crate::context::RunContext;
use crate::leaderboard::LeaderboardEntry;
use crate::obs;
use crate::result::{TestResult, Visibility};

/// Printed instead of a diagnostic when the submission ran out of memory.
pub const OUT_OF_MEMORY_ADVICE: &str = "Out of memory. Attempting to dump standard out and resume test";

const STRAY_BACKSLASH_ADVICE: &str = "Stray backslash in your code caused it not to compile.\n\
Please review your code and upload again\n";

/// One test in the results document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestEntry {
    pub name: String,
    /// Serialized as a string.
    pub number: String,
    pub score: f64,
    pub max_score: f64,
    pub visibility: Visibility,
    pub output: String,
}

impl TestEntry {
    pub fn from_result(result: &TestResult) -> Self {
        Self {
            name: result.name.clone(),
            number: result.number.to_string(),
            score: round2(result.score),
            max_score: round2(result.max_score),
            visibility: result.visibility,
            output: sanitize(&result.output_text()),
        }
    }
}

/// The results document for one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub score: f64,
    /// Milliseconds.
    pub execution_time: u64,
    pub tests: Vec<TestEntry>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

impl Report {
    /// Aggregate `results`, scaling the earned share to `max_total_score`.
    pub fn from_results(
        results: &[TestResult],
        max_total_score: f64,
        execution_time: u64,
        leaderboard: Vec<LeaderboardEntry>,
    ) -> Self {
        let (earned, possible) = totals(results);
        Self {
            score: scaled_score(earned, possible, max_total_score),
            execution_time,
            tests: results.iter().map(TestEntry::from_result).collect(),
            leaderboard,
        }
    }
}

/// Earned and possible points across `results`.
pub fn totals(results: &[TestResult]) -> (f64, f64) {
    results
        .iter()
        .fold((0.0, 0.0), |(earned, possible), r| (earned + r.score, possible + r.max_score))
}

/// `earned / possible` scaled to `max_total_score`, rounded to 2 decimals.
pub fn scaled_score(earned: f64, possible: f64, max_total_score: f64) -> f64 {
    if possible <= 0.0 {
        return 0.0;
    }
    round2(earned / possible * max_total_score)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Normalize student-facing text before it is serialized.
///
/// Escaping itself is left to `serde_json`.
pub fn sanitize(text: &str) -> String {
    if text.contains("illegal character: '\\'") {
        return STRAY_BACKSLASH_ADVICE.to_string();
    }
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\t', "    ")
}

/// Writes the results document.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &GraderConfig) -> Self {
        Self::new(config.results_path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `report` as pretty JSON, creating parent directories.
    pub fn write(&self, report: &Report) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create {:?}", parent))?;
            }
        }
        let content = serde_json::to_string_pretty(report).context("serialize report")?;
        std::fs::write(&self.path, content).with_context(|| format!("write {:?}", self.path))?;
        obs::emit_report_written(&self.path, report.tests.len());
        Ok(())
    }
}

/// Flush a one-test report holding whatever output survived, so a crash
/// after running out of memory still leaves results behind.
pub fn write_out_of_memory_report(ctx: &RunContext) -> Result<()> {
    let salvaged = ctx.channel.salvage();
    let entry = TestEntry {
        name: "Error, out of memory".to_string(),
        number: "0".to_string(),
        score: 0.0,
        max_score: 0.0,
        visibility: Visibility::Visible,
        output: sanitize(&format!("{}\n{}", salvaged, OUT_OF_MEMORY_ADVICE)),
    };
    let report = Report {
        score: 0.0,
        execution_time: ctx.elapsed_ms(),
        tests: vec![entry],
        leaderboard: Vec::new(),
    };
    tracing::warn!(path = ?ctx.config.results_path, "writing out-of-memory report");
    ReportWriter::from_config(&ctx.config).write(&report)
}

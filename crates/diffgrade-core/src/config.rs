//! Run configuration.
//!
//! Defaults match the standard autograder container layout. Any field can be
//! overridden through a `DIFFGRADE_*` environment variable.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GraderError, GraderResult};
use crate::result::Visibility;

/// Configuration for one grading run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraderConfig {
    /// Upper bound for a single constructor or method invocation (milliseconds).
    pub invocation_timeout_ms: u64,
    /// The reported score is scaled so a perfect run earns this much.
    pub max_total_score: f64,
    pub results_path: PathBuf,
    /// Submission timing metadata used for the leaderboard.
    pub metadata_path: PathBuf,
    /// Directory holding the submitted source files.
    pub submission_root: PathBuf,
    /// Program run by the style-check collaborator.
    pub style_checker: String,
    /// Upper bound for collaborator subprocesses (seconds).
    pub collaborator_timeout_secs: u64,
    /// Captured output beyond this many characters is truncated.
    pub max_output_length: usize,
    /// In-band marker used to attribute captured output to a spec.
    pub output_marker: String,
    pub default_visibility: Visibility,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            invocation_timeout_ms: 15_000,
            max_total_score: 60.0,
            results_path: PathBuf::from("/autograder/results/results.json"),
            metadata_path: PathBuf::from("/autograder/submission_metadata.json"),
            submission_root: PathBuf::from("/autograder/submission/"),
            style_checker: "check_style".to_string(),
            collaborator_timeout_secs: 60,
            max_output_length: 8192,
            output_marker: "@@diffgrade-spec@@".to_string(),
            default_visibility: Visibility::Visible,
        }
    }
}

impl GraderConfig {
    /// Defaults overlaid with `DIFFGRADE_*` environment variables.
    pub fn from_env() -> GraderResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`, keyed by environment variable name.
    pub fn from_lookup<F>(lookup: F) -> GraderResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup("DIFFGRADE_TIMEOUT_MS") {
            cfg.invocation_timeout_ms = parse("DIFFGRADE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("DIFFGRADE_MAX_SCORE") {
            cfg.max_total_score = parse("DIFFGRADE_MAX_SCORE", &v)?;
        }
        if let Some(v) = lookup("DIFFGRADE_RESULTS_PATH") {
            cfg.results_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("DIFFGRADE_METADATA_PATH") {
            cfg.metadata_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("DIFFGRADE_SUBMISSION_ROOT") {
            cfg.submission_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("DIFFGRADE_STYLE_CHECKER") {
            cfg.style_checker = v;
        }
        if let Some(v) = lookup("DIFFGRADE_COLLABORATOR_TIMEOUT_SECS") {
            cfg.collaborator_timeout_secs = parse("DIFFGRADE_COLLABORATOR_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("DIFFGRADE_MAX_OUTPUT") {
            cfg.max_output_length = parse("DIFFGRADE_MAX_OUTPUT", &v)?;
        }
        if let Some(v) = lookup("DIFFGRADE_OUTPUT_MARKER") {
            if v.is_empty() {
                return Err(GraderError::InvalidConfig(
                    "DIFFGRADE_OUTPUT_MARKER must not be empty".to_string(),
                ));
            }
            cfg.output_marker = v;
        }
        if let Some(v) = lookup("DIFFGRADE_VISIBILITY") {
            cfg.default_visibility = parse("DIFFGRADE_VISIBILITY", &v)?;
        }
        Ok(cfg)
    }

    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_millis(self.invocation_timeout_ms)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }
}

fn parse<T>(key: &str, raw: &str) -> GraderResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| GraderError::InvalidConfig(format!("{}={:?}: {}", key, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let cfg = GraderConfig::default();
        assert_eq!(cfg.invocation_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.max_total_score, 60.0);
        assert_eq!(cfg.max_output_length, 8192);
        assert_eq!(cfg.results_path, PathBuf::from("/autograder/results/results.json"));
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DIFFGRADE_TIMEOUT_MS", "250"),
            ("DIFFGRADE_MAX_SCORE", "100"),
            ("DIFFGRADE_RESULTS_PATH", "/tmp/out.json"),
            ("DIFFGRADE_VISIBILITY", "after_due_date"),
        ]
        .into_iter()
        .collect();
        let cfg = GraderConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
            .expect("valid overrides");
        assert_eq!(cfg.invocation_timeout_ms, 250);
        assert_eq!(cfg.max_total_score, 100.0);
        assert_eq!(cfg.results_path, PathBuf::from("/tmp/out.json"));
        assert_eq!(cfg.default_visibility, Visibility::AfterDueDate);
        assert_eq!(cfg.style_checker, "check_style");
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = GraderConfig::from_lookup(|k| {
            (k == "DIFFGRADE_TIMEOUT_MS").then(|| "soon".to_string())
        })
        .expect_err("not a number");
        match err {
            GraderError::InvalidConfig(msg) => assert!(msg.contains("DIFFGRADE_TIMEOUT_MS")),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_serde_fills_missing_fields() {
        let cfg: GraderConfig =
            serde_json::from_str(r#"{"invocation_timeout_ms": 500}"#).expect("parse");
        assert_eq!(cfg.invocation_timeout_ms, 500);
        assert_eq!(cfg.output_marker, "@@diffgrade-spec@@");
    }
}

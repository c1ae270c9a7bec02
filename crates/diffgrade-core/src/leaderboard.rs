//! Time-decay leaderboard score.
//!
//! Half the value is correctness, half is how early the submission arrived:
//! the release-to-due window is split into ten slots and each slot elapsed
//! costs ten points.

use std::path::Path;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::report::round2;

/// Reported when the metadata document is missing or unusable.
pub const SENTINEL: f64 = -1.0;

const SLOTS: f64 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntry {
    pub name: String,
    pub value: f64,
    pub order: String,
}

impl LeaderboardEntry {
    pub fn score(value: f64) -> Self {
        Self {
            name: "Score (%)".to_string(),
            value: round2(value),
            order: "desc".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionMetadata {
    pub assignment: AssignmentDates,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentDates {
    pub release_date: String,
    pub due_date: String,
}

impl SubmissionMetadata {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let raw = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
        serde_json::from_str(&raw).with_context(|| format!("parse {:?}", path))
    }
}

fn parse(ts: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(ts).ok()
}

/// Leaderboard value for `earned` of `possible` points, or `None` when the
/// dates are unusable.
pub fn time_decay_score(meta: &SubmissionMetadata, earned: f64, possible: f64) -> Option<f64> {
    let rel = parse(&meta.assignment.release_date)?;
    let due = parse(&meta.assignment.due_date)?;
    let sub = parse(&meta.created_at)?;

    let window = (due - rel).num_seconds() as f64;
    if window <= 0.0 {
        return None;
    }
    let elapsed = (sub - rel).num_seconds() as f64;
    let slot = (elapsed / (window / SLOTS)).floor().max(0.0);

    let correctness = if possible > 0.0 { earned / possible * 100.0 } else { 0.0 };
    let graded = 0.5 * correctness;
    let time = 0.5 * (100.0 - SLOTS * slot).max(0.0);
    tracing::info!(
        "Leaderboard Score: {:.2} (Correctness: {:.2} [{:.2}/{:.2}], Time: {:.2})",
        graded + time,
        graded,
        earned,
        possible,
        time
    );
    Some(graded + time)
}

/// Leaderboard entry computed from the metadata document at `path`.
pub fn compute(path: &Path, earned: f64, possible: f64) -> LeaderboardEntry {
    let value = match SubmissionMetadata::load(path) {
        Ok(meta) => time_decay_score(&meta, earned, possible).unwrap_or_else(|| {
            tracing::warn!(path = ?path, "submission metadata has unusable dates");
            SENTINEL
        }),
        Err(e) => {
            tracing::debug!(error = %e, "no submission metadata");
            SENTINEL
        }
    };
    LeaderboardEntry::score(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(created_at: &str) -> SubmissionMetadata {
        SubmissionMetadata {
            assignment: AssignmentDates {
                release_date: "2024-01-01T00:00:00+00:00".into(),
                due_date: "2024-01-11T00:00:00+00:00".into(),
            },
            created_at: created_at.into(),
        }
    }

    #[test]
    fn test_early_submission_keeps_time_points() {
        let v = time_decay_score(&meta("2024-01-01T12:00:00+00:00"), 10.0, 10.0);
        assert_eq!(v, Some(100.0));
    }

    #[test]
    fn test_slots_decay() {
        // Day 3.5 of 10 falls in slot 3.
        let v = time_decay_score(&meta("2024-01-04T12:00:00+00:00"), 5.0, 10.0);
        assert_eq!(v, Some(25.0 + 35.0));
        // After the due date the time half is gone.
        let late = time_decay_score(&meta("2024-01-20T00:00:00+00:00"), 10.0, 10.0);
        assert_eq!(late, Some(50.0));
    }

    #[test]
    fn test_before_release_counts_as_first_slot() {
        let v = time_decay_score(&meta("2023-12-25T00:00:00+00:00"), 0.0, 10.0);
        assert_eq!(v, Some(50.0));
    }

    #[test]
    fn test_missing_or_bad_metadata_is_sentinel() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = compute(&dir.path().join("nope.json"), 1.0, 1.0);
        assert_eq!(missing.value, SENTINEL);

        let bad = dir.path().join("meta.json");
        std::fs::write(
            &bad,
            r#"{"assignment":{"release_date":"yesterday","due_date":"x"},"created_at":"now"}"#,
        )
        .expect("write");
        assert_eq!(compute(&bad, 1.0, 1.0).value, SENTINEL);
    }
}

//! Error taxonomy for the grading engine.
//!
//! These are *tool* errors: authoring mistakes and internal failures that must
//! stop the run loudly. Student-facing failures are not errors; they are
//! recorded as [`crate::result::Failure`] values on a test result.

/// No constructor or method accepted the runtime argument list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "no {member} of {class_name} accepts ({}); considered: [{}]",
    .arg_types.join(", "),
    .considered.join("; ")
)]
pub struct ResolutionError {
    pub class_name: String,
    /// `constructor` or `method <name>`.
    pub member: String,
    pub arg_types: Vec<String>,
    /// Every signature inspected during both passes.
    pub considered: Vec<String>,
}

/// A required builder field was missing when `build()` ran.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unprepared test configuration for \"{test}\": {reason}")]
pub struct UnpreparedTestConfiguration {
    pub test: String,
    pub reason: String,
}

impl UnpreparedTestConfiguration {
    pub fn new(test: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            test: test.into(),
            reason: reason.into(),
        }
    }
}

/// Field access through the introspection capability failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntrospectionError {
    #[error("{class_name} has no field named {field}")]
    NoSuchField { class_name: String, field: String },

    #[error("{class_name} does not support field updates")]
    ReadOnly { class_name: String },
}

/// Errors produced by the grading engine.
#[derive(Debug, thiserror::Error)]
pub enum GraderError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Unprepared(#[from] UnpreparedTestConfiguration),

    #[error(transparent)]
    Introspection(#[from] IntrospectionError),

    #[error("reference implementation failed: {0}")]
    ReferenceFailure(String),

    #[error("reference type not found: {0}")]
    MissingReferenceType(String),

    #[error("invocation worker could not be started: {0}")]
    Worker(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("collaborator failed: {0}")]
    Collaborator(String),

    #[error("could not write report: {0}")]
    Report(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for grading operations.
pub type GraderResult<T> = std::result::Result<T, GraderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_lists_considered_signatures() {
        let err = ResolutionError {
            class_name: "Adder".into(),
            member: "method add".into(),
            arg_types: vec!["Integer".into(), "String".into()],
            considered: vec!["add(int, int)".into(), "add(double, double)".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("method add of Adder"));
        assert!(msg.contains("(Integer, String)"));
        assert!(msg.contains("add(int, int); add(double, double)"));
    }

    #[test]
    fn test_unprepared_wraps_into_grader_error() {
        let err: GraderError = UnpreparedTestConfiguration::new("t1", "hint is missing").into();
        assert!(matches!(err, GraderError::Unprepared(_)));
        assert_eq!(
            err.to_string(),
            "unprepared test configuration for \"t1\": hint is missing"
        );
    }
}

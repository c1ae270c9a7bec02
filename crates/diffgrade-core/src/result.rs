//! Per-spec results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Guidance shown when an invocation exceeds its time bound.
pub const TIMEOUT_GUIDANCE: &str = "Test timed out! This usually indicates that your code has a loop \
that never ends. Check your loops and recursive calls for a way out, and make sure anything that \
waits for input actually receives it.";

/// Who may see a test result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Hidden,
    AfterDueDate,
    AfterPublished,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Visible => "visible",
            Visibility::Hidden => "hidden",
            Visibility::AfterDueDate => "after_due_date",
            Visibility::AfterPublished => "after_published",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visible" => Ok(Visibility::Visible),
            "hidden" => Ok(Visibility::Hidden),
            "after_due_date" => Ok(Visibility::AfterDueDate),
            "after_published" => Ok(Visibility::AfterPublished),
            other => Err(format!("unknown visibility: {}", other)),
        }
    }
}

/// Why a spec failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    CompileFailure,
    InstantiationFailure,
    Timeout,
    OutOfMemory,
    AssertionMismatch,
    SubmissionException,
    Resolution,
    ArgumentFailure,
    SetupFailure,
    Collaborator,
}

impl FailureCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureCategory::CompileFailure => "compile_failure",
            FailureCategory::InstantiationFailure => "instantiation_failure",
            FailureCategory::Timeout => "timeout",
            FailureCategory::OutOfMemory => "out_of_memory",
            FailureCategory::AssertionMismatch => "assertion_mismatch",
            FailureCategory::SubmissionException => "submission_exception",
            FailureCategory::Resolution => "resolution",
            FailureCategory::ArgumentFailure => "argument_failure",
            FailureCategory::SetupFailure => "setup_failure",
            FailureCategory::Collaborator => "collaborator",
        }
    }
}

/// A student-facing failure with its diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub category: FailureCategory,
    pub message: String,
}

impl Failure {
    pub fn new(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::new(FailureCategory::Timeout, TIMEOUT_GUIDANCE)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of one spec. Score starts at the maximum and drops to zero on the
/// first failure; there is no partial credit.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub number: u64,
    pub name: String,
    pub class_name: String,
    pub method_name: Option<String>,
    pub description: String,
    pub hint: String,
    pub max_score: f64,
    pub score: f64,
    pub visibility: Visibility,
    body: String,
    failure: Option<Failure>,
}

impl TestResult {
    pub fn new(
        number: u64,
        name: impl Into<String>,
        class_name: impl Into<String>,
        max_score: f64,
        visibility: Visibility,
    ) -> Self {
        Self {
            number,
            name: name.into(),
            class_name: class_name.into(),
            method_name: None,
            description: String::new(),
            hint: String::new(),
            max_score,
            score: max_score,
            visibility,
            body: String::new(),
            failure: None,
        }
    }

    pub fn add_output(&mut self, text: &str) {
        self.body.push_str(text);
    }

    /// Record a failure. Only the first one determines the category.
    pub fn fail(&mut self, failure: Failure) {
        self.score = 0.0;
        if !self.body.is_empty() && !self.body.ends_with('\n') {
            self.body.push('\n');
        }
        self.body.push_str(&failure.message);
        self.body.push('\n');
        if self.failure.is_none() {
            self.failure = Some(failure);
        }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Description followed by the accumulated diagnostics.
    pub fn output_text(&self) -> String {
        format!("{}\n{}", self.description, self.body)
    }
}

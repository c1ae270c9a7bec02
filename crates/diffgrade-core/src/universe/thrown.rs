//! Exceptions raised by either implementation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Frames at or after the first one containing any of these belong to the
/// engine's introspection machinery, not to the code under test.
const INTROSPECTION_FRAMES: &[&str] = &["reflect", "diffgrade_core::"];

const OUT_OF_MEMORY: &str = "OutOfMemoryError";
const PANIC: &str = "panic";

/// An exception value thrown by a constructor or method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thrown {
    pub type_name: String,
    pub message: Option<String>,
    /// Supertypes of `type_name`, nearest first.
    #[serde(default)]
    pub ancestry: Vec<String>,
    #[serde(default)]
    pub trace: Vec<String>,
    #[serde(default)]
    pub cause: Option<Box<Thrown>>,
}

impl Thrown {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: Some(message.into()),
            ancestry: Vec::new(),
            trace: Vec::new(),
            cause: None,
        }
    }

    /// Heap exhaustion inside an invocation.
    pub fn out_of_memory() -> Self {
        Self::new(OUT_OF_MEMORY, "Java heap space").with_ancestry(["Error", "Throwable"])
    }

    /// A Rust panic that escaped an invocation.
    pub fn panic(message: impl Into<String>) -> Self {
        Self::new(PANIC, message)
    }

    pub fn with_ancestry<I, S>(mut self, ancestry: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ancestry = ancestry.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_trace<I, S>(mut self, trace: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trace = trace.into_iter().map(Into::into).collect();
        self
    }

    pub fn caused_by(mut self, cause: Thrown) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Follow the cause chain to its end.
    pub fn root_cause(&self) -> &Thrown {
        let mut current = self;
        while let Some(cause) = current.cause.as_deref() {
            current = cause;
        }
        current
    }

    pub fn is_out_of_memory(&self) -> bool {
        self.root_cause().type_name == OUT_OF_MEMORY
    }

    /// Whether this exception is exactly `type_name`. A package-qualified
    /// name matches its simple name; subtypes do not match.
    pub fn is_type(&self, type_name: &str) -> bool {
        simple_name(&self.type_name) == simple_name(type_name)
    }

    /// Trace frames up to, not including, the first introspection frame.
    pub fn limited_trace(&self) -> Vec<&str> {
        self.trace
            .iter()
            .map(String::as_str)
            .take_while(|frame| !INTROSPECTION_FRAMES.iter().any(|m| frame.contains(m)))
            .collect()
    }

    /// Display form followed by the limited trace, one frame per line.
    pub fn render_with_trace(&self) -> String {
        let mut out = self.to_string();
        for frame in self.limited_trace() {
            out.push_str("\n\tat ");
            out.push_str(frame);
        }
        out
    }
}

impl fmt::Display for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {}", self.type_name, msg),
            None => f.write_str(&self.type_name),
        }
    }
}

fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

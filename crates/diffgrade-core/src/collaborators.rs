//! External collaborators: style checking and file probing.
//!
//! Both are traits so suites can be graded without the real tools present.
//! The default implementations shell out with `tokio::process`, bounded by
//! the configured collaborator timeout.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::GraderConfig;
use crate::error::{GraderError, GraderResult};

/// Last line a clean style-check run prints.
pub const AUDIT_DONE: &str = "Audit done.";
/// Stand-in for the last line when the checker reported warnings.
pub const SEE_WARNINGS: &str = "See warnings for details.";

/// Outcome of one style-check run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleVerdict {
    pub passed: bool,
    /// The last line, or [`SEE_WARNINGS`] when the output ran long.
    pub summary: String,
    /// Everything the checker printed.
    pub output: String,
}

impl StyleVerdict {
    /// Judge checker output: fewer than four lines ending with [`AUDIT_DONE`].
    pub fn from_output(output: &str) -> Self {
        let lines: Vec<&str> = output.lines().collect();
        let summary = if lines.len() < 4 {
            lines.last().copied().unwrap_or_default().to_string()
        } else {
            SEE_WARNINGS.to_string()
        };
        Self {
            passed: summary == AUDIT_DONE,
            summary,
            output: output.to_string(),
        }
    }
}

#[async_trait]
pub trait StyleChecker: Send + Sync {
    async fn check(&self, class_name: &str) -> GraderResult<StyleVerdict>;
}

#[async_trait]
pub trait FileProbe: Send + Sync {
    async fn exists(&self, file_name: &str) -> GraderResult<bool>;
}

// ---------------------------------------------------------------------------
// Process-backed implementations
// ---------------------------------------------------------------------------

/// Runs `<program> <submission_root>/<Class>.java` through `sh -c`. The
/// program may carry its own flags; the path is passed as `$1`.
#[derive(Debug, Clone)]
pub struct CommandStyleChecker {
    program: String,
    root: PathBuf,
    timeout: Duration,
}

impl CommandStyleChecker {
    pub fn new(program: impl Into<String>, root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            root: root.into(),
            timeout,
        }
    }

    pub fn from_config(config: &GraderConfig) -> Self {
        Self::new(
            config.style_checker.clone(),
            config.submission_root.clone(),
            config.collaborator_timeout(),
        )
    }
}

#[async_trait]
impl StyleChecker for CommandStyleChecker {
    async fn check(&self, class_name: &str) -> GraderResult<StyleVerdict> {
        let file_name = if class_name.ends_with(".java") {
            class_name.to_string()
        } else {
            format!("{}.java", class_name)
        };
        let path = self.root.join(file_name);
        let script = format!("{} \"$1\"", self.program);
        let output = run_shell(&script, &[path.as_os_str()], self.timeout).await?;
        tracing::debug!(class_name = %class_name, lines = output.lines().count(), "style check finished");
        Ok(StyleVerdict::from_output(&output))
    }
}

/// Checks for a regular file under the submission root with `test -f`.
#[derive(Debug, Clone)]
pub struct CommandFileProbe {
    root: PathBuf,
    timeout: Duration,
}

impl CommandFileProbe {
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            timeout,
        }
    }

    pub fn from_config(config: &GraderConfig) -> Self {
        Self::new(config.submission_root.clone(), config.collaborator_timeout())
    }
}

#[async_trait]
impl FileProbe for CommandFileProbe {
    async fn exists(&self, file_name: &str) -> GraderResult<bool> {
        let path = self.root.join(file_name);
        let child = Command::new("test")
            .arg("-f")
            .arg(&path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                GraderError::Collaborator(format!(
                    "file probe for {} timed out after {:?}",
                    file_name, self.timeout
                ))
            })??;
        Ok(output.status.success())
    }
}

/// Run `script` with `sh -c`, binding `positional` to `$1..`, and return
/// stdout. Stderr is appended so the student sees checker errors too.
async fn run_shell(script: &str, positional: &[&OsStr], limit: Duration) -> GraderResult<String> {
    let child = Command::new("sh")
        .arg("-c")
        .arg(script)
        .arg("sh")
        .args(positional)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let output = tokio::time::timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| {
            GraderError::Collaborator(format!("`{}` timed out after {:?}", script, limit))
        })??;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        text.push_str(&stderr);
    }
    Ok(text)
}

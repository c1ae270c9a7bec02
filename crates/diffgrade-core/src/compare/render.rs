//! Diagnostic renderings: the side-by-side table and value narratives.

use std::fmt;

use crate::env::InvocationEnv;
use crate::value::Value;

const EXPECTED_HEADER: &str = "Expected Output";
const ACTUAL_HEADER: &str = "Actual Output";
const OMITTED: &str = "Omitted due to length";
const MAX_NARRATIVE: usize = 3000;

/// One row of a side-by-side table. A missing cell is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideBySideRow {
    pub line: usize,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

/// Two-column table aligning expected and actual lines.
///
/// The expected column is as wide as its longest line, counting each tab as
/// three extra columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideBySide {
    width: usize,
    rows: Vec<SideBySideRow>,
}

impl SideBySide {
    pub fn new<E, A>(expected: &[E], actual: &[A]) -> Self
    where
        E: AsRef<str>,
        A: AsRef<str>,
    {
        let width = expected
            .iter()
            .map(|l| display_width(l.as_ref()))
            .max()
            .unwrap_or(0);
        let rows = (0..expected.len().max(actual.len()))
            .map(|line| SideBySideRow {
                line,
                expected: expected.get(line).map(|s| s.as_ref().to_string()),
                actual: actual.get(line).map(|s| s.as_ref().to_string()),
            })
            .collect();
        Self { width, rows }
    }

    /// Build from two blocks of text, split into lines.
    pub fn from_text(expected: &str, actual: &str) -> Self {
        let e: Vec<&str> = expected.lines().collect();
        let a: Vec<&str> = actual.lines().collect();
        Self::new(&e, &a)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn rows(&self) -> &[SideBySideRow] {
        &self.rows
    }
}

impl fmt::Display for SideBySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gap = self.width.saturating_sub(EXPECTED_HEADER.len());
        writeln!(
            f,
            "Line | {}{}{} | {}",
            " ".repeat(gap / 2),
            EXPECTED_HEADER,
            " ".repeat(gap - gap / 2),
            ACTUAL_HEADER
        )?;
        for row in &self.rows {
            let expected = row.expected.as_deref().unwrap_or("");
            let pad = self.width.saturating_sub(display_width(expected));
            writeln!(
                f,
                "{:4} | {}{} | {}",
                row.line,
                expected,
                " ".repeat(pad),
                row.actual.as_deref().unwrap_or("")
            )?;
        }
        Ok(())
    }
}

fn display_width(line: &str) -> usize {
    line.chars().count() + 3 * line.matches('\t').count()
}

/// Narrative comparing two values, appended to a spec's description.
///
/// Many short lines and sequences render as a side-by-side table; everything
/// else as an `Expected value` / `Actual value` pair.
pub fn describe_values(expected: &Value, actual: &Value) -> String {
    let e = clip(narrative_text(expected));
    let a = clip(narrative_text(actual));

    let newlines = e.matches('\n').count();
    let spaces = e.matches(' ').count();
    let longest = e.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    let dense = newlines > 3 && (e.len() / newlines < 4 || newlines > spaces / 2 || longest < 35);
    let is_sequence = expected.as_object().is_some_and(|o| o.is_sequence());

    if dense || is_sequence {
        format!("\n{}", SideBySide::from_text(&e, &a))
    } else {
        format!(
            "\nExpected value: {}\n  Actual value: {}\n",
            quote(expected, &e),
            quote(actual, &a)
        )
    }
}

/// Textual form used in narratives: arrays with quoted items, sequences one element per line.
pub fn narrative_text(value: &Value) -> String {
    match value {
        Value::Char(c) => format!("'{}'", c),
        Value::Array { items, .. } => {
            let parts: Vec<String> = items.iter().map(Value::quoted).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(obj) if obj.is_sequence() => {
            match obj.iterate(&mut InvocationEnv::detached()) {
                Ok(items) => {
                    let mut out = String::from("Iterable{\n");
                    for item in items {
                        out.push_str(&item.text());
                        out.push('\n');
                    }
                    out.push('}');
                    out
                }
                Err(thrown) => format!("Iterable{{ {} }}", thrown),
            }
        }
        other => other.text(),
    }
}

fn clip(text: String) -> String {
    if text.len() > MAX_NARRATIVE {
        OMITTED.to_string()
    } else {
        text
    }
}

fn quote(original: &Value, text: &str) -> String {
    match original {
        Value::Str(_) => {
            let lead = if text.len() > 90 || text.contains('\n') { "\n" } else { "" };
            format!("\"{}{}\"", lead, text.trim())
        }
        _ => text.to_string(),
    }
}

//! Recursive structural comparison of expected and actual values.
//!
//! [`StructuralComparator::compare`] walks a fixed dispatch chain; the first
//! rule that applies decides:
//!
//! 1. expected null: actual must be null
//! 2. floating point: equal within the tolerance
//! 3. other scalars: strict equality
//! 4. arrays: element-wise, by textual form when elements define one
//! 5. same class name from different universes: textual form if defined,
//!    otherwise field by field through this same chain
//! 6. sequences: lockstep line comparison, or a multiset when order is free
//! 7. symbol tables: same size, every expected key present with an equal value
//! 8. anything else: the objects' own equality

pub mod output;
pub mod render;

use std::collections::HashSet;
use std::fmt;

use crate::env::InvocationEnv;
use crate::value::{identity, ObjectRef, Value};

pub use output::{compare_lines, compare_output};
pub use render::{describe_values, SideBySide, SideBySideRow};

pub const DEFAULT_TOLERANCE: f64 = 0.005;

/// Which rule produced a mismatch.
#[derive(Debug, Clone, PartialEq)]
pub enum MismatchKind {
    Absent,
    Tolerance,
    Scalar,
    TypeMismatch,
    ArrayLength,
    ArrayElement { index: usize },
    TextForm,
    MissingField { field: String },
    TypeShape,
    SequenceLine { line: usize },
    SequenceLength,
    Unordered { missing: Vec<String>, extra: Vec<String> },
    TableSize,
    TableMissingKey { key: String },
    Thrown,
    Equality,
}

/// A failed comparison with its diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub kind: MismatchKind,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    /// Field path from the compared root, when the mismatch is nested.
    pub route: Option<String>,
}

impl Mismatch {
    pub fn new(kind: MismatchKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            expected: None,
            actual: None,
            route: None,
        }
    }

    pub fn with_values(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    /// Prefix the message with a test's hint.
    pub fn with_hint(mut self, hint: &str) -> Self {
        if !hint.is_empty() {
            self.message = format!("{}\n{}", hint, self.message);
        }
        self
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(route) = &self.route {
            write!(f, "\nRoute so far: {}", route)?;
        }
        if let (Some(e), Some(a)) = (&self.expected, &self.actual) {
            write!(f, " ==> expected: <{}> but was: <{}>", e, a)?;
        }
        Ok(())
    }
}

/// Breadcrumbs and cycle guard for one top-level comparison.
#[derive(Default)]
struct Walk {
    visited: HashSet<(usize, usize)>,
    trail: Vec<String>,
}

/// Type-dispatching equality checker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructuralComparator {
    tolerance: f64,
}

impl Default for StructuralComparator {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl StructuralComparator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Compare two values. `order_matters` applies to sequences.
    pub fn compare(
        &self,
        expected: &Value,
        actual: &Value,
        order_matters: bool,
        hint: &str,
    ) -> Result<(), Mismatch> {
        self.dispatch(expected, actual, order_matters, &mut Walk::default())
            .map_err(|m| m.with_hint(hint))
    }

    /// Field-by-field comparison of two objects, regardless of textual forms.
    pub fn compare_fields(
        &self,
        expected: &ObjectRef,
        actual: &ObjectRef,
        hint: &str,
    ) -> Result<(), Mismatch> {
        self.fields(expected, actual, &mut Walk::default())
            .map_err(|m| m.with_hint(hint))
    }

    /// Compare two already drained sequences.
    pub fn compare_sequences(
        &self,
        expected: &[Value],
        actual: &[Value],
        order_matters: bool,
        hint: &str,
    ) -> Result<(), Mismatch> {
        sequences(expected, actual, order_matters).map_err(|m| m.with_hint(hint))
    }

    /// Compare captured standard output.
    pub fn compare_output(&self, expected: &str, actual: &str, hint: &str) -> Result<(), Mismatch> {
        compare_output(expected, actual, self.tolerance).map_err(|m| m.with_hint(hint))
    }

    fn dispatch(
        &self,
        expected: &Value,
        actual: &Value,
        order_matters: bool,
        walk: &mut Walk,
    ) -> Result<(), Mismatch> {
        if expected.is_null() {
            return if actual.is_null() {
                Ok(())
            } else {
                Err(Mismatch::new(MismatchKind::Absent, "Expected null")
                    .with_values("null", actual.quoted()))
            };
        }
        if actual.is_null() {
            return Err(Mismatch::new(
                MismatchKind::Absent,
                format!("expected {} but was null", expected.quoted()),
            )
            .with_values(expected.quoted(), "null"));
        }

        if expected.is_floating() {
            let e = expected.as_f64().unwrap_or(f64::NAN);
            return match actual.as_f64() {
                Some(a) if within(e, a, self.tolerance) => Ok(()),
                Some(_) => Err(Mismatch::new(
                    MismatchKind::Tolerance,
                    format!("Values differ by more than {}", self.tolerance),
                )
                .with_values(expected.text(), actual.text())),
                None => Err(type_mismatch(expected, actual)),
            };
        }

        if expected.is_scalar() {
            return if expected.deep_eq(actual) {
                Ok(())
            } else if expected.text() == actual.text() {
                Err(type_mismatch(expected, actual))
            } else {
                Err(Mismatch::new(MismatchKind::Scalar, "Values are not equal")
                    .with_values(expected.quoted(), actual.quoted()))
            };
        }

        if let Value::Array { items: e_items, .. } = expected {
            return match actual {
                Value::Array { items: a_items, .. } => {
                    self.arrays(e_items, a_items, walk)
                }
                _ => Err(type_mismatch(expected, actual)),
            };
        }

        let (Some(e_obj), Some(a_obj)) = (expected.as_object(), actual.as_object()) else {
            return Err(type_mismatch(expected, actual));
        };

        if e_obj.class_name() == a_obj.class_name() && e_obj.origin() != a_obj.origin() {
            return match e_obj.custom_text() {
                Some(e_text) => {
                    let a_text = actual.text();
                    if e_text == a_text {
                        Ok(())
                    } else {
                        Err(Mismatch::new(
                            MismatchKind::TextForm,
                            format!(
                                "The textual form of {} does not match the solution",
                                e_obj.class_name()
                            ),
                        )
                        .with_values(e_text, a_text))
                    }
                }
                None => self.fields(e_obj, a_obj, walk),
            };
        }

        if e_obj.is_sequence() {
            if !a_obj.is_sequence() {
                return Err(type_mismatch(expected, actual));
            }
            let e_items = drain(e_obj, "solution")?;
            let a_items = drain(a_obj, "submission")?;
            return sequences(&e_items, &a_items, order_matters);
        }

        if let Some(e_table) = e_obj.symbol_table() {
            let Some(a_table) = a_obj.symbol_table() else {
                return Err(type_mismatch(expected, actual));
            };
            if e_table.size != a_table.size {
                return Err(Mismatch::new(MismatchKind::TableSize, "Symbol table sizes differ")
                    .with_values(e_table.size.to_string(), a_table.size.to_string()));
            }
            for (key, e_value) in &e_table.entries {
                let Some(a_value) = a_table.get(key) else {
                    return Err(Mismatch::new(
                        MismatchKind::TableMissingKey { key: key.text() },
                        format!("Key {} is missing from the symbol table", key.quoted()),
                    ));
                };
                self.dispatch(e_value, a_value, true, walk).map_err(|mut m| {
                    m.message = format!("Value for key {} differs\n{}", key.quoted(), m.message);
                    m
                })?;
            }
            return Ok(());
        }

        if expected.deep_eq(actual) {
            return Ok(());
        }
        let mut message = "Objects are not equal".to_string();
        if let (Some(e_geo), Some(a_geo)) = (e_obj.geometry(), a_obj.geometry()) {
            let dump = format!(
                "\nExpected {}: {}\n  Actual {}: {}",
                e_obj.class_name(),
                coords(&e_geo),
                a_obj.class_name(),
                coords(&a_geo)
            );
            tracing::debug!(class_name = %e_obj.class_name(), dump = %dump, "geometric equality failed");
            message.push_str(&dump);
        }
        Err(Mismatch::new(MismatchKind::Equality, message)
            .with_values(expected.text(), actual.text()))
    }

    fn arrays(&self, expected: &[Value], actual: &[Value], walk: &mut Walk) -> Result<(), Mismatch> {
        if expected.len() != actual.len() {
            return Err(Mismatch::new(MismatchKind::ArrayLength, "Array lengths differ")
                .with_values(expected.len().to_string(), actual.len().to_string()));
        }
        let textual = expected
            .first()
            .and_then(Value::as_object)
            .is_some_and(|o| o.custom_text().is_some());
        for (index, (e, a)) in expected.iter().zip(actual).enumerate() {
            let outcome = if textual {
                let (e_text, a_text) = (e.text(), a.text());
                if e_text == a_text {
                    Ok(())
                } else {
                    Err(Mismatch::new(MismatchKind::ArrayElement { index }, "")
                        .with_values(e_text, a_text))
                }
            } else {
                self.dispatch(e, a, true, walk)
            };
            outcome.map_err(|mut m| {
                m.message = format!("Arrays differ at index {}\n{}", index, m.message)
                    .trim_end()
                    .to_string();
                if !matches!(m.kind, MismatchKind::ArrayElement { .. }) && m.route.is_none() {
                    m.kind = MismatchKind::ArrayElement { index };
                }
                m
            })?;
        }
        Ok(())
    }

    fn fields(&self, expected: &ObjectRef, actual: &ObjectRef, walk: &mut Walk) -> Result<(), Mismatch> {
        if !walk.visited.insert((identity(expected), identity(actual))) {
            return Ok(());
        }
        let class = expected.class_name().to_string();
        let names: Vec<String> = expected
            .declared_fields()
            .into_iter()
            .filter(|f| !f.starts_with("this$"))
            .collect();
        let present = actual.declared_fields();
        let missing: Vec<&String> = names.iter().filter(|f| !present.contains(f)).collect();
        if !missing.is_empty() {
            let list: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
            return Err(Mismatch::new(
                MismatchKind::TypeShape,
                format!(
                    "{} in the submission does not have the same shape as the solution: missing fields [{}]",
                    class,
                    list.join(", ")
                ),
            ));
        }

        let level = walk.trail.len() + 1;
        for name in names {
            let e = expected.field(&name).unwrap_or(Value::Null);
            let Some(a) = actual.field(&name) else {
                return Err(Mismatch::new(
                    MismatchKind::MissingField { field: name.clone() },
                    format!("Field {} of {} is missing", name, class),
                ));
            };
            walk.trail.push(format!("↓{}{{{}}}:", name, level));
            let outcome = self.dispatch(&e, &a, true, walk);
            if let Err(mut m) = outcome {
                if m.route.is_none() {
                    m.route = Some(walk.trail.join(" "));
                    m.message = format!(
                        "Failed when comparing the {} field of {} at level {}\n{}",
                        name, class, level, m.message
                    );
                }
                walk.trail.pop();
                return Err(m);
            }
            walk.trail.pop();
        }
        Ok(())
    }
}

fn sequences(expected: &[Value], actual: &[Value], order_matters: bool) -> Result<(), Mismatch> {
    let e: Vec<String> = expected.iter().map(Value::text).collect();
    let a: Vec<String> = actual.iter().map(Value::text).collect();
    if order_matters {
        return compare_lines(&e, &a, "Iterator produced unexpected sequence of values");
    }
    let mut pool = a;
    let mut missing = Vec::new();
    for item in e {
        match pool.iter().position(|candidate| *candidate == item) {
            Some(pos) => {
                pool.remove(pos);
            }
            None => missing.push(item),
        }
    }
    if missing.is_empty() && pool.is_empty() {
        return Ok(());
    }
    let message = format!(
        "Values do not match the solution (order ignored)\nMissing values: [{}]\nExtra values: [{}]",
        missing.join(", "),
        pool.join(", ")
    );
    Err(Mismatch::new(
        MismatchKind::Unordered {
            missing,
            extra: pool,
        },
        message,
    ))
}

fn drain(obj: &ObjectRef, side: &str) -> Result<Vec<Value>, Mismatch> {
    obj.iterate(&mut InvocationEnv::detached()).map_err(|thrown| {
        Mismatch::new(
            MismatchKind::Thrown,
            format!("Iterating the {} {} threw {}", side, obj.class_name(), thrown.root_cause()),
        )
    })
}

fn type_mismatch(expected: &Value, actual: &Value) -> Mismatch {
    let name = |v: &Value| {
        v.runtime_type()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "null".to_string())
    };
    Mismatch::new(MismatchKind::TypeMismatch, "Values have different types").with_values(
        format!("{}<{}>", name(expected), expected.text()),
        format!("{}<{}>", name(actual), actual.text()),
    )
}

/// Delta equality that also accepts identical infinities and NaN on both sides.
pub(crate) fn within(expected: f64, actual: f64, tolerance: f64) -> bool {
    expected == actual
        || (expected.is_nan() && actual.is_nan())
        || (expected - actual).abs() <= tolerance
}

fn coords(geo: &[(String, f64)]) -> String {
    let parts: Vec<String> = geo.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    parts.join(", ")
}

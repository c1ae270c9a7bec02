//! Line-oriented comparison of textual output.

use super::render::SideBySide;
use super::{within, Mismatch, MismatchKind};

/// Outputs shorter than this are compared as a single value.
const SHORT_OUTPUT: usize = 100;
/// Short outputs up to this length are tried as numbers first.
const NUMERIC_OUTPUT: usize = 25;

/// Compare captured standard output.
///
/// Short output is compared whole, numerically within `tolerance` when both
/// sides parse as numbers. Longer output is compared line by line and a
/// mismatch carries the full side-by-side table.
pub fn compare_output(expected: &str, actual: &str, tolerance: f64) -> Result<(), Mismatch> {
    let len = expected.chars().count();
    if len < SHORT_OUTPUT {
        if len <= NUMERIC_OUTPUT {
            if let (Ok(e), Ok(a)) = (expected.trim().parse::<f64>(), actual.trim().parse::<f64>()) {
                return if within(e, a, tolerance) {
                    Ok(())
                } else {
                    Err(Mismatch::new(
                        MismatchKind::Tolerance,
                        format!("Output differs by more than {}", tolerance),
                    )
                    .with_values(expected.trim(), actual.trim()))
                };
            }
        }
        if expected == actual {
            Ok(())
        } else {
            Err(Mismatch::new(MismatchKind::Scalar, "Output does not match")
                .with_values(expected, actual))
        }
    } else {
        let e: Vec<&str> = expected.lines().collect();
        let a: Vec<&str> = actual.lines().collect();
        compare_lines(&e, &a, "Standard output does not match the solution")
    }
}

/// Compare two line lists in lockstep.
pub fn compare_lines<E, A>(expected: &[E], actual: &[A], headline: &str) -> Result<(), Mismatch>
where
    E: AsRef<str>,
    A: AsRef<str>,
{
    for (line, (e, a)) in expected.iter().zip(actual).enumerate() {
        if e.as_ref() != a.as_ref() {
            return Err(Mismatch::new(
                MismatchKind::SequenceLine { line },
                format!(
                    "{}\nFailed on line {}\n{}",
                    headline,
                    line,
                    SideBySide::new(expected, actual)
                ),
            )
            .with_values(e.as_ref(), a.as_ref()));
        }
    }
    if expected.len() != actual.len() {
        return Err(Mismatch::new(
            MismatchKind::SequenceLength,
            format!(
                "{}\nExpected {} lines but found {}\n{}",
                headline,
                expected.len(),
                actual.len(),
                SideBySide::new(expected, actual)
            ),
        ));
    }
    Ok(())
}

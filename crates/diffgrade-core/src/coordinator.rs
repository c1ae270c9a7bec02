//! Runs registered specs and turns them into results and a report.
//!
//! Specs run strictly one at a time. Before each one its number is written to
//! the shared output channel; afterwards the channel is parsed back so any
//! incidental output lands on the result that produced it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::Instrument;

use crate::collaborators::{FileProbe, StyleChecker, AUDIT_DONE};
use crate::compare::{describe_values, Mismatch, MismatchKind};
use crate::context::RunContext;
use crate::error::{GraderError, GraderResult, IntrospectionError, UnpreparedTestConfiguration};
use crate::invoker::{CallOutcome, Invocation, InvocationPair, Operation};
use crate::leaderboard;
use crate::obs;
use crate::report::{self, Report, ReportWriter};
use crate::result::{Failure, FailureCategory, TestResult};
use crate::spec::describe::node_value_field;
use crate::spec::{split_args, ExpectedThrow, InstancePair, Target, TestKind, TestSpec};
use crate::suite::Suite;
use crate::value::{ObjectRef, Value};

/// Stdout narratives are only shown for output shorter than this.
const STDOUT_NARRATIVE_LIMIT: usize = 100;
/// Same, for `main`.
const MAIN_NARRATIVE_LIMIT: usize = 500;

const ITERATOR_HEADLINE: &str = "Iterator produced unexpected sequence of values\n\
Values printed one per line, then compared against the solution\n";
const NULL_INSTANCE: &str = "\nField instance is null. Did you initialize it correctly?";
const MESSAGE_MISMATCH: &str = "\n\nException message does not match the required string.\n\
Make sure the corner case check is the first operation of a method\n";

/// Diagnostic narrative plus the failure, if any, for one evaluated spec.
#[derive(Debug, Default)]
struct Verdict {
    narrative: String,
    failure: Option<Failure>,
}

impl Verdict {
    fn fail(failure: Failure) -> Self {
        Self {
            narrative: String::new(),
            failure: Some(failure),
        }
    }

    fn judged(narrative: String, check: Result<(), Mismatch>) -> Self {
        Self {
            narrative,
            failure: check.err().map(mismatch_failure),
        }
    }
}

fn mismatch_failure(mismatch: Mismatch) -> Failure {
    Failure::new(FailureCategory::AssertionMismatch, mismatch.to_string())
}

/// Owns results for one suite run.
pub struct TestLifecycleCoordinator {
    style: Arc<dyn StyleChecker>,
    files: Arc<dyn FileProbe>,
    owner: Option<String>,
    finished: bool,
    results: BTreeMap<u64, TestResult>,
    /// Max points per display bucket, in first-seen order.
    distribution: Vec<(String, f64)>,
}

impl TestLifecycleCoordinator {
    pub fn new(style: Arc<dyn StyleChecker>, files: Arc<dyn FileProbe>) -> Self {
        Self {
            style,
            files,
            owner: None,
            finished: false,
            results: BTreeMap::new(),
            distribution: Vec::new(),
        }
    }

    /// Claim the suite for `owner`. Only the first caller becomes the owner;
    /// later calls return `false`.
    pub fn begin_suite(&mut self, owner: &str) -> bool {
        if self.owner.is_some() {
            return false;
        }
        self.owner = Some(owner.to_string());
        true
    }

    /// Results so far, in spec-number order.
    pub fn results(&self) -> impl Iterator<Item = &TestResult> {
        self.results.values()
    }

    pub fn result(&self, number: u64) -> Option<&TestResult> {
        self.results.get(&number)
    }

    /// Max points per display bucket. Style checks share one bucket.
    pub fn point_distribution(&self) -> &[(String, f64)] {
        &self.distribution
    }

    /// Run one spec and record exactly one result for it.
    pub async fn run_spec(&mut self, ctx: &RunContext, spec: TestSpec) -> GraderResult<()> {
        obs::emit_spec_started(spec.number, &spec.name);
        ctx.channel.mark(spec.number);

        let verdict = match &spec.failure {
            Some(failure) => Verdict::fail(failure.clone()),
            None => self.evaluate(ctx, &spec).await?,
        };

        let attribution = ctx.channel.attribute();
        let number = attribution.owner().unwrap_or(spec.number);
        let result = self.results.entry(number).or_insert_with(|| {
            let mut r = TestResult::new(
                spec.number,
                spec.name.clone(),
                spec.class_name.clone(),
                spec.max_score,
                spec.visibility,
            );
            r.method_name = spec.kind.method_name().map(str::to_string);
            r.hint = spec.hint.clone();
            r
        });
        result.description = format!("{}{}", spec.description, verdict.narrative);
        if let Some(section) = ctx.channel.captured_section(&attribution.output) {
            result.add_output(&section);
        }
        if let Some(failure) = verdict.failure {
            result.fail(failure);
        }
        obs::emit_spec_finished(
            result.number,
            &result.name,
            result.passed(),
            result.failure().map(|f| f.category.as_str()),
        );

        let bucket = if result.name.contains("Checkstyle") {
            "Checkstyle".to_string()
        } else {
            result.name.clone()
        };
        let max_score = result.max_score;
        match self.distribution.iter_mut().find(|(name, _)| *name == bucket) {
            Some((_, points)) => *points += max_score,
            None => self.distribution.push((bucket, max_score)),
        }
        Ok(())
    }

    /// Aggregate the results into a report. Returns `None` unless `owner`
    /// started the suite, and only the first time.
    pub fn finish_suite(&mut self, ctx: &RunContext, owner: &str) -> Option<Report> {
        if self.finished || self.owner.as_deref() != Some(owner) {
            return None;
        }
        self.finished = true;

        let results: Vec<TestResult> = self.results.values().cloned().collect();
        let (earned, possible) = report::totals(&results);
        let board = leaderboard::compute(&ctx.config.metadata_path, earned, possible);
        let report = Report::from_results(
            &results,
            ctx.config.max_total_score,
            ctx.elapsed_ms(),
            vec![board],
        );
        tracing::info!(
            "Student score: {:.2} / {:.2} = {:.2}",
            earned,
            possible,
            report.score
        );
        obs::emit_suite_finished(
            &ctx.run_id.to_string(),
            report.score,
            ctx.config.max_total_score,
            report.execution_time,
        );
        obs::emit_point_distribution(&self.distribution);
        Some(report)
    }

    /// Run every spec in `suite`, then write and return the report.
    ///
    /// Returns `None` when another owner started the suite; that owner
    /// writes the report.
    pub async fn run_suite(&mut self, suite: &mut Suite, owner: &str) -> GraderResult<Option<Report>> {
        let ctx = suite.shared_context();
        let run_id = ctx.run_id.to_string();
        let span = obs::suite_span(&run_id, owner);

        async {
            if self.begin_suite(owner) {
                ctx.channel.reset();
            }
            let specs = suite.drain();
            obs::emit_suite_started(&run_id, owner, specs.len());
            for spec in specs {
                self.run_spec(&ctx, spec).await?;
            }
            let Some(report) = self.finish_suite(&ctx, owner) else {
                return Ok(None);
            };
            ReportWriter::from_config(&ctx.config)
                .write(&report)
                .map_err(|e| GraderError::Report(format!("{:#}", e)))?;
            Ok::<_, GraderError>(Some(report))
        }
        .instrument(span)
        .await
    }

    // -----------------------------------------------------------------------
    // Per-kind evaluation
    // -----------------------------------------------------------------------

    async fn evaluate(&self, ctx: &RunContext, spec: &TestSpec) -> GraderResult<Verdict> {
        match &spec.kind {
            TestKind::StyleCheck { class_name } => Ok(self.style_check(class_name).await),
            TestKind::FileExists { file_name } => Ok(self.file_exists(file_name).await),
            kind => {
                let target = spec.target.as_ref().ok_or_else(|| {
                    UnpreparedTestConfiguration::new(spec.name.clone(), "class must be selected")
                })?;
                match kind {
                    TestKind::Return {
                        method,
                        args,
                        order_matters,
                    } => {
                        let invocation = call(spec, target, method, args);
                        match ctx.invoker().invoke_for_value(&invocation).await? {
                            Ok(pair) => Ok(Verdict::judged(
                                describe_values(&pair.expected, &pair.actual),
                                ctx.comparator.compare(
                                    &pair.expected,
                                    &pair.actual,
                                    *order_matters,
                                    &spec.hint,
                                ),
                            )),
                            Err(f) => Ok(Verdict::fail(f.into_failure(
                                ctx,
                                &format!("calling {}", method),
                                FailureCategory::SubmissionException,
                            ))),
                        }
                    }
                    TestKind::Stdout { method, args } => {
                        let invocation = call(spec, target, method, args);
                        self.output_check(ctx, spec, &invocation, STDOUT_NARRATIVE_LIMIT)
                            .await
                    }
                    TestKind::Main { args } => {
                        let strings: Vec<Value> =
                            args.iter().map(|a| Value::from(a.as_str())).collect();
                        let invocation = Invocation {
                            types: target.types.clone(),
                            operation: Operation::Main,
                            args: InvocationPair::same(strings),
                            conditions: spec.conditions(),
                        };
                        self.output_check(ctx, spec, &invocation, MAIN_NARRATIVE_LIMIT)
                            .await
                    }
                    TestKind::Field { field } => field_check(ctx, spec, target, field, false),
                    TestKind::NodeTree { field } => field_check(ctx, spec, target, field, true),
                    TestKind::Iterator => iterator_check(ctx, spec, target).await,
                    TestKind::ConstructorThrows { args, expected } => {
                        let invocation = Invocation {
                            types: target.types.clone(),
                            operation: Operation::Construct,
                            args: split_args(args),
                            conditions: spec.conditions(),
                        };
                        corner_case(ctx, spec, &invocation, expected).await
                    }
                    TestKind::MethodThrows {
                        method,
                        args,
                        expected,
                    } => {
                        let invocation = call(spec, target, method, args);
                        corner_case(ctx, spec, &invocation, expected).await
                    }
                    TestKind::StyleCheck { .. } | TestKind::FileExists { .. } => {
                        Ok(Verdict::default())
                    }
                }
            }
        }
    }

    async fn style_check(&self, class_name: &str) -> Verdict {
        match self.style.check(class_name).await {
            Ok(verdict) if verdict.passed => Verdict::default(),
            Ok(verdict) => Verdict::fail(mismatch_failure(
                Mismatch::new(MismatchKind::Scalar, verdict.output)
                    .with_values(AUDIT_DONE, verdict.summary),
            )),
            Err(e) => Verdict::fail(Failure::new(FailureCategory::Collaborator, e.to_string())),
        }
    }

    async fn file_exists(&self, file_name: &str) -> Verdict {
        match self.files.exists(file_name).await {
            Ok(true) => Verdict::default(),
            Ok(false) => Verdict::fail(Failure::new(
                FailureCategory::AssertionMismatch,
                format!("{} missing\n", file_name),
            )),
            Err(e) => Verdict::fail(Failure::new(FailureCategory::Collaborator, e.to_string())),
        }
    }

    async fn output_check(
        &self,
        ctx: &RunContext,
        spec: &TestSpec,
        invocation: &Invocation,
        narrative_limit: usize,
    ) -> GraderResult<Verdict> {
        match ctx.invoker().invoke_for_output(invocation).await? {
            Ok(out) => {
                let narrative = if out.expected.chars().count() < narrative_limit {
                    describe_values(
                        &Value::from(out.expected.as_str()),
                        &Value::from(out.actual.as_str()),
                    )
                } else {
                    describe_values(&Value::from("results omitted"), &Value::from("to save space"))
                };
                Ok(Verdict::judged(
                    narrative,
                    ctx.comparator
                        .compare_output(&out.expected, &out.actual, &spec.hint),
                ))
            }
            Err(f) => Ok(Verdict::fail(f.into_failure(
                ctx,
                &format!("calling {}", invocation.operation.label()),
                FailureCategory::SubmissionException,
            ))),
        }
    }
}

impl std::fmt::Debug for TestLifecycleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestLifecycleCoordinator")
            .field("owner", &self.owner)
            .field("finished", &self.finished)
            .field("results", &self.results.len())
            .finish_non_exhaustive()
    }
}

/// Method call on the spec's instances, or a static call when there are none.
fn call(spec: &TestSpec, target: &Target, method: &str, args: &[crate::spec::Arg]) -> Invocation {
    Invocation {
        types: target.types.clone(),
        operation: Operation::Call {
            method: method.to_string(),
            receiver: target.instances.clone(),
        },
        args: split_args(args),
        conditions: spec.conditions(),
    }
}

fn instances<'t>(spec: &TestSpec, target: &'t Target) -> GraderResult<&'t InstancePair> {
    target.instances.as_ref().ok_or_else(|| {
        UnpreparedTestConfiguration::new(spec.name.clone(), "an instance is required").into()
    })
}

/// Payload of a node-like value, followed through nested nodes.
fn unwrap_node(value: Value) -> Value {
    let mut current = value;
    for _ in 0..16 {
        let next = match current.as_object() {
            Some(obj) if obj.class_name().contains("Node") => {
                node_value_field(obj).and_then(|f| obj.field(f))
            }
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => break,
        }
    }
    current
}

fn read_field(obj: &ObjectRef, field: &str) -> Result<Value, IntrospectionError> {
    obj.field(field).ok_or_else(|| IntrospectionError::NoSuchField {
        class_name: obj.class_name().to_string(),
        field: field.to_string(),
    })
}

fn field_check(
    ctx: &RunContext,
    spec: &TestSpec,
    target: &Target,
    field: &str,
    whole_tree: bool,
) -> GraderResult<Verdict> {
    let pair = instances(spec, target)?;
    let expected_obj = pair.expected.as_object().ok_or_else(|| {
        GraderError::ReferenceFailure(format!("{} instance is null", spec.class_name))
    })?;
    let expected = read_field(expected_obj, field)?;

    let Some(actual_obj) = pair.actual.as_object() else {
        return Ok(Verdict::fail(Failure::new(
            FailureCategory::AssertionMismatch,
            NULL_INSTANCE,
        )));
    };
    let Ok(actual) = read_field(actual_obj, field) else {
        return Ok(Verdict::fail(Failure::new(
            FailureCategory::AssertionMismatch,
            format!(
                "\nField {} in {} not found. Do not change the name of any given fields\n{}\n",
                field,
                actual_obj.class_name(),
                spec.hint
            ),
        )));
    };

    if whole_tree {
        let check = match (expected.as_object(), actual.as_object()) {
            (Some(e), Some(a)) => ctx.comparator.compare_fields(e, a, &spec.hint),
            _ => ctx.comparator.compare(&expected, &actual, true, &spec.hint),
        };
        return Ok(Verdict::judged(String::new(), check));
    }

    let expected = unwrap_node(expected);
    let actual = unwrap_node(actual);
    Ok(Verdict::judged(
        describe_values(&expected, &actual),
        ctx.comparator.compare(&expected, &actual, true, &spec.hint),
    ))
}

async fn iterator_check(ctx: &RunContext, spec: &TestSpec, target: &Target) -> GraderResult<Verdict> {
    let pair = instances(spec, target)?;
    match pair.actual.as_object() {
        Some(obj) if obj.is_sequence() => {}
        other => {
            let name = other.map_or(spec.class_name.as_str(), |o| o.class_name());
            return Ok(Verdict::fail(Failure::new(
                FailureCategory::AssertionMismatch,
                format!("{} does not implement the Iterator interface", name),
            )));
        }
    }

    let invocation = Invocation {
        types: target.types.clone(),
        operation: Operation::Iterate {
            receiver: pair.clone(),
        },
        args: InvocationPair::same(Vec::new()),
        conditions: spec.conditions(),
    };
    match ctx.invoker().invoke_for_value(&invocation).await? {
        Ok(drained) => {
            let expected = one_per_line(&drained.expected);
            let actual = one_per_line(&drained.actual);
            let headline = format!("\n{}\n{}", ITERATOR_HEADLINE, spec.hint);
            Ok(Verdict::judged(
                String::new(),
                ctx.comparator.compare_output(&expected, &actual, &headline),
            ))
        }
        Err(f) => Ok(Verdict::fail(f.into_failure(
            ctx,
            "iterating",
            FailureCategory::SubmissionException,
        ))),
    }
}

fn one_per_line(items: &Value) -> String {
    match items {
        Value::Array { items, .. } => items.iter().map(|v| format!("{}\n", v.text())).collect(),
        other => format!("{}\n", other.text()),
    }
}

/// Run only the submission and require the expected exception.
async fn corner_case(
    ctx: &RunContext,
    spec: &TestSpec,
    invocation: &Invocation,
    expected: &ExpectedThrow,
) -> GraderResult<Verdict> {
    let outcome = match ctx.invoker().invoke_submission(invocation).await? {
        Ok(outcome) => outcome,
        Err(e) => {
            return Ok(Verdict::fail(Failure::new(
                FailureCategory::Resolution,
                format!("\n{}\n", e),
            )))
        }
    };
    Ok(match check_thrown(&outcome, expected, &spec.hint) {
        Ok(()) => Verdict::default(),
        Err(failure) => Verdict::fail(failure),
    })
}

/// Exact-type and exact-message match of the root cause.
pub fn check_thrown(outcome: &CallOutcome, expected: &ExpectedThrow, hint: &str) -> Result<(), Failure> {
    let thrown = match outcome {
        CallOutcome::TimedOut => return Err(Failure::timeout()),
        CallOutcome::Returned { .. } => {
            return Err(mismatch_failure(
                Mismatch::new(
                    MismatchKind::Thrown,
                    format!(
                        "Expected {} to be thrown, but nothing was thrown.",
                        expected.type_name
                    ),
                )
                .with_hint(hint),
            ))
        }
        CallOutcome::Threw { thrown, .. } => thrown.root_cause(),
    };
    if !thrown.is_type(&expected.type_name) {
        return Err(mismatch_failure(
            Mismatch::new(MismatchKind::Thrown, "Unexpected exception type thrown")
                .with_values(&expected.type_name, &thrown.type_name)
                .with_hint(hint),
        ));
    }
    let message = thrown.message.as_deref().unwrap_or("null");
    if message != expected.message {
        return Err(mismatch_failure(
            Mismatch::new(MismatchKind::Thrown, MESSAGE_MISMATCH)
                .with_values(&expected.message, message),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::Thrown;

    fn expected() -> ExpectedThrow {
        ExpectedThrow {
            type_name: "IllegalArgumentException".into(),
            message: "bad input".into(),
        }
    }

    fn threw(thrown: Thrown) -> CallOutcome {
        CallOutcome::Threw {
            thrown,
            stdout: String::new(),
        }
    }

    #[test]
    fn test_exact_exception_passes() {
        let outcome = threw(Thrown::new("java.lang.IllegalArgumentException", "bad input"));
        assert!(check_thrown(&outcome, &expected(), "hint").is_ok());
    }

    #[test]
    fn test_message_must_match_exactly() {
        let outcome = threw(Thrown::new("IllegalArgumentException", "Bad input"));
        let failure = check_thrown(&outcome, &expected(), "hint").expect_err("message differs");
        assert!(failure
            .message
            .contains("Exception message does not match the required string."));
        assert!(failure
            .message
            .ends_with(" ==> expected: <bad input> but was: <Bad input>"));
    }

    #[test]
    fn test_subtype_does_not_count() {
        let outcome = threw(
            Thrown::new("NumberFormatException", "bad input")
                .with_ancestry(["IllegalArgumentException", "RuntimeException"]),
        );
        let failure = check_thrown(&outcome, &expected(), "hint").expect_err("subtype");
        assert!(failure.message.starts_with("hint\nUnexpected exception type thrown"));
    }

    #[test]
    fn test_nothing_thrown_and_timeout() {
        let returned = CallOutcome::Returned {
            value: Value::Null,
            stdout: String::new(),
        };
        let failure = check_thrown(&returned, &expected(), "").expect_err("nothing thrown");
        assert_eq!(
            failure.message,
            "Expected IllegalArgumentException to be thrown, but nothing was thrown."
        );
        let timed_out = check_thrown(&CallOutcome::TimedOut, &expected(), "").expect_err("timeout");
        assert_eq!(timed_out.category, FailureCategory::Timeout);
    }

    #[test]
    fn test_root_cause_is_checked() {
        let outcome = threw(
            Thrown::new("RuntimeException", "wrapper")
                .caused_by(Thrown::new("IllegalArgumentException", "bad input")),
        );
        assert!(check_thrown(&outcome, &expected(), "").is_ok());
    }

    #[test]
    fn test_one_per_line() {
        let items = Value::array(crate::value::JType::Object, vec![1.into(), 2.into()]);
        assert_eq!(one_per_line(&items), "1\n2\n");
    }
}

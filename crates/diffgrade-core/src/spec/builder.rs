//! Phased builder for [`TestSpec`]s.
//!
//! Each phase is its own type, so operations that make no sense yet (such as
//! binding arguments before a class is chosen) do not exist on the builder:
//!
//! ```text
//! Named ──class()──▶ TypeSelected ──constructor_args()──▶ ArgsBound ──instantiate()──▶ Instantiated
//!   │                    │                                    │                           │
//!   │                    └──main_method()──┐                  └─expect_constructor_throw()┤
//!   └──style_check() / file_exists()───────┴────────────────────────────────▶ Targeted ◀──┘ checking_*()
//!                                                                                 │
//!                                                                              build()
//! ```
//!
//! Construction and setup calls run while the chain is built; only the
//! checked operation runs later, under the coordinator. When the submission
//! type is missing or its constructor throws, the builder records the failure
//! and every later step becomes a no-op: the resulting spec fails with the
//! stored diagnostic.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::RunContext;
use crate::env::{Conditions, StdinFixture};
use crate::error::{GraderError, GraderResult, UnpreparedTestConfiguration};
use crate::invoker::{Invocation, Operation};
use crate::result::{Failure, FailureCategory, Visibility};
use crate::spec::describe;
use crate::spec::{
    first_failed_arg, split_args, Arg, ExpectedThrow, InstancePair, Target, TestKind, TestSpec,
};
use crate::suite::Suite;
use crate::universe::{Side, TypePair, TypeResolutionFailure};

const COMPILE_ERROR_NOTE: &str = "\nERR: Test failed due to a problem with the compiled output\n";
const INSTANTIATION_ERROR_NOTE: &str = "\nERR: Test failed due to problem instantiating class\n";
const SETUP_ERROR_NOTE: &str = "Test failed at this step of setup. See message below for more info\n";

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// A name has been given.
#[derive(Debug)]
pub struct Named;
/// The class under test is resolved on both sides.
#[derive(Debug)]
pub struct TypeSelected;
/// Constructor arguments are bound.
#[derive(Debug)]
pub struct ArgsBound;
/// Both instances exist (or the spec has already failed).
#[derive(Debug)]
pub struct Instantiated;
/// The checked operation is chosen; `build()` is available.
#[derive(Debug)]
pub struct Targeted;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KindDraft {
    Return,
    Stdout,
    Field,
    NodeTree,
    Iterator,
    Main,
    ConstructorThrows,
    MethodThrows,
    StyleCheck,
    FileExists,
}

/// Everything collected so far. Cloned when a two-step chain is retained.
#[derive(Debug, Clone)]
pub(crate) struct Draft {
    name: String,
    class_name: String,
    hint: Option<String>,
    description: Option<String>,
    note: Option<String>,
    narrative: String,
    max_score: f64,
    visibility: Visibility,
    seed: Option<u64>,
    step: u64,
    stdin: Option<StdinFixture>,
    order_matters: bool,
    types: Option<TypePair>,
    ctor_args: Option<Vec<Arg>>,
    instances: Option<InstancePair>,
    failure: Option<Failure>,
    kind: Option<KindDraft>,
    method: Option<String>,
    method_args: Option<Vec<Arg>>,
    field: Option<String>,
    expected_throw: Option<ExpectedThrow>,
    main_args: Vec<String>,
}

impl Draft {
    pub(crate) fn new(name: String, visibility: Visibility) -> Self {
        Self {
            name,
            class_name: String::new(),
            hint: None,
            description: None,
            note: None,
            narrative: String::new(),
            max_score: 1.0,
            visibility,
            seed: None,
            step: 0,
            stdin: None,
            order_matters: true,
            types: None,
            ctor_args: None,
            instances: None,
            failure: None,
            kind: None,
            method: None,
            method_args: None,
            field: None,
            expected_throw: None,
            main_args: Vec::new(),
        }
    }

    fn fail(&mut self, failure: Failure) {
        if self.failure.is_none() {
            self.failure = Some(failure);
        }
    }

    fn failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Conditions for the next step, advancing the step counter.
    fn next_conditions(&mut self) -> Conditions {
        let conditions = Conditions::for_step(self.seed, self.step, self.stdin.clone());
        self.step += 1;
        conditions
    }

    fn unprepared(&self, reason: &str) -> GraderError {
        UnpreparedTestConfiguration::new(self.name.clone(), reason).into()
    }
}

/// Builder for one spec, in phase `P`.
pub struct TestSpecBuilder<'s, P> {
    suite: &'s mut Suite,
    draft: Draft,
    phase: PhantomData<P>,
}

impl<'s, P> TestSpecBuilder<'s, P> {
    pub(crate) fn from_draft(suite: &'s mut Suite, draft: Draft) -> Self {
        Self {
            suite,
            draft,
            phase: PhantomData,
        }
    }

    fn into_phase<Q>(self) -> TestSpecBuilder<'s, Q> {
        TestSpecBuilder {
            suite: self.suite,
            draft: self.draft,
            phase: PhantomData,
        }
    }

    fn context(&self) -> Arc<RunContext> {
        self.suite.shared_context()
    }

    /// Text shown to the student when the spec fails.
    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.draft.hint = Some(hint.into());
        self
    }

    /// Replace the generated description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.draft.description = Some(description.into());
        self
    }

    /// Text placed before the description.
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.draft.note = Some(note.into());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.draft.seed = Some(seed);
        self
    }

    pub fn stdin(mut self, fixture: StdinFixture) -> Self {
        self.draft.stdin = Some(fixture);
        self
    }

    /// Compare returned sequences as multisets.
    pub fn order_insensitive(mut self) -> Self {
        self.draft.order_matters = false;
        self
    }

    pub fn max_score(mut self, max_score: f64) -> Self {
        self.draft.max_score = max_score;
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.draft.visibility = visibility;
        self
    }

    /// Whether an earlier step already failed the spec.
    pub fn failed(&self) -> bool {
        self.draft.failed()
    }
}

// ---------------------------------------------------------------------------
// Named
// ---------------------------------------------------------------------------

impl<'s> TestSpecBuilder<'s, Named> {
    /// Resolve `class_name` in both universes.
    ///
    /// A missing submission type fails the spec with the compiler diagnostic.
    /// A missing reference type is an authoring error.
    pub fn class(mut self, class_name: &str) -> GraderResult<TestSpecBuilder<'s, TypeSelected>> {
        self.draft.class_name = class_name.to_string();
        match self.context().universes.resolve(class_name) {
            Ok(types) => self.draft.types = Some(types),
            Err(TypeResolutionFailure::MissingReference { class_name }) => {
                return Err(GraderError::MissingReferenceType(class_name));
            }
            Err(TypeResolutionFailure::CompileFailure { diagnostic, .. }) => {
                self.draft.narrative.push_str(COMPILE_ERROR_NOTE);
                self.draft
                    .fail(Failure::new(FailureCategory::CompileFailure, diagnostic));
            }
        }
        Ok(self.into_phase())
    }

    /// Run the style checker over the submitted source of `class_name`.
    pub fn style_check(mut self, class_name: &str) -> TestSpecBuilder<'s, Targeted> {
        self.draft.class_name = class_name.to_string();
        self.draft.kind = Some(KindDraft::StyleCheck);
        self.draft.hint.get_or_insert_with(String::new);
        self.into_phase()
    }

    /// Check that `file_name` was submitted.
    pub fn file_exists(mut self, file_name: &str) -> TestSpecBuilder<'s, Targeted> {
        self.draft.class_name = file_name.to_string();
        self.draft.kind = Some(KindDraft::FileExists);
        self.draft.hint.get_or_insert_with(String::new);
        self.into_phase()
    }
}

// ---------------------------------------------------------------------------
// TypeSelected
// ---------------------------------------------------------------------------

impl<'s> TestSpecBuilder<'s, TypeSelected> {
    pub fn constructor_args<I, A>(mut self, args: I) -> TestSpecBuilder<'s, ArgsBound>
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        let args: Vec<Arg> = args.into_iter().map(Into::into).collect();
        for arg in &args {
            if let Arg::Object(obj) = arg {
                if !obj.description().is_empty() {
                    self.draft.narrative.push_str(obj.description());
                }
            }
        }
        if let Some(failure) = first_failed_arg(&args) {
            self.draft.fail(failure.clone());
        }
        self.draft.ctor_args = Some(args);
        self.into_phase()
    }

    /// Check the output of the static `main` entry point.
    pub fn main_method<I, S>(mut self, args: I) -> TestSpecBuilder<'s, Targeted>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.draft.main_args = args.into_iter().map(Into::into).collect();
        self.draft.kind = Some(KindDraft::Main);
        self.into_phase()
    }
}

// ---------------------------------------------------------------------------
// ArgsBound
// ---------------------------------------------------------------------------

impl<'s> TestSpecBuilder<'s, ArgsBound> {
    /// Construct both instances.
    pub async fn instantiate(mut self) -> GraderResult<TestSpecBuilder<'s, Instantiated>> {
        if self.draft.failed() {
            return Ok(self.into_phase());
        }
        let ctx = self.context();
        let args = self.draft.ctor_args.clone().unwrap_or_default();
        self.draft.narrative.push_str(&format!(
            "Calling the <{}> constructor {}\n",
            self.draft.class_name,
            describe::arg_list(&args)
        ));
        let Some(types) = self.draft.types.clone() else {
            return Ok(self.into_phase());
        };

        let invocation = Invocation {
            types,
            operation: Operation::Construct,
            args: split_args(&args),
            conditions: self.draft.next_conditions(),
        };
        match ctx.invoker().invoke_for_value(&invocation).await? {
            Ok(pair) => self.draft.instances = Some(pair),
            Err(failure) => {
                tracing::debug!(class_name = %self.draft.class_name, "construction failed");
                let during = format!("instantiating {}", self.draft.class_name);
                self.draft.narrative.push_str(INSTANTIATION_ERROR_NOTE);
                let failure =
                    failure.into_failure(&ctx, &during, FailureCategory::InstantiationFailure);
                self.draft.fail(failure);
            }
        }
        Ok(self.into_phase())
    }

    /// The constructor itself must throw `type_name` with `message`.
    /// Only the submission is invoked, when the spec runs.
    pub fn expect_constructor_throw(
        mut self,
        type_name: impl Into<String>,
        message: impl Into<String>,
    ) -> TestSpecBuilder<'s, Targeted> {
        self.draft.kind = Some(KindDraft::ConstructorThrows);
        self.draft.expected_throw = Some(ExpectedThrow {
            type_name: type_name.into(),
            message: message.into(),
        });
        self.into_phase()
    }
}

// ---------------------------------------------------------------------------
// Instantiated
// ---------------------------------------------------------------------------

impl<'s> TestSpecBuilder<'s, Instantiated> {
    /// Call a method on both instances for its side effect.
    pub async fn setup_call<I, A>(mut self, method: &str, args: I) -> GraderResult<Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        let args: Vec<Arg> = args.into_iter().map(Into::into).collect();
        if self.draft.failed() {
            return Ok(self);
        }
        self.draft.narrative.push_str(&format!(
            "   Calling <{}> {}\n",
            method,
            describe::arg_list(&args)
        ));
        if let Some(failure) = first_failed_arg(&args) {
            self.draft.fail(failure.clone());
            return Ok(self);
        }
        let (Some(types), Some(instances)) = (self.draft.types.clone(), self.draft.instances.clone())
        else {
            return Ok(self);
        };

        let ctx = self.context();
        let invocation = Invocation {
            types,
            operation: Operation::Call {
                method: method.to_string(),
                receiver: Some(instances),
            },
            args: split_args(&args),
            conditions: self.draft.next_conditions(),
        };
        if let Err(failure) = ctx.invoker().invoke_for_side_effect(&invocation).await? {
            self.draft.narrative.push_str(SETUP_ERROR_NOTE);
            let during = format!("calling {}", method);
            let failure = failure.into_failure(&ctx, &during, FailureCategory::SetupFailure);
            self.draft.fail(failure);
        }
        Ok(self)
    }

    /// Set a field on both instances.
    pub fn set_field(mut self, name: &str, value: impl Into<Arg>) -> GraderResult<Self> {
        let value = value.into();
        if self.draft.failed() {
            return Ok(self);
        }
        let shown = match &value {
            Arg::Value(v) => v.text(),
            Arg::Object(obj) => obj.to_string(),
        };
        if self.draft.class_name.contains("Node") {
            if name != "next" {
                self.draft.narrative.push_str(&format!("({})", shown));
            }
        } else {
            self.draft.narrative.push_str(&format!(
                "   Setting <{}.{}> to <{}>\n",
                self.draft.class_name, name, shown
            ));
        }
        if let Some(failure) = value.failure() {
            self.draft.fail(failure.clone());
            return Ok(self);
        }
        let Some(instances) = &self.draft.instances else {
            return Ok(self);
        };
        if let Some(expected) = instances.expected.as_object() {
            expected.set_field(name, value.for_side(Side::Expected))?;
        }
        let actual_result = match instances.actual.as_object() {
            Some(actual) => actual.set_field(name, value.for_side(Side::Actual)),
            None => Ok(()),
        };
        if let Err(e) = actual_result {
            self.draft.narrative.push_str(SETUP_ERROR_NOTE);
            self.draft
                .fail(Failure::new(FailureCategory::SetupFailure, format!("\n{}", e)));
        }
        Ok(self)
    }

    /// Keep this instance pair for later chains started with [`Suite::resume`].
    pub fn retain(self) {
        self.suite.retain(self.draft);
    }

    pub fn checking_return(self) -> TestSpecBuilder<'s, Targeted> {
        self.target(KindDraft::Return)
    }

    pub fn checking_stdout(self) -> TestSpecBuilder<'s, Targeted> {
        self.target(KindDraft::Stdout)
    }

    pub fn checking_field(self) -> TestSpecBuilder<'s, Targeted> {
        self.target(KindDraft::Field)
    }

    /// Field-by-field comparison of everything reachable from a field.
    pub fn checking_node_tree(self) -> TestSpecBuilder<'s, Targeted> {
        self.target(KindDraft::NodeTree)
    }

    pub fn checking_iterator(self) -> TestSpecBuilder<'s, Targeted> {
        self.target(KindDraft::Iterator)
    }

    /// A method must throw a given exception.
    pub fn checking_throw(self) -> TestSpecBuilder<'s, Targeted> {
        self.target(KindDraft::MethodThrows)
    }

    fn target(mut self, kind: KindDraft) -> TestSpecBuilder<'s, Targeted> {
        self.draft.kind = Some(kind);
        self.into_phase()
    }
}

// ---------------------------------------------------------------------------
// Targeted
// ---------------------------------------------------------------------------

impl<'s> TestSpecBuilder<'s, Targeted> {
    pub fn method(mut self, name: impl Into<String>) -> Self {
        self.draft.method = Some(name.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.draft.method_args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.draft.field = Some(name.into());
        self
    }

    pub fn exception(mut self, type_name: impl Into<String>, message: impl Into<String>) -> Self {
        self.draft.expected_throw = Some(ExpectedThrow {
            type_name: type_name.into(),
            message: message.into(),
        });
        self
    }

    /// Validate, finalize and register the spec. Returns its number.
    pub fn build(self) -> GraderResult<u64> {
        let TestSpecBuilder { suite, mut draft, .. } = self;
        let kind = assemble(&mut draft)?;

        if let Some(failure) = first_failed_arg(kind.args()) {
            draft.fail(failure.clone());
        }
        let mut description = match draft.description.take() {
            Some(explicit) => explicit,
            None if draft.narrative.is_empty() => draft.name.clone(),
            None => draft.narrative.clone(),
        };
        if let Some(note) = &draft.note {
            description = format!("{}\n\n{}", note, description);
        }

        let target = draft.types.take().map(|types| Target {
            types,
            instances: draft.instances.take(),
        });
        let spec = TestSpec {
            number: 0,
            name: draft.name,
            class_name: draft.class_name,
            description,
            hint: draft.hint.unwrap_or_default(),
            max_score: draft.max_score,
            visibility: draft.visibility,
            seed: draft.seed,
            step: draft.step,
            stdin: draft.stdin,
            kind,
            target,
            failure: draft.failure,
        };
        Ok(suite.register(spec))
    }
}

/// Check the fields the chosen kind needs and turn the draft into a [`TestKind`],
/// appending the kind's narrative.
fn assemble(draft: &mut Draft) -> GraderResult<TestKind> {
    let Some(kind) = draft.kind else {
        return Err(draft.unprepared("test kind must be set"));
    };
    if draft.hint.is_none() {
        return Err(draft.unprepared("hint must be set"));
    }
    if draft.max_score < 0.0 || draft.max_score.is_nan() {
        return Err(draft.unprepared("max_score must not be negative"));
    }

    let class_name = draft.class_name.clone();
    let kind = match kind {
        KindDraft::Return | KindDraft::Stdout => {
            let method = draft
                .method
                .clone()
                .ok_or_else(|| draft.unprepared("method name must be set"))?;
            let args = draft
                .method_args
                .clone()
                .ok_or_else(|| draft.unprepared("method args must be set"))?;
            if draft.ctor_args.is_none() {
                return Err(draft.unprepared("constructor args must be set"));
            }
            let returns = kind == KindDraft::Return;
            draft.narrative.push_str(&format!(
                "Calling <{}> {}\nThen checking {}\n",
                method,
                describe::arg_list(&args),
                if returns { "the returned value" } else { "standard output" }
            ));
            if returns {
                TestKind::Return {
                    method,
                    args,
                    order_matters: draft.order_matters,
                }
            } else {
                TestKind::Stdout { method, args }
            }
        }
        KindDraft::Field | KindDraft::NodeTree => {
            let field = draft
                .field
                .clone()
                .ok_or_else(|| draft.unprepared("field name must be set"))?;
            if kind == KindDraft::Field {
                draft
                    .narrative
                    .push_str(&format!("Then checking the value of <{}>\n", field));
                TestKind::Field { field }
            } else {
                draft.narrative.push_str(&format!(
                    "Then checking all values in the subtree rooted at <{}>\n",
                    field
                ));
                TestKind::NodeTree { field }
            }
        }
        KindDraft::Iterator => {
            draft
                .narrative
                .push_str("Then comparing its iterator against the solution's iterator\n");
            TestKind::Iterator
        }
        KindDraft::Main => {
            draft.narrative.push_str(&format!(
                "Calling the main method of <{}>\n{}\nThen checking standard output against the solution\n",
                class_name,
                describe::string_arg_list(&draft.main_args)
            ));
            TestKind::Main {
                args: draft.main_args.clone(),
            }
        }
        KindDraft::ConstructorThrows => {
            let expected = draft
                .expected_throw
                .clone()
                .ok_or_else(|| draft.unprepared("exception type and message must be set"))?;
            let args = draft.ctor_args.clone().unwrap_or_default();
            draft.narrative.push_str(&format!(
                "Calling the <{}> constructor {}\n{}",
                class_name,
                describe::arg_list(&args),
                throw_narrative(&expected)
            ));
            TestKind::ConstructorThrows { args, expected }
        }
        KindDraft::MethodThrows => {
            let method = draft
                .method
                .clone()
                .ok_or_else(|| draft.unprepared("method name must be set"))?;
            let expected = draft
                .expected_throw
                .clone()
                .ok_or_else(|| draft.unprepared("exception type and message must be set"))?;
            let args = draft.method_args.clone().unwrap_or_default();
            draft.narrative.push_str(&format!(
                "Calling <{}> {}\n{}",
                method,
                describe::arg_list(&args),
                throw_narrative(&expected)
            ));
            TestKind::MethodThrows {
                method,
                args,
                expected,
            }
        }
        KindDraft::StyleCheck => TestKind::StyleCheck { class_name },
        KindDraft::FileExists => TestKind::FileExists {
            file_name: class_name,
        },
    };
    Ok(kind)
}

fn throw_narrative(expected: &ExpectedThrow) -> String {
    format!(
        "Then checking that a(n) {}\n is thrown with the message: \"{}\"\n",
        expected.type_name, expected.message
    )
}

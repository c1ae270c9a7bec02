//! Dual invocation under matched conditions.
//!
//! [`DualInvoker`] runs one logical operation against the reference and then
//! the submission. Each side gets a fresh [`InvocationEnv`] built from the same
//! [`Conditions`], so both see the same random stream and the same stdin.
//!
//! Every call runs on its own worker thread bounded by
//! `tokio::time::timeout`. A call that outlives the bound is abandoned: the
//! thread keeps running until it finishes on its own, and the caller gets
//! [`CallOutcome::TimedOut`].
//!
//! Failure semantics differ by side. A reference-side exception is a tool
//! error and surfaces as [`GraderError::ReferenceFailure`]. A submission-side
//! exception becomes an [`InvokeFailure`] for the coordinator to report.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::context::RunContext;
use crate::env::{Conditions, InvocationEnv};
use crate::error::{GraderError, GraderResult, ResolutionError};
use crate::obs;
use crate::report::{self, OUT_OF_MEMORY_ADVICE};
use crate::result::{Failure, FailureCategory};
use crate::universe::{Side, Thrown, TypePair};
use crate::value::{JType, Value};

type Job = Box<dyn FnOnce(&mut InvocationEnv) -> Result<Value, Thrown> + Send + 'static>;

/// The same thing, once per side.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationPair<T> {
    pub expected: T,
    pub actual: T,
}

impl<T> InvocationPair<T> {
    pub fn new(expected: T, actual: T) -> Self {
        Self { expected, actual }
    }

    pub fn side(&self, side: Side) -> &T {
        match side {
            Side::Expected => &self.expected,
            Side::Actual => &self.actual,
        }
    }

    pub fn map<U, F>(self, mut f: F) -> InvocationPair<U>
    where
        F: FnMut(T) -> U,
    {
        InvocationPair {
            expected: f(self.expected),
            actual: f(self.actual),
        }
    }
}

impl<T: Clone> InvocationPair<T> {
    /// Both sides get a copy of `value`.
    pub fn same(value: T) -> Self {
        Self {
            expected: value.clone(),
            actual: value,
        }
    }
}

/// What to run on each side.
#[derive(Debug, Clone)]
pub enum Operation {
    Construct,
    /// Instance method, or static when `receiver` is `None`.
    Call {
        method: String,
        receiver: Option<InvocationPair<Value>>,
    },
    /// The static `main(String[])` entry point; the invocation's args are its strings.
    Main,
    /// Drain the receivers' iterators.
    Iterate { receiver: InvocationPair<Value> },
}

impl Operation {
    pub fn label(&self) -> String {
        match self {
            Operation::Construct => "constructor".to_string(),
            Operation::Call { method, .. } => method.clone(),
            Operation::Main => "main".to_string(),
            Operation::Iterate { .. } => "iterator".to_string(),
        }
    }
}

/// One logical operation and the conditions to run it under.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub types: TypePair,
    pub operation: Operation,
    pub args: InvocationPair<Vec<Value>>,
    pub conditions: Conditions,
}

/// What happened on one side.
#[derive(Debug, Clone)]
pub enum CallOutcome {
    Returned { value: Value, stdout: String },
    Threw { thrown: Thrown, stdout: String },
    TimedOut,
}

/// Why the submission side did not produce a result.
#[derive(Debug, Clone)]
pub enum InvokeFailure {
    Resolution(ResolutionError),
    /// Root cause of the submission's exception.
    Threw(Thrown),
    OutOfMemory(Thrown),
    TimedOut,
}

impl InvokeFailure {
    /// Student-facing failure for this outcome. `during` completes the
    /// sentence "thrown while ...".
    ///
    /// Out of memory also flushes an emergency report so a later crash still
    /// leaves partial results behind.
    pub fn into_failure(self, ctx: &RunContext, during: &str, on_throw: FailureCategory) -> Failure {
        match self {
            InvokeFailure::Resolution(e) => Failure::new(FailureCategory::Resolution, format!("\n{}\n", e)),
            InvokeFailure::Threw(thrown) => {
                let trace: String = thrown
                    .limited_trace()
                    .iter()
                    .map(|frame| format!("  > {}\n", frame))
                    .collect();
                Failure::new(
                    on_throw,
                    format!("\n{} was thrown while {}, caused by:\n{}", thrown, during, trace),
                )
            }
            InvokeFailure::OutOfMemory(_) => {
                if let Err(e) = report::write_out_of_memory_report(ctx) {
                    tracing::error!(error = %e, "could not write out-of-memory report");
                }
                Failure::new(FailureCategory::OutOfMemory, OUT_OF_MEMORY_ADVICE)
            }
            InvokeFailure::TimedOut => Failure::timeout(),
        }
    }
}

/// Student-facing outcome of a dual invocation.
pub type Outcome<T> = Result<T, InvokeFailure>;

/// Borrowed view of a [`RunContext`] that performs invocations.
pub struct DualInvoker<'a> {
    ctx: &'a RunContext,
}

impl<'a> DualInvoker<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// Run on both sides and return both values. The submission's incidental
    /// output goes to the shared channel.
    pub async fn invoke_for_value(
        &self,
        invocation: &Invocation,
    ) -> GraderResult<Outcome<InvocationPair<Value>>> {
        Ok(self.both(invocation).await?.map(|pair| {
            self.ctx.channel.write(&pair.actual.1);
            pair.map(|(value, _)| value)
        }))
    }

    /// Run on both sides and return what each printed.
    pub async fn invoke_for_output(
        &self,
        invocation: &Invocation,
    ) -> GraderResult<Outcome<InvocationPair<String>>> {
        Ok(self
            .both(invocation)
            .await?
            .map(|pair| pair.map(|(_, stdout)| stdout)))
    }

    /// Run on both sides for the side effect only.
    pub async fn invoke_for_side_effect(&self, invocation: &Invocation) -> GraderResult<Outcome<()>> {
        Ok(self.both(invocation).await?.map(|pair| {
            self.ctx.channel.write(&pair.actual.1);
        }))
    }

    /// Run on the submission side only. Used where a thrown exception is the
    /// expected result, so it is returned rather than reported.
    pub async fn invoke_submission(
        &self,
        invocation: &Invocation,
    ) -> GraderResult<Result<CallOutcome, ResolutionError>> {
        let outcome = self.run_side(invocation, Side::Actual).await?;
        if let Ok(CallOutcome::Returned { stdout, .. } | CallOutcome::Threw { stdout, .. }) = &outcome {
            self.ctx.channel.write(stdout);
        }
        Ok(outcome)
    }

    async fn both(
        &self,
        invocation: &Invocation,
    ) -> GraderResult<Outcome<InvocationPair<(Value, String)>>> {
        let class_name = invocation.types.class_name.as_str();
        let op = invocation.operation.label();

        let expected = match self.run_side(invocation, Side::Expected).await? {
            Err(e) => return Ok(Err(InvokeFailure::Resolution(e))),
            Ok(CallOutcome::Returned { value, stdout }) => (value, stdout),
            Ok(CallOutcome::Threw { thrown, .. }) => {
                obs::emit_reference_failure(class_name, &thrown);
                return Err(GraderError::ReferenceFailure(format!(
                    "{} of {} threw {}",
                    op,
                    class_name,
                    thrown.render_with_trace()
                )));
            }
            Ok(CallOutcome::TimedOut) => {
                let msg = format!("{} of {} timed out", op, class_name);
                obs::emit_reference_failure(class_name, &msg);
                return Err(GraderError::ReferenceFailure(msg));
            }
        };

        let actual = match self.run_side(invocation, Side::Actual).await? {
            Err(e) => return Ok(Err(InvokeFailure::Resolution(e))),
            Ok(CallOutcome::Returned { value, stdout }) => (value, stdout),
            Ok(CallOutcome::Threw { thrown, stdout }) => {
                self.ctx.channel.write(&stdout);
                let root = thrown.root_cause().clone();
                return Ok(Err(if root.is_out_of_memory() {
                    InvokeFailure::OutOfMemory(root)
                } else {
                    InvokeFailure::Threw(root)
                }));
            }
            Ok(CallOutcome::TimedOut) => {
                obs::emit_invocation_timeout(class_name, &op, self.ctx.config.invocation_timeout_ms);
                return Ok(Err(InvokeFailure::TimedOut));
            }
        };

        Ok(Ok(InvocationPair::new(expected, actual)))
    }

    async fn run_side(
        &self,
        invocation: &Invocation,
        side: Side,
    ) -> GraderResult<Result<CallOutcome, ResolutionError>> {
        let job = match self.prepare(invocation, side) {
            Ok(job) => job,
            Err(e) => return Ok(Err(e)),
        };
        tracing::debug!(
            class_name = %invocation.types.class_name,
            operation = %invocation.operation.label(),
            side = ?side,
            "invoking"
        );
        let outcome = run_isolated(
            job,
            &invocation.conditions,
            self.ctx.config.invocation_timeout(),
        )
        .await?;
        Ok(Ok(outcome))
    }

    /// Resolve the member on one side and package the call.
    fn prepare(&self, invocation: &Invocation, side: Side) -> Result<Job, ResolutionError> {
        let universe = self.ctx.universes.side(side);
        let class = Arc::clone(invocation.types.side(side));
        let args = invocation.args.side(side).clone();
        let resolver = &self.ctx.resolver;

        let job: Job = match &invocation.operation {
            Operation::Construct => {
                let member = resolver.resolve_constructor(universe, class.as_ref(), &args)?;
                Box::new(move |env| class.construct(member.index, args, env))
            }
            Operation::Call { method, receiver } => {
                let member = resolver.resolve_method(universe, class.as_ref(), method, &args)?;
                let receiver = receiver.as_ref().map(|pair| pair.side(side).clone());
                Box::new(move |env| class.invoke(member.index, receiver, args, env))
            }
            Operation::Main => {
                let main_args = vec![Value::array(JType::Str, args)];
                let member = resolver.resolve_method(universe, class.as_ref(), "main", &main_args)?;
                Box::new(move |env| class.invoke(member.index, None, main_args, env))
            }
            Operation::Iterate { receiver } => {
                let target = receiver.side(side).clone();
                Box::new(move |env| match target.as_object() {
                    Some(obj) => obj
                        .iterate(env)
                        .map(|items| Value::array(JType::Object, items)),
                    None => Err(Thrown::new("NullPointerException", "cannot iterate over null")),
                })
            }
        };
        Ok(job)
    }
}

/// Run `job` on a dedicated thread with a fresh environment, bounded by `limit`.
pub async fn run_isolated(
    job: Job,
    conditions: &Conditions,
    limit: Duration,
) -> GraderResult<CallOutcome> {
    let stdin = conditions.stdin_bytes().await?;
    let seed = conditions.seed;
    let (tx, rx) = oneshot::channel();

    std::thread::Builder::new()
        .name("diffgrade-invoke".to_string())
        .spawn(move || {
            let mut env = InvocationEnv::new(seed, stdin);
            let result = panic::catch_unwind(AssertUnwindSafe(|| job(&mut env)))
                .unwrap_or_else(|payload| Err(Thrown::panic(panic_message(payload))));
            // The receiver is gone when the caller already timed out.
            let _ = tx.send((result, env.into_captured()));
        })
        .map_err(|e| GraderError::Worker(e.to_string()))?;

    match tokio::time::timeout(limit, rx).await {
        Ok(Ok((Ok(value), stdout))) => Ok(CallOutcome::Returned { value, stdout }),
        Ok(Ok((Err(thrown), stdout))) => Ok(CallOutcome::Threw { thrown, stdout }),
        Ok(Err(_)) => Err(GraderError::Worker(
            "invocation worker exited without reporting".to_string(),
        )),
        Err(_) => Ok(CallOutcome::TimedOut),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "invocation panicked".to_string()
    }
}

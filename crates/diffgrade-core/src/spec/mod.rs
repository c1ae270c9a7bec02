//! Test specifications: what to run and how to judge it.
//!
//! A [`TestSpec`] is built once through the phased [`builder`], numbered by the
//! [`registry`], and consumed exactly once by the coordinator.

pub mod argument;
pub mod builder;
pub mod describe;
pub mod registry;
pub mod template;

use serde::{Deserialize, Serialize};

use crate::env::{Conditions, StdinFixture};
use crate::invoker::InvocationPair;
use crate::result::{Failure, Visibility};
use crate::universe::{Side, TypePair};
use crate::value::Value;

pub use argument::ArgumentObject;
pub use builder::TestSpecBuilder;
pub use registry::SpecRegistry;
pub use template::SpecTemplate;

/// The reference and submission instances a spec operates on.
pub type InstancePair = InvocationPair<Value>;

/// A constructor or method argument.
#[derive(Debug, Clone)]
pub enum Arg {
    /// Passed unchanged to both sides.
    Value(Value),
    /// A separately constructed pair of objects, one per side.
    Object(ArgumentObject),
}

impl Arg {
    pub fn for_side(&self, side: Side) -> Value {
        match self {
            Arg::Value(v) => v.clone(),
            Arg::Object(obj) => obj.instances().side(side).clone(),
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Arg::Value(_) => None,
            Arg::Object(obj) => obj.failure(),
        }
    }
}

macro_rules! arg_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(v: $t) -> Self {
                Arg::Value(Value::from(v))
            }
        })*
    };
}

arg_from!(bool, char, i32, i64, f64, &str, String);

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Value(v)
    }
}

impl From<ArgumentObject> for Arg {
    fn from(obj: ArgumentObject) -> Self {
        Arg::Object(obj)
    }
}

/// Split an argument list into the values each side receives.
pub fn split_args(args: &[Arg]) -> InvocationPair<Vec<Value>> {
    InvocationPair::new(
        args.iter().map(|a| a.for_side(Side::Expected)).collect(),
        args.iter().map(|a| a.for_side(Side::Actual)).collect(),
    )
}

/// First failed argument object in `args`.
pub fn first_failed_arg(args: &[Arg]) -> Option<&Failure> {
    args.iter().find_map(Arg::failure)
}

/// The exception a corner-case spec expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedThrow {
    pub type_name: String,
    pub message: String,
}

/// What a spec checks. Each kind carries only the fields it needs.
#[derive(Debug, Clone)]
pub enum TestKind {
    Return {
        method: String,
        args: Vec<Arg>,
        order_matters: bool,
    },
    Stdout {
        method: String,
        args: Vec<Arg>,
    },
    Field {
        field: String,
    },
    NodeTree {
        field: String,
    },
    Iterator,
    Main {
        args: Vec<String>,
    },
    ConstructorThrows {
        args: Vec<Arg>,
        expected: ExpectedThrow,
    },
    MethodThrows {
        method: String,
        args: Vec<Arg>,
        expected: ExpectedThrow,
    },
    StyleCheck {
        class_name: String,
    },
    FileExists {
        file_name: String,
    },
}

impl TestKind {
    pub fn label(&self) -> &'static str {
        match self {
            TestKind::Return { .. } => "return",
            TestKind::Stdout { .. } => "stdout",
            TestKind::Field { .. } => "field",
            TestKind::NodeTree { .. } => "node_tree",
            TestKind::Iterator => "iterator",
            TestKind::Main { .. } => "main",
            TestKind::ConstructorThrows { .. } => "constructor_throws",
            TestKind::MethodThrows { .. } => "method_throws",
            TestKind::StyleCheck { .. } => "style_check",
            TestKind::FileExists { .. } => "file_exists",
        }
    }

    pub fn method_name(&self) -> Option<&str> {
        match self {
            TestKind::Return { method, .. }
            | TestKind::Stdout { method, .. }
            | TestKind::MethodThrows { method, .. } => Some(method),
            TestKind::Main { .. } => Some("main"),
            _ => None,
        }
    }

    /// Argument objects the kind passes to the submission.
    pub fn args(&self) -> &[Arg] {
        match self {
            TestKind::Return { args, .. }
            | TestKind::Stdout { args, .. }
            | TestKind::ConstructorThrows { args, .. }
            | TestKind::MethodThrows { args, .. } => args,
            _ => &[],
        }
    }
}

/// Resolved types and, for instance-based kinds, the constructed pair.
#[derive(Debug, Clone)]
pub struct Target {
    pub types: TypePair,
    pub instances: Option<InstancePair>,
}

/// Immutable description of one comparison scenario.
#[derive(Debug, Clone)]
pub struct TestSpec {
    /// Assigned at registration, starting from 1.
    pub number: u64,
    pub name: String,
    pub class_name: String,
    pub description: String,
    pub hint: String,
    pub max_score: f64,
    pub visibility: Visibility,
    pub seed: Option<u64>,
    /// Steps already taken while building; the checked operation runs at this step.
    pub step: u64,
    pub stdin: Option<StdinFixture>,
    pub kind: TestKind,
    pub target: Option<Target>,
    /// Set when building already failed; the spec fails with it unconditionally.
    pub failure: Option<Failure>,
}

impl TestSpec {
    /// Conditions for the checked operation.
    pub fn conditions(&self) -> Conditions {
        Conditions::for_step(self.seed, self.step, self.stdin.clone())
    }
}

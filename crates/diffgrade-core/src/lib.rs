//! diffgrade Core Library
//!
//! Differential testing of a submitted implementation against a reference
//! implementation of the same classes. Re-exports the pieces an embedder
//! needs to declare a suite, run it and write the results document.

pub mod channel;
pub mod collaborators;
pub mod compare;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod env;
pub mod error;
pub mod invoker;
pub mod leaderboard;
pub mod obs;
pub mod report;
pub mod resolver;
pub mod result;
pub mod spec;
pub mod suite;
pub mod telemetry;
pub mod universe;
pub mod value;

pub use channel::{Attribution, OutputChannel};
pub use collaborators::{
    CommandFileProbe, CommandStyleChecker, FileProbe, StyleChecker, StyleVerdict,
};
pub use compare::{
    compare_output, describe_values, Mismatch, MismatchKind, SideBySide, StructuralComparator,
    DEFAULT_TOLERANCE,
};
pub use config::GraderConfig;
pub use context::RunContext;
pub use coordinator::TestLifecycleCoordinator;
pub use env::{Conditions, InvocationEnv, StdinFixture};
pub use error::{
    GraderError, GraderResult, IntrospectionError, ResolutionError, UnpreparedTestConfiguration,
};
pub use invoker::{CallOutcome, DualInvoker, Invocation, InvocationPair, InvokeFailure, Operation};
pub use leaderboard::LeaderboardEntry;
pub use report::{Report, ReportWriter, TestEntry};
pub use resolver::ArgumentResolver;
pub use result::{Failure, FailureCategory, TestResult, Visibility};
pub use spec::{Arg, ArgumentObject, SpecTemplate, TestKind, TestSpec, TestSpecBuilder};
pub use suite::Suite;
pub use universe::native::{NativeClass, NativeUniverse};
pub use universe::{
    ClassHandle, Instance, Side, Signature, Thrown, TypePair, TypeUniverse, UniversePair,
};
pub use value::{JType, Origin, Prim, Value};

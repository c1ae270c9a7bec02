//! Argument objects: a pair of course-type instances passed as an argument.

use crate::error::{GraderError, GraderResult};
use crate::invoker::{Invocation, InvocationPair, Operation};
use crate::result::{Failure, FailureCategory};
use crate::spec::describe;
use crate::spec::{first_failed_arg, split_args, Arg, InstancePair};
use crate::suite::Suite;
use crate::universe::{Side, TypeResolutionFailure};
use crate::value::Value;

/// An expected/actual instance pair used as a constructor or method argument,
/// such as the head of a helper linked list.
///
/// Carries its own failure. A spec that uses a failed argument object fails
/// with that message instead of running.
#[derive(Debug, Clone)]
pub struct ArgumentObject {
    class_name: String,
    instances: InstancePair,
    args: Vec<Arg>,
    description: String,
    failure: Option<Failure>,
}

impl ArgumentObject {
    /// Construct `class_name` on both sides with `args`.
    pub async fn construct(suite: &Suite, class_name: &str, args: Vec<Arg>) -> GraderResult<Self> {
        let ctx = suite.context();
        let mut obj = Self {
            class_name: class_name.to_string(),
            instances: InvocationPair::same(Value::Null),
            args: Vec::new(),
            description: String::new(),
            failure: None,
        };
        if obj.is_node() {
            obj.description.push_str(class_name);
        } else {
            obj.description
                .push_str(&format!("Creating argument of class <{}> ", class_name));
        }
        let listed = describe::arg_list(&args);
        if !(obj.is_node() && args.is_empty()) {
            obj.description.push_str(&listed);
            obj.description.push('\n');
        }

        let types = match ctx.universes.resolve(class_name) {
            Ok(types) => types,
            Err(TypeResolutionFailure::MissingReference { class_name }) => {
                return Err(GraderError::MissingReferenceType(class_name));
            }
            Err(TypeResolutionFailure::CompileFailure { .. }) => {
                obj.failure = Some(Failure::new(
                    FailureCategory::ArgumentFailure,
                    format!("Test failed because {} could not be instantiated.", class_name),
                ));
                obj.args = args;
                return Ok(obj);
            }
        };
        if let Some(failure) = first_failed_arg(&args) {
            obj.failure = Some(failure.clone());
            obj.args = args;
            return Ok(obj);
        }

        let invocation = Invocation {
            types,
            operation: Operation::Construct,
            args: split_args(&args),
            conditions: Default::default(),
        };
        match ctx.invoker().invoke_for_value(&invocation).await? {
            Ok(pair) => obj.instances = pair,
            Err(failure) => {
                let during = format!("instantiating {}", class_name);
                let failure = failure.into_failure(ctx, &during, FailureCategory::ArgumentFailure);
                obj.failure = Some(Failure::new(
                    FailureCategory::ArgumentFailure,
                    format!(
                        "\nTest failed because an argument of class {} could not be created.{}",
                        class_name, failure.message
                    ),
                ));
            }
        }
        obj.args = args;
        Ok(obj)
    }

    /// Wrap instances that already exist on each side.
    pub fn wrap(expected: Value, actual: Value) -> Self {
        let class_name = expected
            .as_object()
            .map(|o| o.class_name().to_string())
            .unwrap_or_else(|| "Object".to_string());
        Self {
            description: String::new(),
            instances: InvocationPair::new(expected, actual),
            args: Vec::new(),
            failure: None,
            class_name,
        }
    }

    /// Set a field on both instances. `value` may be another argument object,
    /// in which case each side receives its own instance.
    pub fn set_field(&mut self, name: &str, value: impl Into<Arg>) -> GraderResult<()> {
        let value = value.into();
        let shown = match &value {
            Arg::Value(v) => v.text(),
            Arg::Object(obj) => obj.to_string(),
        };
        if self.is_node() {
            if name != "next" {
                self.description.push_str(&format!("({})", shown));
            }
        } else {
            self.description.push_str(&format!(
                "Setting <{}.{}> to <{}>\n",
                self.class_name, name, shown
            ));
        }
        if self.failure.is_some() {
            return Ok(());
        }
        if let Some(failure) = value.failure() {
            self.failure = Some(failure.clone());
            return Ok(());
        }

        let Some(expected) = self.instances.expected.as_object() else {
            return Ok(());
        };
        expected.set_field(name, value.for_side(Side::Expected))?;
        if let Some(actual) = self.instances.actual.as_object() {
            if let Err(e) = actual.set_field(name, value.for_side(Side::Actual)) {
                self.failure = Some(Failure::new(
                    FailureCategory::ArgumentFailure,
                    format!("\nCould not set {} on the submitted {}: {}", name, self.class_name, e),
                ));
            }
        }
        Ok(())
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn instances(&self) -> &InstancePair {
        &self.instances
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    fn is_node(&self) -> bool {
        self.class_name.contains("Node")
    }
}

impl std::fmt::Display for ArgumentObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.class_name, describe::arg_string(&self.args))
    }
}

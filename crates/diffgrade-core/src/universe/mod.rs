//! Introspection capability over two independently loaded type universes.
//!
//! The engine never knows the shape of the types it compares. Everything it
//! learns about a class (its constructors, methods, fields, textual form,
//! iteration behaviour) goes through the traits in this module. A
//! [`TypeUniverse`] resolves class names to [`ClassHandle`]s; instances
//! produced by those handles implement [`Instance`].
//!
//! Both the reference and the submission are looked up by the same name, and
//! no operation assumes the two results are the same type.

pub mod native;
pub mod thrown;

use std::any::Any;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::env::InvocationEnv;
use crate::error::IntrospectionError;
use crate::value::{JType, Origin, Value};

pub use thrown::Thrown;

// ---------------------------------------------------------------------------
// Instances
// ---------------------------------------------------------------------------

/// Snapshot of a course-defined associative container.
#[derive(Debug, Clone)]
pub struct SymbolTableView {
    pub ordered: bool,
    pub size: usize,
    pub entries: Vec<(Value, Value)>,
}

impl SymbolTableView {
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.deep_eq(key) || k.text() == key.text())
            .map(|(_, v)| v)
    }
}

/// Runtime view of an object created by either implementation.
pub trait Instance: Send + Sync + fmt::Debug {
    fn class_name(&self) -> &str;

    fn origin(&self) -> Origin;

    /// Supertypes and implemented interfaces, nearest first.
    fn ancestors(&self) -> Vec<String> {
        Vec::new()
    }

    /// The object's own textual form, when its class defines one.
    fn custom_text(&self) -> Option<String> {
        None
    }

    /// Field names in declaration order.
    fn declared_fields(&self) -> Vec<String> {
        Vec::new()
    }

    fn field(&self, name: &str) -> Option<Value> {
        let _ = name;
        None
    }

    fn set_field(&self, name: &str, value: Value) -> Result<(), IntrospectionError> {
        let _ = (name, value);
        Err(IntrospectionError::ReadOnly {
            class_name: self.class_name().to_string(),
        })
    }

    /// Whether the object can be iterated.
    fn is_sequence(&self) -> bool {
        false
    }

    /// Drain the object's iterator. Only meaningful when [`Instance::is_sequence`] holds.
    fn iterate(&self, env: &mut InvocationEnv) -> Result<Vec<Value>, Thrown> {
        let _ = env;
        Ok(Vec::new())
    }

    fn symbol_table(&self) -> Option<SymbolTableView> {
        None
    }

    /// Named coordinates of known geometric value types.
    fn geometry(&self) -> Option<Vec<(String, f64)>> {
        None
    }

    /// The class's own equality.
    fn equals(&self, other: &dyn Instance) -> bool {
        let _ = other;
        false
    }

    fn as_any(&self) -> &dyn Any;
}

// ---------------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------------

/// A constructor or method signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub params: Vec<JType>,
    #[serde(default)]
    pub is_static: bool,
}

impl Signature {
    pub fn new(name: impl Into<String>, params: Vec<JType>) -> Self {
        Self {
            name: name.into(),
            params,
            is_static: false,
        }
    }

    pub fn static_method(name: impl Into<String>, params: Vec<JType>) -> Self {
        Self {
            is_static: true,
            ..Self::new(name, params)
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        write!(f, "{}({})", self.name, params.join(", "))
    }
}

/// A loaded class in one universe.
///
/// Members are addressed by their index in [`ClassHandle::constructors`] or
/// [`ClassHandle::methods`], which must be stable for the life of the handle.
pub trait ClassHandle: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn origin(&self) -> Origin;

    fn supertypes(&self) -> Vec<String> {
        Vec::new()
    }

    fn constructors(&self) -> Vec<Signature>;

    fn methods(&self) -> Vec<Signature>;

    fn construct(
        &self,
        index: usize,
        args: Vec<Value>,
        env: &mut InvocationEnv,
    ) -> Result<Value, Thrown>;

    fn invoke(
        &self,
        index: usize,
        receiver: Option<Value>,
        args: Vec<Value>,
        env: &mut InvocationEnv,
    ) -> Result<Value, Thrown>;
}

/// One compiled-output root.
pub trait TypeUniverse: Send + Sync {
    fn origin(&self) -> Origin;

    fn resolve(&self, class_name: &str) -> Option<Arc<dyn ClassHandle>>;

    /// Compiler output for a class that failed to load.
    fn compile_diagnostic(&self, class_name: &str) -> Option<String> {
        let _ = class_name;
        None
    }

    fn supertypes_of(&self, class_name: &str) -> Vec<String> {
        self.resolve(class_name)
            .map(|class| class.supertypes())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Pairs
// ---------------------------------------------------------------------------

/// The two sides of a differential run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Expected,
    Actual,
}

impl Side {
    pub fn origin(self) -> Origin {
        match self {
            Side::Expected => Origin::Expected,
            Side::Actual => Origin::Actual,
        }
    }
}

/// One class name resolved independently in both universes.
#[derive(Debug, Clone)]
pub struct TypePair {
    pub class_name: String,
    pub expected: Arc<dyn ClassHandle>,
    pub actual: Arc<dyn ClassHandle>,
}

impl TypePair {
    pub fn side(&self, side: Side) -> &Arc<dyn ClassHandle> {
        match side {
            Side::Expected => &self.expected,
            Side::Actual => &self.actual,
        }
    }
}

/// Why a class name could not be resolved into a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeResolutionFailure {
    /// The reference side is missing: an authoring error.
    MissingReference { class_name: String },
    /// The submission side is missing: it did not compile or was not uploaded.
    CompileFailure {
        class_name: String,
        diagnostic: String,
    },
}

/// The reference and submission universes of one run.
#[derive(Clone)]
pub struct UniversePair {
    pub expected: Arc<dyn TypeUniverse>,
    pub actual: Arc<dyn TypeUniverse>,
}

impl UniversePair {
    pub fn new(expected: Arc<dyn TypeUniverse>, actual: Arc<dyn TypeUniverse>) -> Self {
        Self { expected, actual }
    }

    pub fn side(&self, side: Side) -> &dyn TypeUniverse {
        match side {
            Side::Expected => self.expected.as_ref(),
            Side::Actual => self.actual.as_ref(),
        }
    }

    /// Resolve `class_name` on both sides.
    pub fn resolve(&self, class_name: &str) -> Result<TypePair, TypeResolutionFailure> {
        let expected = self.expected.resolve(class_name).ok_or_else(|| {
            TypeResolutionFailure::MissingReference {
                class_name: class_name.to_string(),
            }
        })?;
        let actual = self.actual.resolve(class_name).ok_or_else(|| {
            let diagnostic = self.actual.compile_diagnostic(class_name);
            TypeResolutionFailure::CompileFailure {
                class_name: class_name.to_string(),
                diagnostic: compile_failure_message(diagnostic.as_deref()),
            }
        })?;
        Ok(TypePair {
            class_name: class_name.to_string(),
            expected,
            actual,
        })
    }
}

/// Student-facing text for a submission type that failed to load.
pub fn compile_failure_message(diagnostic: Option<&str>) -> String {
    match diagnostic {
        Some(text) => {
            let head: Vec<&str> = text.lines().chain(std::iter::repeat("")).take(3).collect();
            format!(
                "\nMissing file or compile error. Make sure your code compiles before uploading\n\
                 First 3 lines of error:\n{}\n",
                head.join("\n")
            )
        }
        None => "\nSomething went wrong during compilation, but a compile error was not saved.\n\
                 Please report this to the course staff."
            .to_string(),
    }
}

/// Read the compiler log stored next to a compiled-output root as `<Class>.err`.
pub fn read_compile_log(root: &Path, class_name: &str) -> Option<String> {
    std::fs::read_to_string(root.join(format!("{}.err", class_name))).ok()
}

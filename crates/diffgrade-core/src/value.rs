//! Dynamic value model shared by both type universes.
//!
//! Every argument, return value and field read crosses the engine as a
//! [`Value`]. Scalars carry their own variant so that strict equality can tell
//! an `Integer` from a `Long`; objects are opaque [`Instance`] handles that
//! only expose what the introspection capability allows.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::universe::Instance;

/// Primitive kinds understood by the argument resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prim {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

impl Prim {
    /// Keyword used for the unboxed form, e.g. `int`.
    pub fn keyword(self) -> &'static str {
        match self {
            Prim::Boolean => "boolean",
            Prim::Byte => "byte",
            Prim::Short => "short",
            Prim::Char => "char",
            Prim::Int => "int",
            Prim::Long => "long",
            Prim::Float => "float",
            Prim::Double => "double",
        }
    }

    /// Name of the boxed wrapper, e.g. `Integer`.
    pub fn boxed_name(self) -> &'static str {
        match self {
            Prim::Boolean => "Boolean",
            Prim::Byte => "Byte",
            Prim::Short => "Short",
            Prim::Char => "Character",
            Prim::Int => "Integer",
            Prim::Long => "Long",
            Prim::Float => "Float",
            Prim::Double => "Double",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, Prim::Boolean | Prim::Char)
    }

    pub fn is_floating(self) -> bool {
        matches!(self, Prim::Float | Prim::Double)
    }
}

/// Static parameter / runtime type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "of", rename_all = "snake_case")]
pub enum JType {
    Primitive(Prim),
    Boxed(Prim),
    Str,
    Object,
    Array(Box<JType>),
    Class(String),
}

impl JType {
    pub fn class(name: impl Into<String>) -> Self {
        JType::Class(name.into())
    }

    pub fn array(elem: JType) -> Self {
        JType::Array(Box::new(elem))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, JType::Primitive(_))
    }

    /// The primitive kind behind a primitive or boxed type.
    pub fn prim(&self) -> Option<Prim> {
        match self {
            JType::Primitive(p) | JType::Boxed(p) => Some(*p),
            _ => None,
        }
    }
}

impl fmt::Display for JType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JType::Primitive(p) => f.write_str(p.keyword()),
            JType::Boxed(p) => f.write_str(p.boxed_name()),
            JType::Str => f.write_str("String"),
            JType::Object => f.write_str("Object"),
            JType::Array(elem) => write!(f, "{}[]", elem),
            JType::Class(name) => f.write_str(name),
        }
    }
}

/// Which type universe produced a type or instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Reference implementation.
    Expected,
    /// Learner submission.
    Actual,
    /// Library types loaded identically by both sides.
    Shared,
}

impl Origin {
    pub fn label(self) -> &'static str {
        match self {
            Origin::Expected => "solution",
            Origin::Actual => "submission",
            Origin::Shared => "shared",
        }
    }
}

pub type ObjectRef = Arc<dyn Instance>;

/// A runtime value produced or consumed by either implementation.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Array { elem: JType, items: Vec<Value> },
    Object(ObjectRef),
}

impl Value {
    pub fn array(elem: JType, items: Vec<Value>) -> Self {
        Value::Array { elem, items }
    }

    pub fn object(instance: impl Instance + 'static) -> Self {
        Value::Object(Arc::new(instance))
    }

    /// Runtime type of the value. Scalars report their boxed wrapper; null has none.
    pub fn runtime_type(&self) -> Option<JType> {
        let ty = match self {
            Value::Null => return None,
            Value::Bool(_) => JType::Boxed(Prim::Boolean),
            Value::Char(_) => JType::Boxed(Prim::Char),
            Value::Byte(_) => JType::Boxed(Prim::Byte),
            Value::Short(_) => JType::Boxed(Prim::Short),
            Value::Int(_) => JType::Boxed(Prim::Int),
            Value::Long(_) => JType::Boxed(Prim::Long),
            Value::Float(_) => JType::Boxed(Prim::Float),
            Value::Double(_) => JType::Boxed(Prim::Double),
            Value::Str(_) => JType::Str,
            Value::Array { elem, .. } => JType::array(elem.clone()),
            Value::Object(obj) => JType::class(obj.class_name()),
        };
        Some(ty)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, Value::Float(_) | Value::Double(_))
    }

    /// Integer, string, boolean, character and other non-floating wrappers.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Bool(_)
                | Value::Char(_)
                | Value::Byte(_)
                | Value::Short(_)
                | Value::Int(_)
                | Value::Long(_)
                | Value::Str(_)
        )
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Byte(v) => Some(f64::from(*v)),
            Value::Short(v) => Some(f64::from(*v)),
            Value::Int(v) => Some(f64::from(*v)),
            Value::Long(v) => Some(*v as f64),
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(i64::from(*v)),
            Value::Short(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Plain textual form, as the value would print itself.
    pub fn text(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Char(c) => c.to_string(),
            Value::Byte(v) => v.to_string(),
            Value::Short(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Float(v) => format_double(f64::from(*v)),
            Value::Double(v) => format_double(*v),
            Value::Str(s) => s.clone(),
            Value::Array { items, .. } => {
                let parts: Vec<String> = items.iter().map(Value::text).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Object(obj) => obj
                .custom_text()
                .unwrap_or_else(|| format!("{}@{:x}", obj.class_name(), identity(obj))),
        }
    }

    /// Textual form used in generated descriptions: strings and characters are quoted.
    pub fn quoted(&self) -> String {
        match self {
            Value::Str(s) => format!("\"{}\"", s),
            Value::Char(c) => format!("'{}'", c),
            Value::Array { items, .. } => {
                let parts: Vec<String> = items.iter().map(Value::quoted).collect();
                format!("[{}]", parts.join(", "))
            }
            other => other.text(),
        }
    }

    /// Strict structural equality: same variant and same value, arrays element-wise,
    /// objects by identity or their own equality.
    pub fn deep_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Double(a), Value::Double(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array { items: a, .. }, Value::Array { items: b, .. }) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.deep_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b) || a.equals(b.as_ref()),
            _ => false,
        }
    }
}

/// Address-based identity of an object handle.
pub fn identity(obj: &ObjectRef) -> usize {
    Arc::as_ptr(obj) as *const () as usize
}

/// Render a floating-point number the way course output prints it (`5.0`, not `5`).
pub fn format_double(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if v.fract() == 0.0 && v.abs() < 1e7 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

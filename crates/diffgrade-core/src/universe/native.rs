//! In-process type universe backed by Rust closures.
//!
//! A [`NativeClassBuilder`] describes one class: its fields, constructors,
//! methods and optional behaviour (textual form, iteration, symbol table,
//! geometry, equality). Registering the same builder in two
//! [`NativeUniverse`]s yields two independent classes with the same name,
//! which is exactly the shape the differential engine expects.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::env::InvocationEnv;
use crate::error::IntrospectionError;
use crate::universe::{
    read_compile_log, ClassHandle, Instance, Signature, SymbolTableView, Thrown, TypeUniverse,
};
use crate::value::{JType, Origin, Value};

pub type CtorFn = Arc<dyn Fn(CtorCall<'_>) -> Result<Value, Thrown> + Send + Sync>;
pub type MethodFn = Arc<dyn Fn(MethodCall<'_>) -> Result<Value, Thrown> + Send + Sync>;

type TextFn = Arc<dyn Fn(&NativeObject) -> String + Send + Sync>;
type ElementsFn =
    Arc<dyn Fn(&NativeObject, &mut InvocationEnv) -> Result<Vec<Value>, Thrown> + Send + Sync>;
type TableFn = Arc<dyn Fn(&NativeObject) -> Vec<(Value, Value)> + Send + Sync>;
type GeometryFn = Arc<dyn Fn(&NativeObject) -> Vec<(String, f64)> + Send + Sync>;
type EqualsFn = Arc<dyn Fn(&NativeObject, &dyn Instance) -> bool + Send + Sync>;

/// Optional per-class behaviour shared by all instances.
#[derive(Clone, Default)]
pub struct ObjectBehavior {
    text: Option<TextFn>,
    elements: Option<ElementsFn>,
    table: Option<(bool, TableFn)>,
    geometry: Option<GeometryFn>,
    equals: Option<EqualsFn>,
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// Arguments to a native constructor.
pub struct CtorCall<'a> {
    pub class: &'a NativeClass,
    pub args: Vec<Value>,
    pub env: &'a mut InvocationEnv,
}

impl CtorCall<'_> {
    /// A fresh instance of the class with every declared field set to null.
    pub fn instantiate(&self) -> NativeObject {
        self.class.instantiate()
    }

    pub fn arg(&self, index: usize) -> &Value {
        self.args.get(index).unwrap_or(&Value::Null)
    }
}

/// Receiver and arguments of a native method.
pub struct MethodCall<'a> {
    pub class: &'a NativeClass,
    pub receiver: Option<Value>,
    pub args: Vec<Value>,
    pub env: &'a mut InvocationEnv,
}

impl MethodCall<'_> {
    /// The receiver as a native object.
    pub fn this(&self) -> Result<&NativeObject, Thrown> {
        self.receiver
            .as_ref()
            .and_then(Value::as_object)
            .and_then(|obj| obj.as_any().downcast_ref::<NativeObject>())
            .ok_or_else(|| Thrown::new("NullPointerException", "method called without a receiver"))
    }

    pub fn arg(&self, index: usize) -> &Value {
        self.args.get(index).unwrap_or(&Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// Generic instance with named fields.
pub struct NativeObject {
    class_name: String,
    origin: Origin,
    ancestors: Vec<String>,
    fields: Mutex<Vec<(String, Value)>>,
    behavior: ObjectBehavior,
}

impl NativeObject {
    pub fn new(
        class_name: impl Into<String>,
        origin: Origin,
        ancestors: Vec<String>,
        behavior: ObjectBehavior,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            origin,
            ancestors,
            fields: Mutex::new(Vec::new()),
            behavior,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(String, Value)>> {
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Field value, null when unset.
    pub fn get(&self, name: &str) -> Value {
        self.lock()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null)
    }

    /// Set a field, declaring it when new.
    pub fn set(&self, name: &str, value: Value) {
        let mut fields = self.lock();
        match fields.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => fields.push((name.to_string(), value)),
        }
    }

    pub fn with(self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value.into());
        self
    }

    pub fn into_value(self) -> Value {
        Value::Object(Arc::new(self))
    }
}

impl fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.lock().iter().map(|(n, _)| n.clone()).collect();
        f.debug_struct("NativeObject")
            .field("class_name", &self.class_name)
            .field("origin", &self.origin)
            .field("fields", &names)
            .finish()
    }
}

impl Instance for NativeObject {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn origin(&self) -> Origin {
        self.origin
    }

    fn ancestors(&self) -> Vec<String> {
        self.ancestors.clone()
    }

    fn custom_text(&self) -> Option<String> {
        self.behavior.text.as_ref().map(|f| f(self))
    }

    fn declared_fields(&self) -> Vec<String> {
        self.lock().iter().map(|(n, _)| n.clone()).collect()
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.lock()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn set_field(&self, name: &str, value: Value) -> Result<(), IntrospectionError> {
        let mut fields = self.lock();
        match fields.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => {
                slot.1 = value;
                Ok(())
            }
            None => Err(IntrospectionError::NoSuchField {
                class_name: self.class_name.clone(),
                field: name.to_string(),
            }),
        }
    }

    fn is_sequence(&self) -> bool {
        self.behavior.elements.is_some()
    }

    fn iterate(&self, env: &mut InvocationEnv) -> Result<Vec<Value>, Thrown> {
        match &self.behavior.elements {
            Some(f) => f(self, env),
            None => Ok(Vec::new()),
        }
    }

    fn symbol_table(&self) -> Option<SymbolTableView> {
        self.behavior.table.as_ref().map(|(ordered, f)| {
            let entries = f(self);
            SymbolTableView {
                ordered: *ordered,
                size: entries.len(),
                entries,
            }
        })
    }

    fn geometry(&self) -> Option<Vec<(String, f64)>> {
        self.behavior.geometry.as_ref().map(|f| f(self))
    }

    fn equals(&self, other: &dyn Instance) -> bool {
        match &self.behavior.equals {
            Some(f) => f(self, other),
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A library list visible identically to both sides.
pub fn shared_list(items: Vec<Value>) -> Value {
    let behavior = ObjectBehavior {
        text: Some(Arc::new(|obj: &NativeObject| obj.get("elements").text())),
        elements: Some(Arc::new(|obj: &NativeObject, _env: &mut InvocationEnv| {
            match obj.get("elements") {
                Value::Array { items, .. } => Ok(items),
                _ => Ok(Vec::new()),
            }
        })),
        ..ObjectBehavior::default()
    };
    NativeObject::new(
        "ArrayList",
        Origin::Shared,
        vec!["List".into(), "Iterable".into(), "Object".into()],
        behavior,
    )
    .with("elements", Value::array(JType::Object, items))
    .into_value()
}

// ---------------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------------

/// A class registered in a [`NativeUniverse`].
pub struct NativeClass {
    name: String,
    origin: Origin,
    supertypes: Vec<String>,
    fields: Vec<String>,
    constructors: Vec<(Signature, CtorFn)>,
    methods: Vec<(Signature, MethodFn)>,
    behavior: ObjectBehavior,
}

impl NativeClass {
    pub fn builder(name: impl Into<String>) -> NativeClassBuilder {
        NativeClassBuilder {
            name: name.into(),
            shared: false,
            supertypes: Vec::new(),
            fields: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            behavior: ObjectBehavior::default(),
        }
    }

    /// New instance with all declared fields null.
    pub fn instantiate(&self) -> NativeObject {
        let obj = NativeObject::new(
            self.name.clone(),
            self.origin,
            self.supertypes.clone(),
            self.behavior.clone(),
        );
        for field in &self.fields {
            obj.set(field, Value::Null);
        }
        obj
    }
}

impl fmt::Debug for NativeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeClass")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("constructors", &self.constructors.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

impl ClassHandle for NativeClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn origin(&self) -> Origin {
        self.origin
    }

    fn supertypes(&self) -> Vec<String> {
        self.supertypes.clone()
    }

    fn constructors(&self) -> Vec<Signature> {
        self.constructors.iter().map(|(sig, _)| sig.clone()).collect()
    }

    fn methods(&self) -> Vec<Signature> {
        self.methods.iter().map(|(sig, _)| sig.clone()).collect()
    }

    fn construct(
        &self,
        index: usize,
        args: Vec<Value>,
        env: &mut InvocationEnv,
    ) -> Result<Value, Thrown> {
        let (_, ctor) = self
            .constructors
            .get(index)
            .ok_or_else(|| Thrown::new("NoSuchMethodError", format!("{}#<init>{}", self.name, index)))?;
        ctor(CtorCall {
            class: self,
            args,
            env,
        })
    }

    fn invoke(
        &self,
        index: usize,
        receiver: Option<Value>,
        args: Vec<Value>,
        env: &mut InvocationEnv,
    ) -> Result<Value, Thrown> {
        let (_, method) = self
            .methods
            .get(index)
            .ok_or_else(|| Thrown::new("NoSuchMethodError", format!("{}#{}", self.name, index)))?;
        method(MethodCall {
            class: self,
            receiver,
            args,
            env,
        })
    }
}

/// Describes a class independently of the universe it is loaded into.
#[derive(Clone)]
pub struct NativeClassBuilder {
    name: String,
    shared: bool,
    supertypes: Vec<String>,
    fields: Vec<String>,
    constructors: Vec<(Signature, CtorFn)>,
    methods: Vec<(Signature, MethodFn)>,
    behavior: ObjectBehavior,
}

impl NativeClassBuilder {
    /// Library class: instances are reported as [`Origin::Shared`].
    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }

    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    pub fn constructor<F>(mut self, params: Vec<JType>, f: F) -> Self
    where
        F: Fn(CtorCall<'_>) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        let sig = Signature::new(self.name.clone(), params);
        self.constructors.push((sig, Arc::new(f)));
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, params: Vec<JType>, f: F) -> Self
    where
        F: Fn(MethodCall<'_>) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        self.methods.push((Signature::new(name, params), Arc::new(f)));
        self
    }

    pub fn static_method<F>(mut self, name: impl Into<String>, params: Vec<JType>, f: F) -> Self
    where
        F: Fn(MethodCall<'_>) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        self.methods
            .push((Signature::static_method(name, params), Arc::new(f)));
        self
    }

    pub fn text<F>(mut self, f: F) -> Self
    where
        F: Fn(&NativeObject) -> String + Send + Sync + 'static,
    {
        self.behavior.text = Some(Arc::new(f));
        self
    }

    pub fn iterable<F>(mut self, f: F) -> Self
    where
        F: Fn(&NativeObject, &mut InvocationEnv) -> Result<Vec<Value>, Thrown>
            + Send
            + Sync
            + 'static,
    {
        self.behavior.elements = Some(Arc::new(f));
        self
    }

    pub fn symbol_table<F>(mut self, ordered: bool, f: F) -> Self
    where
        F: Fn(&NativeObject) -> Vec<(Value, Value)> + Send + Sync + 'static,
    {
        self.behavior.table = Some((ordered, Arc::new(f)));
        self
    }

    pub fn geometry<F>(mut self, f: F) -> Self
    where
        F: Fn(&NativeObject) -> Vec<(String, f64)> + Send + Sync + 'static,
    {
        self.behavior.geometry = Some(Arc::new(f));
        self
    }

    pub fn equality<F>(mut self, f: F) -> Self
    where
        F: Fn(&NativeObject, &dyn Instance) -> bool + Send + Sync + 'static,
    {
        self.behavior.equals = Some(Arc::new(f));
        self
    }

    pub fn build(self, origin: Origin) -> NativeClass {
        NativeClass {
            name: self.name,
            origin: if self.shared { Origin::Shared } else { origin },
            supertypes: self.supertypes,
            fields: self.fields,
            constructors: self.constructors,
            methods: self.methods,
            behavior: self.behavior,
        }
    }
}

// ---------------------------------------------------------------------------
// Universe
// ---------------------------------------------------------------------------

/// Registry of native classes forming one type universe.
pub struct NativeUniverse {
    origin: Origin,
    classes: HashMap<String, Arc<NativeClass>>,
    diagnostics: HashMap<String, String>,
    compile_log_root: Option<PathBuf>,
}

impl NativeUniverse {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            classes: HashMap::new(),
            diagnostics: HashMap::new(),
            compile_log_root: None,
        }
    }

    pub fn with_class(mut self, class: NativeClassBuilder) -> Self {
        let class = class.build(self.origin);
        self.classes.insert(class.name.clone(), Arc::new(class));
        self
    }

    /// Record compiler output for a class that is absent from this universe.
    pub fn with_compile_error(mut self, class_name: &str, diagnostic: &str) -> Self {
        self.diagnostics
            .insert(class_name.to_string(), diagnostic.to_string());
        self
    }

    /// Read compiler output for absent classes from `<root>/<Class>.err`.
    pub fn with_compile_log_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.compile_log_root = Some(root.into());
        self
    }

    pub fn into_shared(self) -> Arc<dyn TypeUniverse> {
        Arc::new(self)
    }
}

impl TypeUniverse for NativeUniverse {
    fn origin(&self) -> Origin {
        self.origin
    }

    fn resolve(&self, class_name: &str) -> Option<Arc<dyn ClassHandle>> {
        self.classes
            .get(class_name)
            .map(|class| Arc::clone(class) as Arc<dyn ClassHandle>)
    }

    fn compile_diagnostic(&self, class_name: &str) -> Option<String> {
        self.diagnostics.get(class_name).cloned().or_else(|| {
            self.compile_log_root
                .as_deref()
                .and_then(|root| read_compile_log(root, class_name))
        })
    }
}

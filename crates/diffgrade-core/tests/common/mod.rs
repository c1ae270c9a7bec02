#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use diffgrade_core::collaborators::StyleVerdict;
use diffgrade_core::universe::native::{NativeClassBuilder, NativeObject, ObjectBehavior};
use diffgrade_core::universe::Instance;
use diffgrade_core::{
    FileProbe, GraderConfig, GraderResult, JType, NativeClass, NativeUniverse, Origin, Prim,
    RunContext, StyleChecker, Suite, TestLifecycleCoordinator, Thrown, UniversePair, Value,
};

/// How the submitted classes behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Reference,
    /// Same behaviour, but `add` is only reachable by loose matching.
    Correct,
    Buggy,
}

pub fn int() -> JType {
    JType::Primitive(Prim::Int)
}

fn num(v: &Value) -> i64 {
    v.as_i64().unwrap_or(0)
}

pub fn adder(flavor: Flavor) -> NativeClassBuilder {
    let buggy = flavor == Flavor::Buggy;
    let add_params = match flavor {
        Flavor::Reference => vec![int(), int()],
        _ => vec![JType::class("Number"), JType::class("Number")],
    };
    NativeClass::builder("Adder")
        .field("total")
        .constructor(vec![], |call| {
            Ok(call.instantiate().with("total", 0).into_value())
        })
        .constructor(vec![int()], |call| {
            let start = call.arg(0).clone();
            Ok(call.instantiate().with("total", start).into_value())
        })
        .method("add", add_params, move |call| {
            let sum = num(call.arg(0)) + num(call.arg(1));
            if buggy {
                call.env.println("debug: adding");
                return Ok(Value::Int((sum + 1) as i32));
            }
            Ok(Value::Int(sum as i32))
        })
        .method("accumulate", vec![int()], move |call| {
            let this = call.this()?;
            let next = num(&this.get("total")) + num(call.arg(0));
            this.set("total", Value::Int(next as i32));
            Ok(Value::Null)
        })
        .method("printSum", vec![int(), int()], move |call| {
            let sum = num(call.arg(0)) + num(call.arg(1));
            let shown = if buggy { sum - 1 } else { sum };
            call.env.println(&format!("sum = {}", shown));
            Ok(Value::Null)
        })
        .method("divide", vec![int(), int()], move |call| {
            let (a, b) = (num(call.arg(0)), num(call.arg(1)));
            if b == 0 {
                let thrown = if buggy {
                    Thrown::new("NumberFormatException", "bad input").with_ancestry([
                        "IllegalArgumentException",
                        "RuntimeException",
                    ])
                } else {
                    Thrown::new("java.lang.IllegalArgumentException", "bad input")
                        .with_ancestry(["RuntimeException"])
                };
                return Err(thrown);
            }
            Ok(Value::Int((a / b) as i32))
        })
        .method("roll", vec![], |call| Ok(Value::Int(call.env.uniform(1, 1000) as i32)))
        .method("spin", vec![], move |_call| {
            if buggy {
                std::thread::sleep(Duration::from_secs(2));
            }
            Ok(Value::Int(1))
        })
        .static_method("main", vec![JType::array(JType::Str)], move |call| {
            let names: Vec<String> = match call.arg(0) {
                Value::Array { items, .. } => items.iter().map(Value::text).collect(),
                _ => Vec::new(),
            };
            let line = call.env.read_line().unwrap_or_default();
            let greeting = if buggy { "Hi" } else { "Hello" };
            call.env
                .println(&format!("{} {} ({})", greeting, names.join(" "), line));
            Ok(Value::Null)
        })
}

pub fn node() -> NativeClassBuilder {
    NativeClass::builder("Node")
        .field("item")
        .field("next")
        .constructor(vec![], |call| Ok(call.instantiate().into_value()))
        .constructor(vec![JType::Object], |call| {
            let item = call.arg(0).clone();
            Ok(call.instantiate().with("item", item).into_value())
        })
}

/// A stack-ordered bag of linked nodes. The buggy flavor forgets to link
/// new nodes, keeping only the newest item.
pub fn linked_bag(flavor: Flavor) -> NativeClassBuilder {
    let buggy = flavor == Flavor::Buggy;
    NativeClass::builder("LinkedBag")
        .field("first")
        .field("size")
        .constructor(vec![], |call| {
            Ok(call.instantiate().with("size", 0).into_value())
        })
        .method("add", vec![JType::Object], move |call| {
            let this = call.this()?;
            let fresh = NativeObject::new("Node", this.origin(), vec![], ObjectBehavior::default())
                .with("item", call.arg(0).clone())
                .with("next", Value::Null);
            if !buggy {
                fresh.set("next", this.get("first"));
            }
            this.set("first", fresh.into_value());
            this.set("size", Value::Int(num(&this.get("size")) as i32 + 1));
            Ok(Value::Null)
        })
        .method("addAll", vec![JType::class("Node")], |call| {
            let this = call.this()?;
            let mut cursor = call.arg(0).clone();
            while let Some(node) = cursor.as_object().cloned() {
                let fresh =
                    NativeObject::new("Node", this.origin(), vec![], ObjectBehavior::default())
                        .with("item", node.field("item").unwrap_or(Value::Null))
                        .with("next", this.get("first"));
                this.set("first", fresh.into_value());
                this.set("size", Value::Int(num(&this.get("size")) as i32 + 1));
                cursor = node.field("next").unwrap_or(Value::Null);
            }
            Ok(this.get("size"))
        })
        .iterable(|obj, _env| {
            let mut items = Vec::new();
            let mut cursor = obj.get("first");
            while let Some(node) = cursor.as_object().cloned() {
                items.push(node.field("item").unwrap_or(Value::Null));
                cursor = node.field("next").unwrap_or(Value::Null);
            }
            Ok(items)
        })
}

pub fn reference() -> NativeUniverse {
    NativeUniverse::new(Origin::Expected)
        .with_class(adder(Flavor::Reference))
        .with_class(node())
        .with_class(linked_bag(Flavor::Reference))
}

pub fn submission(flavor: Flavor) -> NativeUniverse {
    NativeUniverse::new(Origin::Actual)
        .with_class(adder(flavor))
        .with_class(node())
        .with_class(linked_bag(flavor))
}

pub fn config(dir: &Path) -> GraderConfig {
    GraderConfig {
        invocation_timeout_ms: 300,
        results_path: dir.join("results").join("results.json"),
        metadata_path: dir.join("submission_metadata.json"),
        submission_root: dir.to_path_buf(),
        ..GraderConfig::default()
    }
}

pub fn context(dir: &Path, submission: NativeUniverse) -> Arc<RunContext> {
    let universes = UniversePair::new(reference().into_shared(), submission.into_shared());
    RunContext::new(config(dir), universes)
        .expect("run context")
        .shared()
}

pub fn suite(dir: &Path, flavor: Flavor) -> Suite {
    Suite::new(context(dir, submission(flavor)))
}

// ---------------------------------------------------------------------------
// Collaborator doubles
// ---------------------------------------------------------------------------

pub struct FixedStyle(pub &'static str);

#[async_trait]
impl StyleChecker for FixedStyle {
    async fn check(&self, _class_name: &str) -> GraderResult<StyleVerdict> {
        Ok(StyleVerdict::from_output(self.0))
    }
}

pub struct FixedFiles(pub Vec<&'static str>);

#[async_trait]
impl FileProbe for FixedFiles {
    async fn exists(&self, file_name: &str) -> GraderResult<bool> {
        Ok(self.0.contains(&file_name))
    }
}

pub fn coordinator() -> TestLifecycleCoordinator {
    TestLifecycleCoordinator::new(
        Arc::new(FixedStyle("Starting audit...\nAudit done.\n")),
        Arc::new(FixedFiles(vec!["Adder.java"])),
    )
}

mod common;

use common::Flavor;
use diffgrade_core::{
    Arg, ArgumentObject, FailureCategory, GraderError, GraderResult, Instance, SpecTemplate, Suite,
};

fn no_args() -> Vec<Arg> {
    Vec::new()
}

fn is_unprepared(result: &GraderResult<u64>, reason: &str) -> bool {
    matches!(result, Err(GraderError::Unprepared(e)) if e.reason.contains(reason))
}

#[tokio::test]
async fn test_missing_pieces_are_authoring_errors() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Correct);

    let no_hint = suite
        .test("add")
        .class("Adder")?
        .constructor_args(no_args())
        .instantiate()
        .await?
        .checking_return()
        .method("add")
        .args([1, 2])
        .build();
    assert!(is_unprepared(&no_hint, "hint"));

    let no_method = suite
        .test("add")
        .hint("")
        .class("Adder")?
        .constructor_args(no_args())
        .instantiate()
        .await?
        .checking_return()
        .args([1, 2])
        .build();
    assert!(is_unprepared(&no_method, "method name"));

    let no_args_given = suite
        .test("add")
        .hint("")
        .class("Adder")?
        .constructor_args(no_args())
        .instantiate()
        .await?
        .checking_stdout()
        .method("printSum")
        .build();
    assert!(is_unprepared(&no_args_given, "method args"));

    let no_field = suite
        .test("total")
        .hint("")
        .class("Adder")?
        .constructor_args(no_args())
        .instantiate()
        .await?
        .checking_field()
        .build();
    assert!(is_unprepared(&no_field, "field name"));

    let no_exception = suite
        .test("divide")
        .hint("")
        .class("Adder")?
        .constructor_args(no_args())
        .instantiate()
        .await?
        .checking_throw()
        .method("divide")
        .args([1, 0])
        .build();
    assert!(is_unprepared(&no_exception, "exception"));

    let negative = suite
        .test("add")
        .hint("")
        .max_score(-1.0)
        .class("Adder")?
        .constructor_args(no_args())
        .instantiate()
        .await?
        .checking_return()
        .method("add")
        .args([1, 2])
        .build();
    assert!(is_unprepared(&negative, "max_score"));

    assert!(suite.registry().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_reference_type_is_fatal() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Correct);
    let outcome = suite.test("ghost").class("Ghost");
    assert!(matches!(outcome, Err(GraderError::MissingReferenceType(name)) if name == "Ghost"));
    Ok(())
}

#[tokio::test]
async fn test_resume_requires_retained_pair() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Correct);
    assert!(matches!(suite.resume(), Err(GraderError::Unprepared(_))));
    Ok(())
}

#[tokio::test]
async fn test_numbers_are_sequential() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Correct);
    let first = suite.file_exists("Adder.java")?;
    let second = suite.style_check("Adder", 2.0)?;
    let third = suite.file_exists("Node.java")?;
    assert_eq!((first, second, third), (1, 2, 3));

    let specs = suite.drain();
    assert_eq!(specs.len(), 3);
    assert_eq!(specs[1].name, "Checkstyle Adder");
    assert_eq!(specs[1].max_score, 2.0);
    assert_eq!(specs[2].name, "File Existence (Node.java)");
    assert_eq!(specs[2].max_score, 0.01);
    assert_eq!(suite.file_exists("Bag.java")?, 4);
    Ok(())
}

#[tokio::test]
async fn test_template_seeds_advance_per_use() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Correct);
    let template = SpecTemplate::new("roll", "Adder", 2.0).hint("roll").seed(100);
    for _ in 0..2 {
        suite
            .prepared(&template)?
            .constructor_args(no_args())
            .instantiate()
            .await?
            .checking_return()
            .method("roll")
            .args(no_args())
            .build()?;
    }
    let specs = suite.drain();
    assert_eq!(specs[0].seed, Some(100));
    assert_eq!(specs[1].seed, Some(101));
    assert_eq!(specs[0].max_score, 2.0);
    // Construction took step 0; the checked call runs at step 1.
    assert_eq!(specs[0].step, 1);

    let incomplete = SpecTemplate::new("", "Adder", 0.0);
    assert!(matches!(
        suite.prepared(&incomplete),
        Err(GraderError::Unprepared(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_failed_construction_is_recorded_on_the_spec() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let reference = common::reference();
    let throwing = diffgrade_core::NativeUniverse::new(diffgrade_core::Origin::Actual).with_class(
        diffgrade_core::NativeClass::builder("Adder").constructor(vec![], |_call| {
            Err(diffgrade_core::Thrown::new("IllegalStateException", "not ready"))
        }),
    );
    let universes =
        diffgrade_core::UniversePair::new(reference.into_shared(), throwing.into_shared());
    let ctx = diffgrade_core::RunContext::new(common::config(dir.path()), universes)?.shared();
    let mut suite = Suite::new(ctx);

    let builder = suite
        .test("add")
        .hint("")
        .class("Adder")?
        .constructor_args(no_args())
        .instantiate()
        .await?;
    assert!(builder.failed());
    builder.checking_return().method("add").args([1, 2]).build()?;

    let spec = suite.drain().remove(0);
    let failure = spec.failure.expect("construction failure");
    assert_eq!(failure.category, FailureCategory::InstantiationFailure);
    assert!(failure
        .message
        .contains("IllegalStateException: not ready was thrown while instantiating Adder"));
    assert!(spec.description.contains("Calling the <Adder> constructor without arguments"));
    Ok(())
}

#[tokio::test]
async fn test_argument_object_field_override_reaches_both_sides() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let suite = common::suite(dir.path(), Flavor::Correct);

    let mut adder = ArgumentObject::construct(&suite, "Adder", no_args()).await?;
    adder.set_field("total", 7)?;
    assert!(!adder.failed());
    assert_eq!(
        adder.description(),
        "Creating argument of class <Adder> without arguments\nSetting <Adder.total> to <7>\n"
    );

    let mut node = ArgumentObject::construct(&suite, "Node", vec!["x".into()]).await?;
    node.set_field("item", "y")?;
    let pair = node.instances();
    for side in [&pair.expected, &pair.actual] {
        let obj = side.as_object().expect("constructed on both sides");
        assert_eq!(obj.field("item").map(|v| v.text()).as_deref(), Some("y"));
    }
    assert_eq!(node.to_string(), "Node(\"x\")");

    let wrapped = ArgumentObject::wrap(pair.expected.clone(), pair.actual.clone());
    assert_eq!(wrapped.class_name(), "Node");
    assert!(!wrapped.failed());
    Ok(())
}

#[tokio::test]
async fn test_argument_object_of_missing_class_is_fatal() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let suite = common::suite(dir.path(), Flavor::Correct);
    let outcome = ArgumentObject::construct(&suite, "Ghost", no_args()).await;
    assert!(matches!(outcome, Err(GraderError::MissingReferenceType(name)) if name == "Ghost"));
    Ok(())
}

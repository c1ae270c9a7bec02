//! Suites run against native reference and submission universes.

mod common;

use common::Flavor;
use diffgrade_core::report::OUT_OF_MEMORY_ADVICE;
use diffgrade_core::{
    Arg, ArgumentObject, FailureCategory, GraderResult, JType, NativeClass, NativeUniverse,
    Origin, Report, SpecTemplate, StdinFixture, Suite, Thrown,
};

fn no_args() -> Vec<Arg> {
    Vec::new()
}

async fn add_spec(suite: &mut Suite) -> GraderResult<u64> {
    suite
        .test("add")
        .hint("add should return the sum of its arguments")
        .class("Adder")?
        .constructor_args(no_args())
        .instantiate()
        .await?
        .checking_return()
        .method("add")
        .args([2, 3])
        .build()
}

#[tokio::test]
async fn test_matching_submission_earns_full_score() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Correct);
    let n = add_spec(&mut suite).await?;

    let mut coordinator = common::coordinator();
    let report = coordinator.run_suite(&mut suite, "Grader").await?;

    let result = coordinator.result(n).expect("result for add");
    assert!(result.passed(), "{}", result.output_text());
    assert_eq!(result.score, 1.0);
    assert_eq!(result.method_name.as_deref(), Some("add"));
    assert!(result
        .description
        .starts_with("Calling the <Adder> constructor without arguments\n"));
    assert!(result.description.contains("Calling <add> with arguments: (2, 3)"));

    let report = report.expect("owner gets the report");
    assert_eq!(report.score, 60.0);
    assert_eq!(report.tests.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_wrong_value_fails_with_captured_output() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Buggy);
    let n = add_spec(&mut suite).await?;

    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut suite, "Grader").await?;

    let result = coordinator.result(n).expect("result for add");
    assert!(!result.passed());
    assert_eq!(result.score, 0.0);
    assert_eq!(
        result.failure().map(|f| f.category),
        Some(FailureCategory::AssertionMismatch)
    );
    assert!(result.description.contains("Expected value: 5"));
    assert!(result.description.contains("Actual value: 6"));
    assert!(result.body().contains(" Captured Test Output: \ndebug: adding"));
    assert!(result
        .body()
        .contains("add should return the sum of its arguments"));
    Ok(())
}

#[tokio::test]
async fn test_compile_failure_fails_without_invoking() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let broken = NativeUniverse::new(Origin::Actual)
        .with_compile_error("Adder", "Adder.java:3: error: ';' expected\n  int x = 1\n         ^");
    let mut suite = Suite::new(common::context(dir.path(), broken));
    let n = add_spec(&mut suite).await?;

    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut suite, "Grader").await?;

    let result = coordinator.result(n).expect("result");
    assert_eq!(
        result.failure().map(|f| f.category),
        Some(FailureCategory::CompileFailure)
    );
    assert!(result.body().contains("First 3 lines of error:"));
    assert!(result.body().contains("';' expected"));
    Ok(())
}

#[tokio::test]
async fn test_runaway_submission_times_out() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Buggy);
    let n = suite
        .test("spin")
        .hint("")
        .class("Adder")?
        .constructor_args(no_args())
        .instantiate()
        .await?
        .checking_return()
        .method("spin")
        .args(no_args())
        .build()?;

    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut suite, "Grader").await?;

    let result = coordinator.result(n).expect("result");
    assert_eq!(result.failure().map(|f| f.category), Some(FailureCategory::Timeout));
    assert!(result.body().contains("Test timed out!"));
    Ok(())
}

#[tokio::test]
async fn test_retained_instances_carry_state() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Correct);
    suite
        .test("accumulate")
        .class("Adder")?
        .constructor_args([5])
        .instantiate()
        .await?
        .setup_call("accumulate", [3])
        .await?
        .retain();

    let first = suite
        .resume()?
        .hint("total after one call")
        .checking_field()
        .field("total")
        .build()?;
    let second = suite
        .resume()?
        .hint("total after two calls")
        .setup_call("accumulate", [2])
        .await?
        .checking_field()
        .field("total")
        .build()?;

    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut suite, "Grader").await?;

    for n in [first, second] {
        let result = coordinator.result(n).expect("result");
        assert!(result.passed(), "{}", result.output_text());
    }
    let second = coordinator.result(second).expect("second");
    assert!(second.description.contains("Calling <accumulate> with arguments: (2)"));
    assert!(second.description.contains("Expected value: 10"));
    Ok(())
}

async fn divide_by_zero(suite: &mut Suite) -> GraderResult<u64> {
    suite
        .test("divide corner case")
        .hint("divide must reject a zero divisor")
        .class("Adder")?
        .constructor_args(no_args())
        .instantiate()
        .await?
        .checking_throw()
        .method("divide")
        .args([1, 0])
        .exception("IllegalArgumentException", "bad input")
        .build()
}

#[tokio::test]
async fn test_corner_case_requires_exact_type() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;

    let mut good = common::suite(dir.path(), Flavor::Correct);
    let n = divide_by_zero(&mut good).await?;
    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut good, "Grader").await?;
    let result = coordinator.result(n).expect("result");
    assert!(result.passed(), "{}", result.output_text());
    assert!(result
        .description
        .contains("Then checking that a(n) IllegalArgumentException\n is thrown with the message: \"bad input\""));

    let mut bad = common::suite(dir.path(), Flavor::Buggy);
    let n = divide_by_zero(&mut bad).await?;
    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut bad, "Grader").await?;
    let result = coordinator.result(n).expect("result");
    assert!(!result.passed());
    assert!(result.body().contains("Unexpected exception type thrown"));
    assert!(result
        .body()
        .contains("expected: <IllegalArgumentException> but was: <NumberFormatException>"));
    Ok(())
}

#[tokio::test]
async fn test_stdout_and_main() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Buggy);
    let printed = suite
        .test("printSum")
        .hint("print the sum")
        .class("Adder")?
        .constructor_args(no_args())
        .instantiate()
        .await?
        .checking_stdout()
        .method("printSum")
        .args([2, 3])
        .build()?;
    let main = suite
        .test("main")
        .hint("greet everyone")
        .stdin(StdinFixture::Literal("from stdin\n".into()))
        .class("Adder")?
        .main_method(["Ada", "Grace"])
        .build()?;

    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut suite, "Grader").await?;

    let printed = coordinator.result(printed).expect("printSum");
    assert!(!printed.passed());
    assert!(printed.description.contains("Then checking standard output"));
    assert!(printed.description.contains("sum = 5"));
    assert!(printed.description.contains("sum = 4"));

    let main = coordinator.result(main).expect("main");
    assert!(!main.passed());
    assert!(main
        .description
        .contains("Calling the main method of <Adder>\nwith arguments: (\"Ada\", \"Grace\")"));
    assert!(main.description.contains("Hello Ada Grace (from stdin)"));
    assert!(main.description.contains("Hi Ada Grace (from stdin)"));
    Ok(())
}

async fn bag_specs(suite: &mut Suite) -> GraderResult<(u64, u64)> {
    suite
        .test("bag")
        .class("LinkedBag")?
        .constructor_args(no_args())
        .instantiate()
        .await?
        .setup_call("add", ["a"])
        .await?
        .setup_call("add", ["b"])
        .await?
        .retain();
    let tree = suite
        .resume()?
        .hint("link every node")
        .checking_node_tree()
        .field("first")
        .build()?;
    let iter = suite
        .resume()?
        .hint("iterate from the most recent item")
        .checking_iterator()
        .build()?;
    Ok((tree, iter))
}

#[tokio::test]
async fn test_node_tree_and_iterator() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;

    let mut good = common::suite(dir.path(), Flavor::Correct);
    let (tree, iter) = bag_specs(&mut good).await?;
    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut good, "Grader").await?;
    for n in [tree, iter] {
        let result = coordinator.result(n).expect("result");
        assert!(result.passed(), "{}", result.output_text());
    }

    let mut bad = common::suite(dir.path(), Flavor::Buggy);
    let (tree, iter) = bag_specs(&mut bad).await?;
    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut bad, "Grader").await?;

    let tree = coordinator.result(tree).expect("tree");
    assert!(!tree.passed());
    assert!(tree
        .description
        .contains("Then checking all values in the subtree rooted at <first>"));

    let iter = coordinator.result(iter).expect("iterator");
    assert!(!iter.passed());
    assert!(iter
        .body()
        .contains("Iterator produced unexpected sequence of values"));
    Ok(())
}

#[tokio::test]
async fn test_node_field_reads_payload() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Correct);
    let n = suite
        .test("node item")
        .hint("")
        .class("Node")?
        .constructor_args(["payload"])
        .instantiate()
        .await?
        .checking_field()
        .field("item")
        .build()?;

    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut suite, "Grader").await?;
    let result = coordinator.result(n).expect("result");
    assert!(result.passed(), "{}", result.output_text());
    assert!(result.description.contains("Then checking the value of <item>"));
    Ok(())
}

#[tokio::test]
async fn test_missing_field_on_submission() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let renamed = NativeUniverse::new(Origin::Actual).with_class(
        diffgrade_core::NativeClass::builder("Node")
            .field("value")
            .constructor(vec![diffgrade_core::JType::Object], |call| {
                let item = call.arg(0).clone();
                Ok(call.instantiate().with("value", item).into_value())
            }),
    );
    let mut suite = Suite::new(common::context(dir.path(), renamed));
    let n = suite
        .test("node item")
        .hint("")
        .class("Node")?
        .constructor_args(["payload"])
        .instantiate()
        .await?
        .checking_field()
        .field("item")
        .build()?;

    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut suite, "Grader").await?;
    let result = coordinator.result(n).expect("result");
    assert!(result
        .body()
        .contains("Field item in Node not found. Do not change the name of any given fields"));
    Ok(())
}

#[tokio::test]
async fn test_seeded_randomness_matches_across_sides() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Correct);
    let template = SpecTemplate::new("roll", "Adder", 1.0).hint("").seed(42);

    let mut numbers = Vec::new();
    for _ in 0..3 {
        let n = suite
            .prepared(&template)?
            .constructor_args(no_args())
            .instantiate()
            .await?
            .checking_return()
            .method("roll")
            .args(no_args())
            .build()?;
        numbers.push(n);
    }

    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut suite, "Grader").await?;
    for n in numbers {
        let result = coordinator.result(n).expect("result");
        assert!(result.passed(), "{}", result.output_text());
    }
    Ok(())
}

#[tokio::test]
async fn test_style_and_file_checks() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Correct);
    let style = suite.style_check("Adder", 2.0)?;
    let present = suite.file_exists("Adder.java")?;
    let absent = suite.file_exists("Bag.java")?;

    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut suite, "Grader").await?;

    let style = coordinator.result(style).expect("style");
    assert!(style.passed());
    assert_eq!(style.name, "Checkstyle Adder");
    assert!(coordinator.result(present).expect("present").passed());
    let absent = coordinator.result(absent).expect("absent");
    assert!(!absent.passed());
    assert!(absent.body().contains("Bag.java missing"));

    let distribution = coordinator.point_distribution();
    assert_eq!(distribution[0], ("Checkstyle".to_string(), 2.0));
    Ok(())
}

#[tokio::test]
async fn test_failing_style_check_shows_output() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Correct);
    let n = suite.style_check("Adder", 2.0)?;

    let mut coordinator = diffgrade_core::TestLifecycleCoordinator::new(
        std::sync::Arc::new(common::FixedStyle(
            "Starting audit...\n[WARN] Adder.java:4: '{' is not preceded with whitespace.\n[WARN] Adder.java:9: Line is longer than 100 characters.\nAudit done.\n",
        )),
        std::sync::Arc::new(common::FixedFiles(vec![])),
    );
    coordinator.run_suite(&mut suite, "Grader").await?;

    let result = coordinator.result(n).expect("style");
    assert!(!result.passed());
    assert!(result.body().contains("is not preceded with whitespace"));
    assert!(result
        .body()
        .contains("expected: <Audit done.> but was: <See warnings for details.>"));
    Ok(())
}

#[tokio::test]
async fn test_run_suite_writes_results_document() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Buggy);
    add_spec(&mut suite).await?;
    suite.file_exists("Adder.java")?;

    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut suite, "Grader").await?;

    let path = suite.context().config.results_path.clone();
    let raw = std::fs::read_to_string(&path)?;
    let doc: serde_json::Value = serde_json::from_str(&raw)?;
    let tests = doc["tests"].as_array().expect("tests array");
    assert_eq!(tests.len(), 2);
    assert_eq!(tests[0]["number"], "1");
    assert_eq!(tests[0]["score"], 0.0);
    assert_eq!(tests[1]["score"], 0.01);
    assert_eq!(tests[1]["visibility"], "visible");
    assert_eq!(doc["leaderboard"][0]["name"], "Score (%)");
    assert_eq!(doc["leaderboard"][0]["value"], -1.0);
    // 0.01 of 1.01 points, scaled to 60.
    assert_eq!(doc["score"], 0.59);
    Ok(())
}

#[tokio::test]
async fn test_only_first_owner_finishes() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Correct);
    let ctx = suite.shared_context();
    let mut coordinator = common::coordinator();

    assert!(coordinator.begin_suite("FirstSuite"));
    assert!(!coordinator.begin_suite("SecondSuite"));

    add_spec(&mut suite).await?;
    assert!(coordinator.run_suite(&mut suite, "SecondSuite").await?.is_none());
    assert_eq!(coordinator.results().count(), 1);
    assert!(!ctx.config.results_path.exists());

    assert!(coordinator.finish_suite(&ctx, "SecondSuite").is_none());
    assert!(coordinator.finish_suite(&ctx, "FirstSuite").is_some());
    assert!(coordinator.finish_suite(&ctx, "FirstSuite").is_none());
    Ok(())
}

/// `a -> b -> c` built from argument objects.
async fn chain(suite: &Suite) -> GraderResult<ArgumentObject> {
    let tail = ArgumentObject::construct(suite, "Node", vec!["c".into()]).await?;
    let mut mid = ArgumentObject::construct(suite, "Node", vec!["b".into()]).await?;
    mid.set_field("next", tail)?;
    let mut head = ArgumentObject::construct(suite, "Node", vec!["a".into()]).await?;
    head.set_field("next", mid)?;
    Ok(head)
}

async fn add_all_spec(suite: &mut Suite, head: ArgumentObject) -> GraderResult<u64> {
    suite
        .test("addAll")
        .hint("addAll should take every node of the chain")
        .class("LinkedBag")?
        .constructor_args(no_args())
        .instantiate()
        .await?
        .checking_return()
        .method("addAll")
        .args([head])
        .build()
}

#[tokio::test]
async fn test_argument_object_chain_is_passed_to_both_sides() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let mut suite = common::suite(dir.path(), Flavor::Correct);
    let head = chain(&suite).await?;
    assert!(!head.failed());
    let n = add_all_spec(&mut suite, head).await?;

    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut suite, "Grader").await?;
    let result = coordinator.result(n).expect("result");
    assert!(result.passed(), "{}", result.output_text());
    assert!(result
        .description
        .contains("Calling <addAll> with arguments: (Node{a\u{2b95} b\u{2b95} c})"));
    Ok(())
}

#[tokio::test]
async fn test_failed_argument_object_fails_the_spec() -> GraderResult<()> {
    let dir = tempfile::tempdir()?;
    let broken_node = NativeClass::builder("Node")
        .field("item")
        .field("next")
        .constructor(vec![JType::Object], |_call| {
            Err(Thrown::new("IllegalStateException", "no nodes"))
        });
    let submission = NativeUniverse::new(Origin::Actual)
        .with_class(common::adder(Flavor::Correct))
        .with_class(broken_node)
        .with_class(common::linked_bag(Flavor::Correct));
    let mut suite = Suite::new(common::context(dir.path(), submission));

    let head = ArgumentObject::construct(&suite, "Node", vec!["a".into()]).await?;
    assert!(head.failed());
    let n = add_all_spec(&mut suite, head).await?;

    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut suite, "Grader").await?;
    let result = coordinator.result(n).expect("result");
    assert_eq!(
        result.failure().map(|f| f.category),
        Some(FailureCategory::ArgumentFailure)
    );
    assert!(result
        .body()
        .contains("an argument of class Node could not be created"));
    assert!(result.body().contains("no nodes"));
    Ok(())
}

#[tokio::test]
async fn test_out_of_memory_while_constructing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let greedy = NativeClass::builder("Adder")
        .field("total")
        .constructor(vec![], |call| {
            call.env.println("allocating");
            Err(Thrown::out_of_memory())
        });
    let mut suite = Suite::new(common::context(
        dir.path(),
        NativeUniverse::new(Origin::Actual).with_class(greedy),
    ));

    let n = add_spec(&mut suite).await?;

    // The emergency report lands before the suite finishes.
    let results_path = suite.context().config.results_path.clone();
    let emergency: Report = serde_json::from_str(&std::fs::read_to_string(&results_path)?)?;
    assert_eq!(emergency.score, 0.0);
    assert_eq!(emergency.tests[0].name, "Error, out of memory");
    assert!(emergency.tests[0].output.starts_with("allocating\n"));

    let mut coordinator = common::coordinator();
    coordinator.run_suite(&mut suite, "Grader").await?;
    let result = coordinator.result(n).expect("result");
    assert_eq!(
        result.failure().map(|f| f.category),
        Some(FailureCategory::OutOfMemory)
    );
    assert!(result.body().contains(OUT_OF_MEMORY_ADVICE));
    Ok(())
}

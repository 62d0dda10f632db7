use crate::{
    language::compiler::CodegenError,
    tools::tester::{dump_script, run_script, ScriptError, TestOptions, TestReport},
};
use std::path::Path;

fn run_fixture(name: &str, source: &str) -> TestReport {
    run_script(Path::new(name), source, &TestOptions::default())
        .unwrap_or_else(|err| panic!("{name} failed to compile: {err}"))
}

fn assert_all_pass(report: &TestReport) {
    let failures: Vec<_> = report
        .failures()
        .map(|f| format!("{}: {}", f.name, f.detail))
        .collect();
    assert!(failures.is_empty(), "failed checks: {failures:#?}");
}

#[test]
fn conversion_fixture_passes() {
    let report = run_fixture(
        "conversions.wast",
        include_str!("../../tests/fixtures/conversions.wast"),
    );
    assert_eq!(report.outcomes.len(), 20);
    assert_all_pass(&report);
}

#[test]
fn trap_fixture_passes() {
    let report = run_fixture("traps.wast", include_str!("../../tests/fixtures/traps.wast"));
    assert_eq!(report.passed(), 7);
    assert_all_pass(&report);
}

#[test]
fn failing_fixture_reports_each_failure() {
    let report = run_fixture(
        "failing.wast",
        include_str!("../../tests/fixtures/failing.wast"),
    );
    let details: Vec<_> = report
        .failures()
        .map(|f| (f.name.as_str(), f.detail.as_str()))
        .collect();
    assert_eq!(
        details,
        vec![
            ("wasm_assert_1", "check returned i32 0"),
            (
                "wasm_assert_2",
                "expected trap \"integer divide by zero\", but returned"
            ),
            ("wasm_assert_3", "unexpected trap: integer divide by zero"),
        ]
    );
    assert_eq!(report.passed(), 1);
}

#[test]
fn syntax_fixture_is_rejected_with_a_span() {
    let source = include_str!("../../tests/fixtures/syntax_error.wast");
    let err = run_script(Path::new("syntax_error.wast"), source, &TestOptions::default())
        .expect_err("unknown directive");
    match err {
        ScriptError::Syntax { errors, .. } => {
            assert_eq!(errors.errors.len(), 1);
            let error = &errors.errors[0];
            assert_eq!(error.message, "Unknown directive `assert_equal`");
            assert_eq!(
                &source[error.span.start..error.span.end],
                "assert_equal"
            );
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn mismatched_expected_type_is_an_internal_error() {
    let err = run_script(
        Path::new("mismatch.wast"),
        "(assert_return (i32.add (i32.const 1) (i64.const 1)) (i32.const 2))",
        &TestOptions::default(),
    )
    .expect_err("mismatch");
    match err {
        ScriptError::Codegen { name, error, .. } => {
            assert_eq!(name, "wasm_assert_0");
            assert!(matches!(error, CodegenError::TypeMismatch { .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn dump_of_a_trap_script() {
    let out = dump_script(
        Path::new("dump.wast"),
        "(assert_trap (i32.div_u (i32.const 1) (i32.const 0)) \"integer divide by zero\")",
        false,
    )
    .expect("dump");
    assert_eq!(
        out,
        "(AssertTrap wasm_assert_0 \"integer divide by zero\"\n  (i32.div_u\n    (i32.const 1)\n    (i32.const 0)\n  )\n)\n"
    );
}

use std::{
    fs,
    path::PathBuf,
    process::{Command, Output},
};

fn wasp() -> Command {
    Command::new(env!("CARGO_BIN_EXE_wasp"))
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_command_passes_fixture_scripts() {
    let output = wasp()
        .arg("test")
        .arg(fixture("conversions.wast"))
        .arg(fixture("traps.wast"))
        .output()
        .expect("run wasp");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("test result: ok. 27 passed"));
}

#[test]
fn test_command_reports_failures() {
    let output = wasp()
        .arg("test")
        .arg(fixture("failing.wast"))
        .output()
        .expect("run wasp");
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("test name:wasm_assert_1"));
    assert!(err.contains("status:failed"));
    assert!(err.contains("test result: FAILED. 1 passed; 3 failed"));
}

#[test]
fn test_command_expands_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::copy(fixture("traps.wast"), dir.path().join("traps.wast")).expect("copy");
    fs::write(dir.path().join("README"), "not a script").expect("write");
    let output = wasp()
        .arg("test")
        .arg(dir.path())
        .output()
        .expect("run wasp");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("test result: ok. 7 passed"));
}

#[test]
fn syntax_errors_are_reported() {
    let output = wasp()
        .arg("test")
        .arg(fixture("syntax_error.wast"))
        .output()
        .expect("run wasp");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Unknown directive `assert_equal`"));
}

#[test]
fn dump_prints_the_assertion_tree() {
    let output = wasp()
        .arg("dump")
        .arg(fixture("traps.wast"))
        .output()
        .expect("run wasp");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.starts_with("(AssertTrap wasm_assert_0 \"integer divide by zero\"\n"));
    assert!(out.contains("(AssertReturn wasm_assert_6\n"));
}

#[test]
fn build_rejects_a_broken_manifest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manifest = dir.path().join("wasp.toml");
    fs::write(&manifest, "[runtime]\ntrap_handler = \"\"\n").expect("write");
    let script = dir.path().join("checks.wast");
    fs::copy(fixture("traps.wast"), &script).expect("copy");
    let output = wasp()
        .arg("build")
        .arg(&script)
        .output()
        .expect("run wasp");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("runtime.trap_handler"));
}

#[cfg(not(feature = "llvm"))]
#[test]
fn build_without_llvm_reports_the_missing_backend() {
    let output = wasp()
        .arg("build")
        .arg(fixture("traps.wast"))
        .output()
        .expect("run wasp");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--features llvm"));
}

#[cfg(feature = "llvm")]
#[test]
fn build_writes_textual_ir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("traps.ll");
    let output = wasp()
        .arg("build")
        .arg(fixture("traps.wast"))
        .arg("-o")
        .arg(&out)
        .arg("--target")
        .arg("x86_64-unknown-linux-gnu")
        .output()
        .expect("run wasp");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let ir = fs::read_to_string(out).expect("read ir");
    assert!(ir.contains("target triple = \"x86_64-unknown-linux-gnu\""));
    assert!(ir.contains("@wp_wasm_assert_6"));
}

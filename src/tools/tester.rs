use crate::{
    language::{
        assert::{Assertion, Check, Expectation},
        compiler::{CodegenError, Compiler, IrBuilder},
        errors::SyntaxErrors,
        parser::parse_script,
        span::Span,
        types::ValueType,
    },
    runtime::{Interpreter, Module, Outcome, ReferenceBuilder},
    tools::diagnostics::{emit_check_failure, emit_script_error},
};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info};

pub const SCRIPT_EXTENSION: &str = "wast";

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("{} has {} syntax error(s)", path.display(), errors.errors.len())]
    Syntax {
        path: PathBuf,
        text: String,
        errors: SyntaxErrors,
    },
    #[error("internal compiler error while generating `{name}` in {}", path.display())]
    Codegen {
        path: PathBuf,
        text: String,
        name: String,
        span: Span,
        #[source]
        error: CodegenError,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CheckOutcome {
    pub name: String,
    pub span: Span,
    pub passed: bool,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TestReport {
    pub path: PathBuf,
    pub outcomes: Vec<CheckOutcome>,
}

impl TestReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.passed).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.passed)
    }

    pub fn is_ok(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.passed)
    }
}

/// Parsed and generated script: the assertions and the reference module
/// their checks live in.
pub struct CompiledScript {
    pub assertions: Vec<Assertion>,
    pub checks: Vec<Check>,
    pub module: Module,
}

/// Parses `text` and lowers every assertion into `builder`, stopping at the
/// first one that fails to generate.
pub fn generate_script<B: IrBuilder>(
    path: &Path,
    text: &str,
    builder: &mut B,
) -> Result<(Vec<Assertion>, Vec<Check>), ScriptError> {
    let script = parse_script(text).map_err(|errors| ScriptError::Syntax {
        path: path.to_path_buf(),
        text: text.to_string(),
        errors,
    })?;
    let mut compiler = Compiler::new();
    let assertions = compiler.build_assertions(script);

    let mut checks = Vec::with_capacity(assertions.len());
    for assertion in &assertions {
        let check = assertion
            .generate(builder)
            .map_err(|error| ScriptError::Codegen {
                path: path.to_path_buf(),
                text: text.to_string(),
                name: assertion.name().to_string(),
                span: assertion.span(),
                error,
            })?;
        checks.push(check);
    }
    Ok((assertions, checks))
}

pub fn compile_script(path: &Path, text: &str) -> Result<CompiledScript, ScriptError> {
    let mut builder = ReferenceBuilder::new();
    let (assertions, checks) = generate_script(path, text, &mut builder)?;
    Ok(CompiledScript {
        assertions,
        checks,
        module: builder.finish(),
    })
}

#[derive(Clone, Debug, Default)]
pub struct TestOptions {
    /// Only evaluate checks whose name contains this text.
    pub filter: Option<String>,
}

impl TestOptions {
    fn selects(&self, check: &Check) -> bool {
        self.filter
            .as_deref()
            .map_or(true, |filter| check.name.contains(filter))
    }
}

pub fn run_script(
    path: &Path,
    text: &str,
    options: &TestOptions,
) -> Result<TestReport, ScriptError> {
    let compiled = compile_script(path, text)?;
    let interpreter = Interpreter::new(&compiled.module);
    let outcomes = compiled
        .checks
        .iter()
        .filter(|check| options.selects(check))
        .map(|check| evaluate_check(&interpreter, check))
        .collect();
    Ok(TestReport {
        path: path.to_path_buf(),
        outcomes,
    })
}

fn evaluate_check(interpreter: &Interpreter<'_>, check: &Check) -> CheckOutcome {
    let (passed, detail) = match (&check.expectation, interpreter.call(&check.function)) {
        (Expectation::ReturnsOne, Ok(Outcome::Returned(Some(value))))
            if value.ty() == ValueType::I32 && value.bits() == 1 =>
        {
            (true, "returned 1".to_string())
        }
        (Expectation::ReturnsOne, Ok(Outcome::Returned(Some(value)))) => {
            (false, format!("check returned {value}"))
        }
        (Expectation::ReturnsOne, Ok(Outcome::Returned(None))) => {
            (false, "check returned no value".to_string())
        }
        (Expectation::ReturnsOne, Ok(Outcome::Trapped(message))) => {
            (false, format!("unexpected trap: {message}"))
        }
        (Expectation::Trap(expected), Ok(Outcome::Trapped(message)))
            if message.contains(expected.as_str()) =>
        {
            (true, format!("trapped: {message}"))
        }
        (Expectation::Trap(expected), Ok(Outcome::Trapped(message))) => (
            false,
            format!("expected trap {expected:?}, got {message:?}"),
        ),
        (Expectation::Trap(expected), Ok(Outcome::Returned(_))) => {
            (false, format!("expected trap {expected:?}, but returned"))
        }
        (_, Err(err)) => (false, format!("evaluation failed: {err}")),
    };
    debug!(check = check.name.as_str(), passed, detail = detail.as_str(), "check evaluated");
    CheckOutcome {
        name: check.name.clone(),
        span: check.span,
        passed,
        detail,
    }
}

/// Assertion dumps of a script, optionally followed by the reference IR.
pub fn dump_script(path: &Path, text: &str, with_ir: bool) -> Result<String, ScriptError> {
    let compiled = compile_script(path, text)?;
    let mut out: String = compiled
        .assertions
        .iter()
        .map(|assertion| assertion.dump(0))
        .collect();
    if with_ir {
        out.push('\n');
        out.push_str(&compiled.module.to_string());
    }
    Ok(out)
}

pub fn read_script(path: &Path) -> Result<String, ScriptError> {
    fs::read_to_string(path).map_err(|error| ScriptError::Io {
        path: path.to_path_buf(),
        error,
    })
}

/// Expands directories into the `.wast` files below them, sorted by path.
pub fn collect_scripts(paths: &[PathBuf]) -> Result<Vec<PathBuf>, ScriptError> {
    let mut scripts = Vec::new();
    for path in paths {
        if path.is_dir() {
            collect_dir(path, &mut scripts)?;
        } else {
            scripts.push(path.clone());
        }
    }
    Ok(scripts)
}

fn collect_dir(dir: &Path, scripts: &mut Vec<PathBuf>) -> Result<(), ScriptError> {
    let io_error = |error| ScriptError::Io {
        path: dir.to_path_buf(),
        error,
    };
    let mut entries = fs::read_dir(dir)
        .map_err(io_error)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)?;
    entries.sort();
    for entry in entries {
        if entry.is_dir() {
            collect_dir(&entry, scripts)?;
        } else if entry.extension().is_some_and(|ext| ext == SCRIPT_EXTENSION) {
            scripts.push(entry);
        }
    }
    Ok(())
}

/// Runs every script and prints one line per failed check, then a summary.
pub fn run_tests(paths: &[PathBuf], options: &TestOptions) -> Result<(), String> {
    let paths = collect_scripts(paths).map_err(|err| {
        emit_script_error(&err);
        err.to_string()
    })?;
    if paths.is_empty() {
        return Err("No test scripts given".into());
    }

    let mut passed = 0;
    let mut failures = 0;
    for path in &paths {
        let report = match read_script(path).and_then(|text| {
            let report = run_script(path, &text, options)?;
            Ok((text, report))
        }) {
            Ok(report) => report,
            Err(err) => {
                emit_script_error(&err);
                failures += 1;
                continue;
            }
        };
        let (text, report) = report;
        info!(
            path = %path.display(),
            checks = report.outcomes.len(),
            passed = report.passed(),
            "script finished"
        );
        passed += report.passed();
        for failure in report.failures() {
            failures += 1;
            eprintln!(
                "test name:{} path:{} status:failed\n  {}",
                failure.name,
                path.display(),
                failure.detail
            );
            emit_check_failure(path, &text, failure);
        }
    }

    if failures > 0 {
        Err(format!(
            "test result: FAILED. {passed} passed; {failures} failed"
        ))
    } else {
        println!("test result: ok. {passed} passed");
        Ok(())
    }
}

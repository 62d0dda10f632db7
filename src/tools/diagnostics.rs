use crate::{
    language::{compiler::CodegenError, errors::SyntaxError, span::Span},
    project::ManifestError,
    tools::tester::{CheckOutcome, ScriptError},
};
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(wasp::syntax))]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl SyntaxDiagnostic {
    pub fn from_error(src: NamedSource<String>, err: SyntaxError) -> Self {
        Self {
            src,
            span: err.to_source_span(),
            help: err.help.clone(),
            message: err.message.clone(),
            label: err.label,
        }
    }
}

pub fn emit_syntax_errors(path: &Path, source: &str, errors: &[SyntaxError]) {
    let src = NamedSource::new(path.display().to_string(), source.to_string());
    for err in errors {
        let diagnostic = SyntaxDiagnostic::from_error(src.clone(), err.clone());
        eprintln!("{:?}", Report::new(diagnostic));
    }
}

/// Code generation failure, pointed at the assertion being lowered.
#[derive(Debug, Error, Diagnostic)]
#[error("internal compiler error while generating `{name}`")]
#[diagnostic(
    code(wasp::internal),
    help("the script parsed, but no check function could be built for it")
)]
pub struct CodegenDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("in this assertion")]
    span: SourceSpan,
    name: String,
    #[source]
    #[diagnostic_source]
    error: CodegenError,
}

pub fn emit_codegen_error(path: &Path, source: &str, name: &str, span: Span, error: CodegenError) {
    let diagnostic = CodegenDiagnostic {
        src: NamedSource::new(path.display().to_string(), source.to_string()),
        span: span.into(),
        name: name.to_string(),
        error,
    };
    eprintln!("{:?}", Report::new(diagnostic));
}

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{name} failed")]
#[diagnostic(code(wasp::check))]
pub struct CheckDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{detail}")]
    span: SourceSpan,
    name: String,
    detail: String,
}

pub fn emit_check_failure(path: &Path, source: &str, failure: &CheckOutcome) {
    let diagnostic = CheckDiagnostic {
        src: NamedSource::new(path.display().to_string(), source.to_string()),
        span: failure.span.into(),
        name: failure.name.clone(),
        detail: failure.detail.clone(),
    };
    eprintln!("{:?}", Report::new(diagnostic));
}

pub fn emit_script_error(error: &ScriptError) {
    match error {
        ScriptError::Io { path, error } => report_io_error(path, error),
        ScriptError::Syntax { path, text, errors } => {
            emit_syntax_errors(path, text, &errors.errors)
        }
        ScriptError::Codegen {
            path,
            text,
            name,
            span,
            error,
        } => emit_codegen_error(path, text, name, *span, error.clone()),
    }
}

pub fn report_manifest_error(error: &ManifestError) {
    eprintln!("{:?}", Report::msg(error.to_string()));
}

pub fn report_io_error(path: &Path, error: &std::io::Error) {
    eprintln!("Failed to access {}: {}", path.display(), error);
}

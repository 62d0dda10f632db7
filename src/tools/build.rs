use crate::{
    language::compiler::{llvm::LlvmBuilder, CodegenError},
    project::WaspManifest,
    target::BuildTarget,
    tools::tester::{generate_script, ScriptError},
};
use inkwell::context::Context;
use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("generated module failed verification")]
    #[diagnostic(code(wasp::build::verify))]
    Verify(#[source] CodegenError),
    #[error("failed to write {}", path.display())]
    #[diagnostic(code(wasp::build::write))]
    Write {
        path: PathBuf,
        #[source]
        error: CodegenError,
    },
}

pub struct BuildOptions<'a> {
    pub manifest: &'a WaspManifest,
    pub target: BuildTarget,
    pub output: Option<PathBuf>,
}

impl BuildOptions<'_> {
    /// `-o`, then `build.output`, then the script path with an `.ll` extension.
    pub fn output_for(&self, script: &Path) -> PathBuf {
        self.output
            .clone()
            .or_else(|| self.manifest.output_path())
            .unwrap_or_else(|| script.with_extension("ll"))
    }
}

/// Lowers every assertion of the script into one LLVM module and writes it as
/// textual IR. Returns the path written.
pub fn build_script(
    path: &Path,
    text: &str,
    options: &BuildOptions<'_>,
) -> Result<PathBuf, BuildError> {
    let context = Context::create();
    let mut builder = LlvmBuilder::new(&context, options.manifest, &options.target);
    let (_, checks) = generate_script(path, text, &mut builder)?;
    builder.verify().map_err(BuildError::Verify)?;

    let output = options.output_for(path);
    builder
        .write_ir(&output)
        .map_err(|error| BuildError::Write {
            path: output.clone(),
            error,
        })?;
    info!(
        script = %path.display(),
        output = %output.display(),
        checks = checks.len(),
        target = options.target.triple().unwrap_or("host"),
        "wrote LLVM module"
    );
    Ok(output)
}

use clap::Parser;
use std::{path::Path, process::ExitCode};
use tracing_subscriber::EnvFilter;
use wasp::{
    cli::{Cli, Commands},
    project::WaspManifest,
    tools::{
        diagnostics::{emit_script_error, report_manifest_error},
        tester::{dump_script, read_script, run_tests, TestOptions},
    },
};

fn main() -> ExitCode {
    if let Ok(filter) = EnvFilter::try_from_env("WASP_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("tracing initialized");
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::Test { paths, filter } => match run_tests(&paths, &TestOptions { filter }) {
            Ok(()) => ExitCode::SUCCESS,
            Err(summary) => {
                eprintln!("{summary}");
                ExitCode::FAILURE
            }
        },
        Commands::Dump { file, ir } => {
            match read_script(&file).and_then(|text| dump_script(&file, &text, ir)) {
                Ok(out) => {
                    print!("{out}");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    emit_script_error(&err);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Build {
            file,
            output,
            target,
        } => build(&file, output, target, cli.config.as_deref()),
    }
}

#[cfg(feature = "llvm")]
fn build(
    file: &Path,
    output: Option<std::path::PathBuf>,
    target: Option<String>,
    config: Option<&Path>,
) -> ExitCode {
    use wasp::{
        target::BuildTarget,
        tools::build::{build_script, BuildError, BuildOptions},
    };

    let manifest = match WaspManifest::resolve(config, Some(file)) {
        Ok(manifest) => manifest,
        Err(err) => {
            report_manifest_error(&err);
            return ExitCode::FAILURE;
        }
    };
    let options = BuildOptions {
        target: BuildTarget::resolve(target, &manifest),
        manifest: &manifest,
        output,
    };
    let result = read_script(file)
        .map_err(BuildError::from)
        .and_then(|text| build_script(file, &text, &options));
    match result {
        Ok(written) => {
            println!("wrote {}", written.display());
            ExitCode::SUCCESS
        }
        Err(BuildError::Script(err)) => {
            emit_script_error(&err);
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(feature = "llvm"))]
fn build(
    file: &Path,
    _output: Option<std::path::PathBuf>,
    _target: Option<String>,
    config: Option<&Path>,
) -> ExitCode {
    if let Err(err) = WaspManifest::resolve(config, Some(file)) {
        report_manifest_error(&err);
        return ExitCode::FAILURE;
    }
    eprintln!("error: {}", wasp::tools::LLVM_UNAVAILABLE);
    ExitCode::FAILURE
}

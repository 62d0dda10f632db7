use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Assertion compiler for WebAssembly numeric conversions
#[derive(Parser)]
#[command(name = "wasp")]
#[command(version)]
#[command(about = "Compile and check .wast numeric assertions", long_about = None)]
pub struct Cli {
    /// Manifest to use instead of the nearest wasp.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate checks with the reference backend and evaluate them
    #[command(visible_alias = "t")]
    Test {
        /// Scripts or directories of .wast scripts
        #[arg(value_name = "PATHS", required = true)]
        paths: Vec<PathBuf>,

        /// Only run checks whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Print the assertion tree of a script
    Dump {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Also print the generated reference IR
        #[arg(long)]
        ir: bool,
    },
    /// Write the checks of a script as an LLVM module
    Build {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output path for the textual IR
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Target triple; overrides WASP_TARGET and the manifest
        #[arg(long)]
        target: Option<String>,
    },
}

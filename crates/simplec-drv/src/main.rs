//! simplec - Simple language front-end CLI.
//!
//! ```text
//! simplec check <file.simple>
//! simplec emit -ir <file.simple> [--out <file.sir>]
//! ```
//!
//! Exit code 0 on success, 1 on any diagnostic.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use simplec_drv::diagnostics;

#[derive(Parser)]
#[command(
    name = "simplec",
    about = "Compiler front-end for the Simple language",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse, resolve imports, and validate without emitting.
    Check {
        /// Entry source file.
        file: PathBuf,
    },
    /// Lower to an output format. Only the textual IR lives here; SBC
    /// assembly is the downstream toolchain's job.
    Emit {
        /// Output format selector (`-ir`).
        #[arg(allow_hyphen_values = true, value_parser = ["-ir", "-sbc"])]
        mode: String,
        /// Entry source file.
        file: PathBuf,
        /// Output path; defaults to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err);
            ExitCode::FAILURE
        }
    }
}

/// Runs one subcommand; the error string is the fully rendered
/// diagnostic block.
fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Check { file } => {
            debug!(file = %file.display(), "check");
            simplec_drv::check_file(&file).map_err(|diag| diagnostics::render(&diag, &file))
        }
        Command::Emit { mode, file, out } => {
            if mode == "-sbc" {
                return Err(
                    "error[E0001]: SBC emission is handled by the bytecode assembler; use 'emit -ir'\n"
                        .to_string(),
                );
            }
            debug!(file = %file.display(), "emit -ir");
            let sir =
                simplec_drv::emit_ir_file(&file).map_err(|diag| diagnostics::render(&diag, &file))?;
            write_output(out, &sir).map_err(|err| format!("error[E0001]: {:#}\n", err))
        }
    }
}

fn write_output(out: Option<PathBuf>, sir: &str) -> Result<()> {
    match out {
        Some(path) => std::fs::write(&path, sir)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            print!("{}", sir);
            Ok(())
        }
    }
}

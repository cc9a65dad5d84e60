//! simplec-drv - Driver library.
//!
//! Wires the front-end pipeline (lex → parse → resolve imports →
//! validate → emit SIR) and renders diagnostics in the rustc-style
//! `error[E0001]` format with a source caret and help hints.

pub mod diagnostics;

use std::path::Path;

use simplec_par::Program;
use simplec_util::DiagResult;
use tracing::debug;

/// Loads and merges the program rooted at `entry`, following local
/// imports.
pub fn load_program(entry: &Path) -> DiagResult<Program> {
    debug!(file = %entry.display(), "resolving imports");
    simplec_res::load_program(entry)
}

/// `check`: everything except emission. Returns the first diagnostic.
pub fn check_file(entry: &Path) -> DiagResult<()> {
    let program = load_program(entry)?;
    debug!(decls = program.decls.len(), "validating");
    simplec_sem::validate_program(&program)
}

/// `emit -ir`: the full front-end pipeline, producing the SIR module
/// text.
pub fn emit_ir_file(entry: &Path) -> DiagResult<String> {
    let program = load_program(entry)?;
    debug!(decls = program.decls.len(), "emitting SIR");
    simplec_sir::emit_sir(&program)
}

/// Reads one source file and checks it without import resolution
/// (tooling entry point; `check` on a file with local imports should
/// use [`check_file`]).
pub fn check_source(source: &str) -> DiagResult<()> {
    simplec_sem::validate_source(source)
}

/// Convenience used by tests: full pipeline over in-memory source.
pub fn emit_ir_source(source: &str) -> DiagResult<String> {
    simplec_sir::emit_sir_source(source)
}

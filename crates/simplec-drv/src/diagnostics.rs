//! Diagnostic rendering.
//!
//! Every user-visible error prints as:
//!
//! ```text
//! error[E0001]: <message>
//!  --> <file>:<line>:<col>
//!   |
//! 3 | x : i32 = missing;
//!   |           ^
//!   = help: <hint>
//! ```
//!
//! The caret block is omitted when the diagnostic has no position or
//! the source line cannot be read. Help hints come from a fixed
//! pattern table.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use simplec_util::Diag;

/// Help hints for the most common failure classes.
fn help_for(message: &str) -> Option<&'static str> {
    if message.contains("unexpected character") {
        return Some("remove unsupported characters or escape them if inside literals");
    }
    if message.contains("unsupported import path") {
        return Some(
            "use a reserved stdlib import, a relative/absolute path, or a unique bare filename under project root",
        );
    }
    if message.contains("import not found in project root") {
        return Some("add the target .simple file under project root or use an explicit relative path");
    }
    if message.contains("ambiguous import path") {
        return Some("rename duplicate files or use an explicit relative path to disambiguate");
    }
    if message.contains("undeclared identifier") {
        return Some("declare the symbol in scope, or fix a typo in the identifier name");
    }
    if message.contains("unknown type") {
        return Some("check the spelling of the type name or declare it before use");
    }
    if message.contains("unterminated block") {
        return Some("add the missing closing '}' for this block");
    }
    if message.contains("expected") {
        return Some("check surrounding syntax near the highlighted token");
    }
    None
}

/// Splits a `path: message` prefix produced by the import resolver so
/// the caret points into the right file.
fn split_file_prefix<'m>(message: &'m str, fallback: &Path) -> (String, &'m str) {
    if let Some((before, after)) = message.split_once(": ") {
        let looks_like_path =
            before.contains('/') || before.contains('\\') || before.ends_with(".simple");
        if looks_like_path {
            return (before.to_string(), after);
        }
    }
    (fallback.display().to_string(), message)
}

fn source_line(path: &str, line: u32) -> Option<String> {
    if line == 0 {
        return None;
    }
    let text = fs::read_to_string(path).ok()?;
    text.lines().nth(line as usize - 1).map(str::to_string)
}

/// Renders one diagnostic to the `error[E0001]` block.
pub fn render(diag: &Diag, entry: &Path) -> String {
    let (file, message) = split_file_prefix(&diag.message, entry);
    let mut out = String::new();
    let _ = writeln!(out, "error[E0001]: {}", message);
    if diag.pos.is_known() {
        let _ = writeln!(out, " --> {}:{}:{}", file, diag.pos.line, diag.pos.column);
        if let Some(source) = source_line(&file, diag.pos.line) {
            let _ = writeln!(out, "  |");
            let _ = writeln!(out, "{} | {}", diag.pos.line, source);
            let mut caret = String::from("  | ");
            for _ in 1..diag.pos.column {
                caret.push(' ');
            }
            caret.push('^');
            let _ = writeln!(out, "{}", caret);
        }
    }
    if let Some(hint) = help_for(message) {
        let _ = writeln!(out, "  = help: {}", hint);
    }
    out
}

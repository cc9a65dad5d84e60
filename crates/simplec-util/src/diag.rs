//! Diagnostics.
//!
//! Every core operation either succeeds or returns exactly one [`Diag`].
//! A diagnostic renders as a single line, `line:col: message`, which is
//! the stable shape downstream tooling pattern-matches on. Diagnostics
//! without a source position render as the bare message.

use std::fmt;

use thiserror::Error;

use crate::pos::Pos;

/// Result alias used across all compiler phases.
pub type DiagResult<T> = Result<T, Diag>;

/// A single compiler diagnostic.
///
/// # Examples
///
/// ```
/// use simplec_util::{Diag, Pos};
///
/// let diag = Diag::new(Pos::new(2, 5), "undeclared identifier: foo");
/// assert_eq!(diag.to_string(), "2:5: undeclared identifier: foo");
///
/// let bare = Diag::message("cyclic import detected: /a.simple");
/// assert_eq!(bare.to_string(), "cyclic import detected: /a.simple");
/// ```
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub struct Diag {
    /// Location of the offending token or AST node.
    pub pos: Pos,
    /// Human-readable message without the position prefix.
    pub message: String,
}

impl Diag {
    pub fn new(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }

    /// A diagnostic with no source position.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(Pos::NONE, message)
    }

    /// Wraps the message with a context prefix, keeping the position.
    ///
    /// Used by the validator and emitter as they unwind:
    /// `in function 'main': <message>`.
    pub fn in_context(mut self, context: &str) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }
}

impl fmt::Display for Diag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pos.is_known() {
            write!(f, "{}:{}: {}", self.pos.line, self.pos.column, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diag_renders_position_prefix() {
        let diag = Diag::new(Pos::new(3, 14), "unknown type: Foo");
        assert_eq!(diag.to_string(), "3:14: unknown type: Foo");
    }

    #[test]
    fn test_diag_without_position_renders_bare() {
        let diag = Diag::message("import not found in project root: util");
        assert_eq!(diag.to_string(), "import not found in project root: util");
    }

    #[test]
    fn test_diag_in_context_keeps_position() {
        let diag = Diag::new(Pos::new(1, 2), "return type mismatch").in_context("in function 'foo'");
        assert_eq!(diag.to_string(), "1:2: in function 'foo': return type mismatch");
    }
}

//! Lexical scopes for function bodies.

use rustc_hash::FxHashMap;
use simplec_par::{Mutability, TypeRef};
use simplec_util::{Diag, DiagResult, Pos};

/// What the validator knows about one local binding.
#[derive(Clone, Debug)]
pub struct LocalInfo {
    pub ty: TypeRef,
    pub mutability: Mutability,
    /// Manifest module name when the local was bound by
    /// `Core.DL.open(path, Manifest)`.
    pub dl_module: Option<String>,
}

impl LocalInfo {
    pub fn new(ty: TypeRef, mutability: Mutability) -> Self {
        Self {
            ty,
            mutability,
            dl_module: None,
        }
    }
}

/// A stack of lexical scopes. Inner scopes shadow outer ones; a name
/// may not be declared twice within a single scope.
#[derive(Debug, Default)]
pub struct Scopes {
    stack: Vec<FxHashMap<String, LocalInfo>>,
}

impl Scopes {
    pub fn new() -> Self {
        Self {
            stack: vec![FxHashMap::default()],
        }
    }

    pub fn push(&mut self) {
        self.stack.push(FxHashMap::default());
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    /// Innermost-first lookup.
    pub fn find(&self, name: &str) -> Option<&LocalInfo> {
        self.stack.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut LocalInfo> {
        self.stack
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
    }

    /// Adds a binding to the innermost scope; duplicates within that
    /// scope are an error (shadowing an outer scope is fine).
    pub fn add(&mut self, name: &str, info: LocalInfo, pos: Pos) -> DiagResult<()> {
        if self.stack.is_empty() {
            self.stack.push(FxHashMap::default());
        }
        let Some(current) = self.stack.last_mut() else {
            return Err(Diag::new(pos, "internal scope stack underflow"));
        };
        if current.contains_key(name) {
            return Err(Diag::new(
                pos,
                format!("duplicate local declaration: {}", name),
            ));
        }
        current.insert(name.to_string(), info);
        Ok(())
    }
}

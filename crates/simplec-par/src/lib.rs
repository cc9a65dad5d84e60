//! simplec-par - Recursive-descent parser for the Simple language.
//!
//! The parser consumes the token sequence produced by `simplec-lex` and
//! builds a [`Program`]: top-level declarations plus top-level script
//! statements. Expressions use precedence climbing (see `expr`);
//! declarations and statements are hand-written recursive descent.
//!
//! Statements terminate at `;` or at a newline that ends a complete
//! statement. Inside a block the parser recovers at the next statement
//! boundary and keeps going, still reporting the first error; outside a
//! block the first error is fatal.

pub mod ast;
mod expr;
mod items;
mod stmt;
mod types;

pub use ast::*;

use simplec_lex::{lex, Token, TokenKind};
use simplec_util::{Diag, DiagResult, Pos};

/// Parses a full source file.
///
/// # Examples
///
/// ```
/// use simplec_par::{parse_program_str, Decl};
///
/// let program = parse_program_str("add : i32 (a : i32, b : i32) { return a + b; }").unwrap();
/// assert!(matches!(program.decls[0], Decl::Function(_)));
/// ```
pub fn parse_program_str(source: &str) -> DiagResult<Program> {
    let tokens = lex(source)?;
    Parser::new(tokens).parse_program()
}

/// Parses a type annotation in isolation (tests and tooling).
pub fn parse_type_str(source: &str) -> DiagResult<TypeRef> {
    let tokens = lex(source)?;
    let mut parser = Parser::new(tokens);
    let ty = parser.parse_type()?;
    if !parser.check(TokenKind::End) {
        return Err(parser.error_here("unexpected trailing tokens after type"));
    }
    Ok(ty)
}

/// Re-parses captured function-literal body tokens into statements.
///
/// The tokens are the literal's body without the surrounding braces,
/// exactly as captured at parse time.
pub fn parse_block_tokens(mut tokens: Vec<Token>) -> DiagResult<Vec<Stmt>> {
    let end_pos = tokens.last().map(|t| t.pos).unwrap_or(Pos::new(1, 1));
    tokens.push(Token::new(TokenKind::RBrace, end_pos));
    tokens.push(Token::new(TokenKind::End, end_pos));
    let mut parser = Parser::new(tokens);
    let body = parser.parse_block_body(end_pos)?;
    parser.take_deferred_error().map_or(Ok(body), Err)
}

/// The parser over one token sequence.
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    /// First error hit inside a block; recovery continues past it.
    deferred_error: Option<Diag>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            index: 0,
            deferred_error: None,
        }
    }

    /// Parses the whole program. Returns the first error even when
    /// block-level recovery consumed the rest of the input.
    pub fn parse_program(&mut self) -> DiagResult<Program> {
        let mut program = Program::default();
        while !self.check(TokenKind::End) {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            self.parse_top_level_item(&mut program)?;
        }
        match self.take_deferred_error() {
            Some(diag) => Err(diag),
            None => Ok(program),
        }
    }

    fn parse_top_level_item(&mut self, program: &mut Program) -> DiagResult<()> {
        match self.current().kind {
            TokenKind::KwImport => {
                let decl = self.parse_import()?;
                program.decls.push(Decl::Import(decl));
                self.expect_statement_end()?;
            }
            TokenKind::KwExtern => {
                let decl = self.parse_extern()?;
                program.decls.push(Decl::Extern(decl));
                self.expect_statement_end()?;
            }
            TokenKind::KwFn => {
                let decl = self.parse_fn_keyword_decl()?;
                program.decls.push(Decl::Function(decl));
            }
            TokenKind::Identifier if self.is_decl_start() => {
                let decl = self.parse_named_decl()?;
                let needs_end = matches!(decl, Decl::Variable(_));
                program.decls.push(decl);
                if needs_end {
                    self.expect_statement_end()?;
                }
            }
            _ => {
                let stmt = self.parse_stmt()?;
                let ends_with_brace = matches!(
                    stmt,
                    Stmt::If(_) | Stmt::IfChain(_) | Stmt::While(_) | Stmt::For(_)
                );
                program.top_level_stmts.push(stmt);
                if !ends_with_brace {
                    self.expect_statement_end()?;
                }
            }
        }
        Ok(())
    }

    /// Whether the tokens at the cursor open a named declaration:
    /// `name :` / `name ::` / `name<T, ...> :`.
    fn is_decl_start(&self) -> bool {
        match self.peek(1).kind {
            TokenKind::Colon | TokenKind::DoubleColon => true,
            TokenKind::Lt => self.is_generic_decl_start(),
            _ => false,
        }
    }

    /// Lookahead for `name<T, U, ...> :` / `:: artifact`.
    fn is_generic_decl_start(&self) -> bool {
        let mut i = self.index + 2;
        loop {
            if self.kind_at(i) != TokenKind::Identifier {
                return false;
            }
            i += 1;
            match self.kind_at(i) {
                TokenKind::Comma => i += 1,
                TokenKind::Gt => break,
                _ => return false,
            }
        }
        matches!(
            self.kind_at(i + 1),
            TokenKind::Colon | TokenKind::DoubleColon
        )
    }

    /// Parses a declaration that begins with an identifier:
    /// type declarations (`Name :: artifact/module/enum`), functions,
    /// and variables, with optional generic parameters.
    fn parse_named_decl(&mut self) -> DiagResult<Decl> {
        let name_tok = self.advance();
        let generics = if self.check(TokenKind::Lt) {
            self.parse_generics()?
        } else {
            Vec::new()
        };

        if self.check(TokenKind::DoubleColon) {
            match self.type_decl_keyword(self.peek(1)) {
                Some(TypeDeclKind::Artifact) => {
                    self.advance();
                    self.advance();
                    return self
                        .parse_artifact_decl(name_tok, generics)
                        .map(Decl::Artifact);
                }
                Some(TypeDeclKind::Module) => {
                    self.advance();
                    self.advance();
                    return self.parse_module_decl(name_tok).map(Decl::Module);
                }
                Some(TypeDeclKind::Enum) => {
                    self.advance();
                    self.advance();
                    return self.parse_enum_decl(name_tok).map(Decl::Enum);
                }
                None => {}
            }
        }

        match self.parse_binding(name_tok, generics)? {
            Binding::Function(decl) => Ok(Decl::Function(decl)),
            Binding::Variable(decl) => Ok(Decl::Variable(decl)),
        }
    }

    fn type_decl_keyword(&self, tok: &Token) -> Option<TypeDeclKind> {
        match tok.kind {
            TokenKind::KwArtifact => Some(TypeDeclKind::Artifact),
            TokenKind::KwModule => Some(TypeDeclKind::Module),
            TokenKind::KwEnum => Some(TypeDeclKind::Enum),
            TokenKind::Identifier => match tok.text.as_str() {
                "Artifact" => Some(TypeDeclKind::Artifact),
                "Module" => Some(TypeDeclKind::Module),
                "Enum" => Some(TypeDeclKind::Enum),
                _ => None,
            },
            _ => None,
        }
    }

    /// Parses `name : Type ...` / `name :: Type ...` after the name
    /// (and any generics) were consumed: a function when a parameter
    /// list follows the type, otherwise a variable binding.
    pub(crate) fn parse_binding(
        &mut self,
        name_tok: Token,
        generics: Vec<String>,
    ) -> DiagResult<Binding> {
        let mutability = if self.eat(TokenKind::DoubleColon) {
            Mutability::Immutable
        } else if self.eat(TokenKind::Colon) {
            Mutability::Mutable
        } else {
            return Err(self.error_here("expected ':' or '::' in declaration"));
        };

        let ty = self.parse_type()?;

        if self.check(TokenKind::LParen) {
            let params = self.parse_param_list()?;
            let open_pos = self.current().pos;
            if !self.eat(TokenKind::LBrace) {
                return Err(self.error_here("expected '{' to open function body"));
            }
            let body = self.parse_block_body(open_pos)?;
            return Ok(Binding::Function(FuncDecl {
                name: name_tok.text,
                generics,
                params,
                return_type: ty,
                return_mutability: mutability,
                body,
                pos: name_tok.pos,
            }));
        }

        if !generics.is_empty() {
            return Err(Diag::new(
                name_tok.pos,
                "generic parameters are only valid on functions and artifacts",
            ));
        }

        let init = if self.eat(TokenKind::Assign) {
            if ty.is_fn_shorthand() && !self.check(TokenKind::LParen) {
                Some(self.parse_fn_shorthand_literal()?)
            } else {
                Some(self.parse_expr()?)
            }
        } else {
            None
        };

        Ok(Binding::Variable(VarDecl {
            name: name_tok.text,
            ty,
            mutability,
            init,
            pos: name_tok.pos,
        }))
    }

    /// Legacy form: `fn name :: Ret (params) { body }`.
    fn parse_fn_keyword_decl(&mut self) -> DiagResult<FuncDecl> {
        self.advance(); // fn
        let name_tok = self.expect_identifier("function name")?;
        let generics = if self.check(TokenKind::Lt) {
            self.parse_generics()?
        } else {
            Vec::new()
        };
        match self.parse_binding(name_tok, generics)? {
            Binding::Function(decl) => Ok(decl),
            Binding::Variable(var) => Err(Diag::new(
                var.pos,
                "expected parameter list in function declaration",
            )),
        }
    }

    // =========================================================================
    // Token plumbing
    // =========================================================================

    pub(crate) fn current(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek(&self, offset: usize) -> &Token {
        let i = (self.index + offset).min(self.tokens.len() - 1);
        &self.tokens[i]
    }

    fn kind_at(&self, i: usize) -> TokenKind {
        self.tokens
            .get(i)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::End)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
        tok
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, context: &str) -> DiagResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!("expected '{}' {}", kind.display(), context)))
        }
    }

    /// Expects an identifier; a reserved keyword here is the dedicated
    /// "keyword cannot be used as identifier" diagnostic.
    pub(crate) fn expect_identifier(&mut self, what: &str) -> DiagResult<Token> {
        if self.check(TokenKind::Identifier) {
            return Ok(self.advance());
        }
        if self.current().kind.is_keyword() {
            return Err(self.error_here(format!(
                "keyword '{}' cannot be used as identifier",
                self.current().kind.display()
            )));
        }
        Err(self.error_here(format!("expected {}", what)))
    }

    /// Line of the most recently consumed token.
    pub(crate) fn prev_line(&self) -> u32 {
        if self.index == 0 {
            return 0;
        }
        self.tokens[self.index - 1].pos.line
    }

    /// Enforces the semicolon policy after a statement-like item.
    pub(crate) fn expect_statement_end(&mut self) -> DiagResult<()> {
        if self.eat(TokenKind::Semicolon) {
            return Ok(());
        }
        if self.check(TokenKind::RBrace) || self.check(TokenKind::End) {
            return Ok(());
        }
        if self.current().pos.line > self.prev_line() {
            return Ok(());
        }
        Err(self.error_here("expected ';'"))
    }

    pub(crate) fn error_here(&self, message: impl Into<String>) -> Diag {
        Diag::new(self.current().pos, message)
    }

    pub(crate) fn record_error(&mut self, diag: Diag) {
        if self.deferred_error.is_none() {
            self.deferred_error = Some(diag);
        }
    }

    pub(crate) fn take_deferred_error(&mut self) -> Option<Diag> {
        self.deferred_error.take()
    }
}

enum TypeDeclKind {
    Artifact,
    Module,
    Enum,
}

/// Outcome of a `name : ...` binding: function or variable.
pub(crate) enum Binding {
    Function(FuncDecl),
    Variable(VarDecl),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_func_decl() {
        let program = parse_program_str("add : i32 (a : i32, b :: i32) { return a + b; }").unwrap();
        assert_eq!(program.decls.len(), 1);
        let Decl::Function(func) = &program.decls[0] else {
            panic!("expected function");
        };
        assert_eq!(func.name, "add");
        assert_eq!(func.return_type.name, "i32");
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.params[0].name, "a");
        assert_eq!(func.params[0].mutability, Mutability::Mutable);
        assert_eq!(func.params[1].mutability, Mutability::Immutable);
    }

    #[test]
    fn test_parses_fn_keyword_decl() {
        let program = parse_program_str("fn main :: void () { return; }").unwrap();
        let Decl::Function(func) = &program.decls[0] else {
            panic!("expected function");
        };
        assert_eq!(func.name, "main");
        assert_eq!(func.return_type.name, "void");
        assert_eq!(func.return_mutability, Mutability::Immutable);
        assert!(matches!(func.body[0], Stmt::Return(ReturnStmt { value: None, .. })));
    }

    #[test]
    fn test_parses_var_decl() {
        let program = parse_program_str("count :: i32 = 42;").unwrap();
        let Decl::Variable(var) = &program.decls[0] else {
            panic!("expected variable");
        };
        assert_eq!(var.name, "count");
        assert_eq!(var.mutability, Mutability::Immutable);
        assert!(var.init.is_some());
    }

    #[test]
    fn test_parses_var_decl_no_init() {
        let program = parse_program_str("count :: i32;").unwrap();
        let Decl::Variable(var) = &program.decls[0] else {
            panic!("expected variable");
        };
        assert!(var.init.is_none());
    }

    #[test]
    fn test_generic_function_decl() {
        let program = parse_program_str("id<T> : T (v : T) { return v; }").unwrap();
        let Decl::Function(func) = &program.decls[0] else {
            panic!("expected function");
        };
        assert_eq!(func.generics, vec!["T"]);
        assert_eq!(func.return_type.name, "T");
    }

    #[test]
    fn test_top_level_script_statements() {
        let program = parse_program_str(
            "add : i32 (a : i32, b : i32) { return a + b; }\nx : i32 = add(40, 2);\nx = x + 1;\n",
        )
        .unwrap();
        assert_eq!(program.decls.len(), 2);
        assert_eq!(program.top_level_stmts.len(), 1);
        assert!(matches!(program.top_level_stmts[0], Stmt::Assign(_)));
    }

    #[test]
    fn test_missing_semicolon_same_line() {
        let err = parse_program_str("main : void () { x : i32 = 1 y : i32 = 2 }").unwrap_err();
        assert!(err.message.contains("expected ';'"), "{}", err.message);
    }

    #[test]
    fn test_reserved_keyword_parameter_hint() {
        let err = parse_program_str("f : void (artifact: i32) { return; }").unwrap_err();
        assert!(
            err.message
                .contains("keyword 'artifact' cannot be used as identifier"),
            "{}",
            err.message
        );
    }

    #[test]
    fn test_recovers_inside_block() {
        // The first statement is garbage; the parser recovers at the
        // statement boundary but still reports the first error.
        let err = parse_program_str("main : void () { +; x : i32 = 1; }").unwrap_err();
        assert_eq!(err.pos.line, 1);
        assert!(err.pos.column > 0);
    }

    #[test]
    fn test_error_outside_block_is_fatal() {
        let err = parse_program_str("main : ] () { }").unwrap_err();
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_unterminated_block() {
        let err = parse_program_str("main : void () { x : i32 = 1;").unwrap_err();
        assert!(err.message.contains("unterminated block"), "{}", err.message);
    }

    #[test]
    fn test_parse_errors_carry_position() {
        let err = parse_program_str("main : void () {\n  x : = 1;\n}").unwrap_err();
        assert_eq!(err.pos.line, 2);
    }
}

//! Statement and block parsing.
//!
//! Blocks recover from parse errors at statement boundaries: the first
//! error is recorded, tokens are skipped to the next `;`, line break,
//! or `}`, and parsing continues so later declarations still land in
//! the AST. The recorded error is surfaced once the program finishes.

use simplec_lex::TokenKind;
use simplec_util::{DiagResult, Pos};

use crate::ast::*;
use crate::expr::assign_op_for;
use crate::{Binding, Parser};

impl Parser {
    /// Parses statements until the closing `}` of a block whose `{`
    /// was already consumed.
    pub(crate) fn parse_block_body(&mut self, open_pos: Pos) -> DiagResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            if self.eat(TokenKind::RBrace) {
                return Ok(stmts);
            }
            if self.check(TokenKind::End) {
                return Err(simplec_util::Diag::new(open_pos, "unterminated block"));
            }
            match self.parse_stmt_with_end() {
                Ok(stmt) => stmts.push(stmt),
                Err(diag) => {
                    self.record_error(diag);
                    self.synchronize();
                }
            }
        }
    }

    /// Skips to the next statement boundary after a parse error.
    fn synchronize(&mut self) {
        let error_line = self.current().pos.line;
        loop {
            match self.current().kind {
                TokenKind::End | TokenKind::RBrace => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                _ => {
                    if self.current().pos.line > error_line {
                        return;
                    }
                    self.advance();
                }
            }
        }
    }

    fn parse_stmt_with_end(&mut self) -> DiagResult<Stmt> {
        let stmt = self.parse_stmt()?;
        let ends_with_brace = matches!(
            stmt,
            Stmt::If(_) | Stmt::IfChain(_) | Stmt::While(_) | Stmt::For(_)
        );
        if !ends_with_brace {
            self.expect_statement_end()?;
        }
        Ok(stmt)
    }

    /// Parses a single statement; the separator is the caller's job.
    pub(crate) fn parse_stmt(&mut self) -> DiagResult<Stmt> {
        match self.current().kind {
            TokenKind::KwReturn => self.parse_return_stmt(),
            TokenKind::KwIf => self.parse_if_stmt(),
            TokenKind::PipeGreater => self.parse_if_chain(),
            TokenKind::KwWhile => self.parse_while_stmt(),
            TokenKind::KwFor => self.parse_for_stmt(),
            TokenKind::KwBreak => {
                let pos = self.advance().pos;
                Ok(Stmt::Break(pos))
            }
            TokenKind::KwSkip => {
                let pos = self.advance().pos;
                Ok(Stmt::Skip(pos))
            }
            TokenKind::Identifier
                if matches!(
                    self.peek(1).kind,
                    TokenKind::Colon | TokenKind::DoubleColon
                ) =>
            {
                let name_tok = self.advance();
                match self.parse_binding(name_tok, Vec::new())? {
                    Binding::Variable(var) => Ok(Stmt::VarDecl(var)),
                    Binding::Function(func) => Err(simplec_util::Diag::new(
                        func.pos,
                        "function declarations are not allowed inside blocks",
                    )),
                }
            }
            _ => self.parse_expr_or_assign_stmt(),
        }
    }

    /// Expression statement, or an assignment statement when an
    /// assignment operator follows the parsed target.
    fn parse_expr_or_assign_stmt(&mut self) -> DiagResult<Stmt> {
        let expr = self.parse_expr_no_assign()?;
        if let Some(op) = assign_op_for(self.current().kind) {
            let pos = self.current().pos;
            self.advance();
            let value = self.parse_expr()?;
            return Ok(Stmt::Assign(AssignStmt {
                target: expr,
                op,
                value,
                pos,
            }));
        }
        Ok(Stmt::Expr(expr))
    }

    fn parse_return_stmt(&mut self) -> DiagResult<Stmt> {
        let ret_tok = self.advance();
        let has_value = !matches!(
            self.current().kind,
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::End
        ) && self.current().pos.line == ret_tok.pos.line;
        let value = if has_value {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Stmt::Return(ReturnStmt {
            value,
            pos: ret_tok.pos,
        }))
    }

    fn parse_if_stmt(&mut self) -> DiagResult<Stmt> {
        let if_tok = self.advance();
        let cond = self.parse_expr_no_assign()?;
        let open_pos = self.current().pos;
        if !self.eat(TokenKind::LBrace) {
            return Err(self.error_here("expected '{' after if condition"));
        }
        let then_body = self.parse_block_body(open_pos)?;

        let mut else_body = Vec::new();
        if self.eat(TokenKind::KwElse) {
            if self.check(TokenKind::KwIf) {
                else_body.push(self.parse_if_stmt()?);
            } else {
                let open_pos = self.current().pos;
                if !self.eat(TokenKind::LBrace) {
                    return Err(self.error_here("expected '{' after else"));
                }
                else_body = self.parse_block_body(open_pos)?;
            }
        }

        Ok(Stmt::If(IfStmt {
            cond,
            then_body,
            else_body,
            pos: if_tok.pos,
        }))
    }

    /// `|> cond { } |> cond { } |> default { }`.
    fn parse_if_chain(&mut self) -> DiagResult<Stmt> {
        let first = self.current().pos;
        let mut branches = Vec::new();
        let mut else_body = Vec::new();
        while self.check(TokenKind::PipeGreater) {
            self.advance();
            if self.check(TokenKind::Identifier) && self.current().text == "default" {
                self.advance();
                let open_pos = self.current().pos;
                if !self.eat(TokenKind::LBrace) {
                    return Err(self.error_here("expected '{' after default branch"));
                }
                else_body = self.parse_block_body(open_pos)?;
                break;
            }
            let cond = self.parse_expr_no_assign()?;
            let open_pos = self.current().pos;
            if !self.eat(TokenKind::LBrace) {
                return Err(self.error_here("expected '{' after branch condition"));
            }
            let body = self.parse_block_body(open_pos)?;
            branches.push((cond, body));
        }
        Ok(Stmt::IfChain(IfChainStmt {
            branches,
            else_body,
            pos: first,
        }))
    }

    fn parse_while_stmt(&mut self) -> DiagResult<Stmt> {
        let while_tok = self.advance();
        let cond = self.parse_expr_no_assign()?;
        let open_pos = self.current().pos;
        if !self.eat(TokenKind::LBrace) {
            return Err(self.error_here("expected '{' after while condition"));
        }
        let body = self.parse_block_body(open_pos)?;
        Ok(Stmt::While(WhileStmt {
            cond,
            body,
            pos: while_tok.pos,
        }))
    }

    /// `for init; cond; step { }` and the range forms
    /// `for i [: T] [= e]; a..b { }`.
    fn parse_for_stmt(&mut self) -> DiagResult<Stmt> {
        let for_tok = self.advance();

        let mut var_decl: Option<VarDecl> = None;
        let mut init: Option<Expr> = None;

        if self.check(TokenKind::Identifier)
            && matches!(
                self.peek(1).kind,
                TokenKind::Colon | TokenKind::DoubleColon | TokenKind::Semicolon
            )
        {
            let name_tok = self.advance();
            let (mutability, ty) = if self.eat(TokenKind::DoubleColon) {
                (Mutability::Immutable, self.parse_type()?)
            } else if self.eat(TokenKind::Colon) {
                (Mutability::Mutable, self.parse_type()?)
            } else {
                // `for i; 0..10` - the loop variable defaults to i32.
                (Mutability::Mutable, TypeRef::named("i32"))
            };
            let decl_init = if self.eat(TokenKind::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            var_decl = Some(VarDecl {
                name: name_tok.text,
                ty,
                mutability,
                init: decl_init,
                pos: name_tok.pos,
            });
        } else {
            init = Some(self.parse_expr()?);
        }

        self.expect(TokenKind::Semicolon, "after for-loop init")?;

        let first = self.parse_expr_no_assign()?;
        let (cond, step) = if self.check(TokenKind::DotDot) {
            self.advance();
            let range_pos = self.current().pos;
            let end = self.parse_expr_no_assign()?;
            let Some(decl) = var_decl.as_mut() else {
                return Err(simplec_util::Diag::new(
                    for_tok.pos,
                    "for-range requires a loop variable declaration",
                ));
            };
            if decl.init.is_none() {
                decl.init = Some(first);
            }
            let var_ident = |pos| {
                Expr::Identifier(IdentExpr {
                    name: decl.name.clone(),
                    pos,
                })
            };
            let cond = Expr::Binary(Box::new(BinaryExpr {
                op: BinOp::Le,
                lhs: var_ident(range_pos),
                rhs: end,
                pos: range_pos,
            }));
            let step = Expr::Unary(Box::new(UnaryExpr {
                op: UnOp::PostInc,
                operand: var_ident(range_pos),
                pos: range_pos,
            }));
            (cond, step)
        } else {
            self.expect(TokenKind::Semicolon, "after for-loop condition")?;
            let step = self.parse_expr()?;
            (first, step)
        };

        let open_pos = self.current().pos;
        if !self.eat(TokenKind::LBrace) {
            return Err(self.error_here("expected '{' to open for-loop body"));
        }
        let body = self.parse_block_body(open_pos)?;

        Ok(Stmt::For(Box::new(ForStmt {
            var_decl,
            init,
            cond,
            step,
            body,
            pos: for_tok.pos,
        })))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parse_program_str;

    fn body_of(source: &str) -> Vec<Stmt> {
        let program = parse_program_str(source).unwrap();
        let Decl::Function(func) = &program.decls[0] else {
            panic!("expected function");
        };
        func.body.clone()
    }

    #[test]
    fn test_parses_if_else() {
        let body = body_of("main : i32 () { if x < 1 { return 1; } else { return 2; } }");
        let Stmt::If(stmt) = &body[0] else {
            panic!("expected if");
        };
        assert_eq!(stmt.then_body.len(), 1);
        assert_eq!(stmt.else_body.len(), 1);
    }

    #[test]
    fn test_parses_nested_if_else_in_else() {
        let body = body_of(
            "main : i32 () { if false { return 0; } else { if true { return 1; } else { return 2; } } }",
        );
        let Stmt::If(stmt) = &body[0] else {
            panic!("expected if");
        };
        assert_eq!(stmt.else_body.len(), 1);
        assert!(matches!(stmt.else_body[0], Stmt::If(_)));
    }

    #[test]
    fn test_parses_else_if_chain_as_nested_if() {
        let body = body_of("main : i32 () { if a { return 1; } else if b { return 2; } else { return 3; } }");
        let Stmt::If(stmt) = &body[0] else {
            panic!("expected if");
        };
        let Stmt::If(inner) = &stmt.else_body[0] else {
            panic!("expected nested if in else");
        };
        assert_eq!(inner.else_body.len(), 1);
    }

    #[test]
    fn test_parses_if_chain() {
        let body = body_of("main : i32 () { |> true { return 1; } |> default { return 2; } }");
        let Stmt::IfChain(chain) = &body[0] else {
            panic!("expected if chain");
        };
        assert_eq!(chain.branches.len(), 1);
        assert_eq!(chain.else_body.len(), 1);
    }

    #[test]
    fn test_parses_while_with_break_and_skip() {
        let body = body_of("main : void () { while true { break; skip; } }");
        let Stmt::While(stmt) = &body[0] else {
            panic!("expected while");
        };
        assert!(matches!(stmt.body[0], Stmt::Break(_)));
        assert!(matches!(stmt.body[1], Stmt::Skip(_)));
    }

    #[test]
    fn test_parses_classic_for_loop() {
        let body = body_of("main : void () { for i : i32 = 0; i < 10; i = i + 1 { skip; } }");
        let Stmt::For(stmt) = &body[0] else {
            panic!("expected for");
        };
        let decl = stmt.var_decl.as_ref().unwrap();
        assert_eq!(decl.name, "i");
        assert!(decl.init.is_some());
        assert!(matches!(stmt.step, Expr::Assign(_)));
    }

    #[test]
    fn test_parses_for_loop_compound_step() {
        let body = body_of(
            "main : i32 () { i : i32 = 0; for i : i32 = 0; i < 10; i += 2 { skip; } return i; }",
        );
        let Stmt::For(stmt) = &body[1] else {
            panic!("expected for at body[1]");
        };
        let Expr::Assign(step) = &stmt.step else {
            panic!("expected compound assign step");
        };
        assert_eq!(step.op, AssignOp::Add);
    }

    #[test]
    fn test_parses_for_loop_postfix_step() {
        let body = body_of("main : void () { for i : i32 = 0; i < 10; i++ { skip; } }");
        let Stmt::For(stmt) = &body[0] else {
            panic!("expected for");
        };
        assert!(matches!(&stmt.step, Expr::Unary(u) if u.op == UnOp::PostInc));
    }

    #[test]
    fn test_parses_for_range() {
        let body = body_of("main : void () { for i : i32 = 0; 0..10 { skip; } }");
        let Stmt::For(stmt) = &body[0] else {
            panic!("expected for");
        };
        assert!(stmt.var_decl.is_some());
        let Expr::Binary(cond) = &stmt.cond else {
            panic!("expected desugared condition");
        };
        assert_eq!(cond.op, BinOp::Le);
        assert!(matches!(&stmt.step, Expr::Unary(u) if u.op == UnOp::PostInc));
    }

    #[test]
    fn test_for_range_default_type() {
        let body = body_of("main : void () { for i; 0..10 { skip; } }");
        let Stmt::For(stmt) = &body[0] else {
            panic!("expected for");
        };
        let decl = stmt.var_decl.as_ref().unwrap();
        assert_eq!(decl.ty.name, "i32");
        assert!(decl.init.is_some());
    }

    #[test]
    fn test_for_range_missing_end_fails() {
        assert!(parse_program_str("main : void () { for i; 0.. { skip; } }").is_err());
    }

    #[test]
    fn test_for_missing_init_fails() {
        assert!(parse_program_str("main : void () { for ; i < 1; i++ { } }").is_err());
    }

    #[test]
    fn test_assignment_statements() {
        let body = body_of("main : i32 () { x : i32 = 1; x += 2; x = x * 3; return x; }");
        let Stmt::Assign(plus) = &body[1] else {
            panic!("expected +=");
        };
        assert_eq!(plus.op, AssignOp::Add);
        let Stmt::Assign(assign) = &body[2] else {
            panic!("expected =");
        };
        assert_eq!(assign.op, AssignOp::Assign);
    }

    #[test]
    fn test_return_without_value() {
        let body = body_of("main : void () { return; }");
        let Stmt::Return(ret) = &body[0] else {
            panic!("expected return");
        };
        assert!(ret.value.is_none());
    }

    #[test]
    fn test_local_var_decl_without_init() {
        let body = body_of("main : void () { x : i32; }");
        let Stmt::VarDecl(var) = &body[0] else {
            panic!("expected var decl");
        };
        assert_eq!(var.name, "x");
        assert!(var.init.is_none());
    }

    #[test]
    fn test_newline_separates_statements() {
        let body = body_of("main : void () {\n  x : i32 = 1\n  y : i32 = 2\n}");
        assert_eq!(body.len(), 2);
    }
}

//! Expression parsing by precedence climbing.
//!
//! Binding strength, weakest first:
//!
//! | Level | Operators |
//! |-------|-----------|
//! | 1 | `=` `+=` `-=` `*=` `/=` `%=` `&=` `\|=` `^=` `<<=` `>>=` (right-assoc) |
//! | 2 | `\|\|` |
//! | 3 | `&&` |
//! | 4 | `\|` |
//! | 5 | `^` |
//! | 6 | `&` |
//! | 7 | `==` `!=` |
//! | 8 | `<` `<=` `>` `>=` |
//! | 9 | `<<` `>>` |
//! | 10 | `+` `-` |
//! | 11 | `*` `/` `%` |
//! | 12 | prefix `-` `!` `++` `--` |
//! | 13 | postfix `++` `--`, call, index, member, explicit type args |

use simplec_lex::TokenKind;
use simplec_util::DiagResult;

use crate::ast::*;
use crate::Parser;

/// Precedence for infix binary operators; `None` ends the climb.
fn binary_precedence(kind: TokenKind) -> Option<(u8, BinOp)> {
    let entry = match kind {
        TokenKind::OrOr => (2, BinOp::LogicalOr),
        TokenKind::AndAnd => (3, BinOp::LogicalAnd),
        TokenKind::Pipe => (4, BinOp::BitOr),
        TokenKind::Caret => (5, BinOp::BitXor),
        TokenKind::Amp => (6, BinOp::BitAnd),
        TokenKind::EqEq => (7, BinOp::Eq),
        TokenKind::NotEq => (7, BinOp::Ne),
        TokenKind::Lt => (8, BinOp::Lt),
        TokenKind::LtEq => (8, BinOp::Le),
        TokenKind::Gt => (8, BinOp::Gt),
        TokenKind::GtEq => (8, BinOp::Ge),
        TokenKind::Shl => (9, BinOp::Shl),
        TokenKind::Shr => (9, BinOp::Shr),
        TokenKind::Plus => (10, BinOp::Add),
        TokenKind::Minus => (10, BinOp::Sub),
        TokenKind::Star => (11, BinOp::Mul),
        TokenKind::Slash => (11, BinOp::Div),
        TokenKind::Percent => (11, BinOp::Rem),
        _ => return None,
    };
    Some(entry)
}

pub(crate) fn assign_op_for(kind: TokenKind) -> Option<AssignOp> {
    let op = match kind {
        TokenKind::Assign => AssignOp::Assign,
        TokenKind::PlusAssign => AssignOp::Add,
        TokenKind::MinusAssign => AssignOp::Sub,
        TokenKind::StarAssign => AssignOp::Mul,
        TokenKind::SlashAssign => AssignOp::Div,
        TokenKind::PercentAssign => AssignOp::Rem,
        TokenKind::AmpAssign => AssignOp::BitAnd,
        TokenKind::PipeAssign => AssignOp::BitOr,
        TokenKind::CaretAssign => AssignOp::BitXor,
        TokenKind::ShlAssign => AssignOp::Shl,
        TokenKind::ShrAssign => AssignOp::Shr,
        _ => return None,
    };
    Some(op)
}

impl Parser {
    /// Full expression, assignment included (right-associative).
    pub(crate) fn parse_expr(&mut self) -> DiagResult<Expr> {
        let lhs = self.parse_binary_expr(2)?;
        if let Some(op) = assign_op_for(self.current().kind) {
            let pos = self.current().pos;
            self.advance();
            let value = self.parse_expr()?;
            return Ok(Expr::Assign(Box::new(AssignExpr {
                target: lhs,
                op,
                value,
                pos,
            })));
        }
        Ok(lhs)
    }

    /// Expression without top-level assignment; statement parsing uses
    /// this so `x = 1` surfaces as an assignment statement instead.
    pub(crate) fn parse_expr_no_assign(&mut self) -> DiagResult<Expr> {
        self.parse_binary_expr(2)
    }

    fn parse_binary_expr(&mut self, min_prec: u8) -> DiagResult<Expr> {
        let mut lhs = self.parse_unary_expr()?;
        while let Some((prec, op)) = binary_precedence(self.current().kind) {
            if prec < min_prec {
                break;
            }
            let pos = self.current().pos;
            self.advance();
            let rhs = self.parse_binary_expr(prec + 1)?;
            lhs = Expr::Binary(Box::new(BinaryExpr { op, lhs, rhs, pos }));
        }
        Ok(lhs)
    }

    fn parse_unary_expr(&mut self) -> DiagResult<Expr> {
        let op = match self.current().kind {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Not => Some(UnOp::Not),
            TokenKind::PlusPlus => Some(UnOp::PreInc),
            TokenKind::MinusMinus => Some(UnOp::PreDec),
            _ => None,
        };
        if let Some(op) = op {
            let pos = self.current().pos;
            self.advance();
            let operand = self.parse_unary_expr()?;
            return Ok(Expr::Unary(Box::new(UnaryExpr { op, operand, pos })));
        }
        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> DiagResult<Expr> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            match self.current().kind {
                TokenKind::Dot => {
                    let pos = self.current().pos;
                    self.advance();
                    let name = self.expect_identifier("member name")?;
                    expr = Expr::Member(Box::new(MemberExpr {
                        base: expr,
                        name: name.text,
                        pos,
                    }));
                }
                TokenKind::DoubleColon => {
                    return Err(self.error_here("'::' member access is not supported; use '.'"));
                }
                TokenKind::LParen => {
                    let pos = self.current().pos;
                    let args = self.parse_call_args()?;
                    expr = Expr::Call(Box::new(CallExpr {
                        callee: expr,
                        args,
                        type_args: Vec::new(),
                        pos,
                    }));
                }
                TokenKind::LBracket => {
                    let pos = self.current().pos;
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "to close index expression")?;
                    expr = Expr::Index(Box::new(IndexExpr {
                        base: expr,
                        index,
                        pos,
                    }));
                }
                TokenKind::PlusPlus => {
                    let pos = self.current().pos;
                    self.advance();
                    expr = Expr::Unary(Box::new(UnaryExpr {
                        op: UnOp::PostInc,
                        operand: expr,
                        pos,
                    }));
                }
                TokenKind::MinusMinus => {
                    let pos = self.current().pos;
                    self.advance();
                    expr = Expr::Unary(Box::new(UnaryExpr {
                        op: UnOp::PostDec,
                        operand: expr,
                        pos,
                    }));
                }
                TokenKind::Lt => {
                    // Explicit type arguments: `f<T, ...>(args)`.
                    // Backtrack to a plain comparison when the angle
                    // run does not end in an argument list.
                    match self.try_parse_type_args_call(expr) {
                        Ok(call) => expr = call,
                        Err(original) => {
                            expr = original;
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Attempts `<T, ...>(args)` at the cursor. On mismatch the token
    /// position is restored and the untouched callee is handed back.
    fn try_parse_type_args_call(&mut self, callee: Expr) -> Result<Expr, Expr> {
        let saved = self.save();
        let pos = self.current().pos;
        self.advance(); // <
        let mut type_args = Vec::new();
        loop {
            match self.parse_type() {
                Ok(ty) => type_args.push(ty),
                Err(_) => {
                    self.restore(saved);
                    return Err(callee);
                }
            }
            if self.eat(TokenKind::Comma) {
                continue;
            }
            break;
        }
        if !self.eat(TokenKind::Gt) || !self.check(TokenKind::LParen) {
            self.restore(saved);
            return Err(callee);
        }
        match self.parse_call_args() {
            Ok(args) => Ok(Expr::Call(Box::new(CallExpr {
                callee,
                args,
                type_args,
                pos,
            }))),
            Err(_) => {
                self.restore(saved);
                Err(callee)
            }
        }
    }

    fn parse_call_args(&mut self) -> DiagResult<Vec<Expr>> {
        self.advance(); // (
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "to close call arguments")?;
        Ok(args)
    }

    fn parse_primary_expr(&mut self) -> DiagResult<Expr> {
        let tok = self.current().clone();
        match tok.kind {
            TokenKind::Integer => {
                self.advance();
                Ok(Expr::Literal(LiteralExpr {
                    kind: LiteralKind::Integer,
                    text: tok.text,
                    pos: tok.pos,
                }))
            }
            TokenKind::Float => {
                self.advance();
                Ok(Expr::Literal(LiteralExpr {
                    kind: LiteralKind::Float,
                    text: tok.text,
                    pos: tok.pos,
                }))
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::Literal(LiteralExpr {
                    kind: LiteralKind::String,
                    text: tok.text,
                    pos: tok.pos,
                }))
            }
            TokenKind::Char => {
                self.advance();
                Ok(Expr::Literal(LiteralExpr {
                    kind: LiteralKind::Char,
                    text: tok.text,
                    pos: tok.pos,
                }))
            }
            TokenKind::KwTrue | TokenKind::KwFalse => {
                self.advance();
                Ok(Expr::Literal(LiteralExpr {
                    kind: LiteralKind::Bool,
                    text: if tok.kind == TokenKind::KwTrue {
                        "true".into()
                    } else {
                        "false".into()
                    },
                    pos: tok.pos,
                }))
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::Identifier(IdentExpr {
                    name: tok.text,
                    pos: tok.pos,
                }))
            }
            TokenKind::KwSelf => {
                self.advance();
                Ok(Expr::SelfRef(tok.pos))
            }
            TokenKind::At => {
                // `@i32(x)` primitive cast; the callee becomes an
                // identifier spelled `@i32`.
                self.advance();
                let name = self.expect_identifier("cast type after '@'")?;
                Ok(Expr::Identifier(IdentExpr {
                    name: format!("@{}", name.text),
                    pos: tok.pos,
                }))
            }
            TokenKind::LParen => {
                if self.looks_like_fn_literal() {
                    return self.parse_fn_literal();
                }
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "to close parenthesized expression")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elems = Vec::new();
                if !self.check(TokenKind::RBracket) {
                    loop {
                        elems.push(self.parse_expr()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket, "to close array literal")?;
                Ok(Expr::Bracket(BracketLiteral {
                    elems,
                    pos: tok.pos,
                }))
            }
            TokenKind::LBrace => self.parse_artifact_literal(),
            _ => Err(self.error_here("expected expression")),
        }
    }

    /// `{ positional, .name = value, ... }`.
    fn parse_artifact_literal(&mut self) -> DiagResult<Expr> {
        let pos = self.current().pos;
        self.advance(); // {
        let mut positional = Vec::new();
        let mut named = Vec::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                if self.eat(TokenKind::Dot) {
                    let field = self.expect_identifier("field name")?;
                    self.expect(TokenKind::Assign, "after field name in artifact literal")?;
                    let value = self.parse_expr()?;
                    named.push((field.text, value));
                } else {
                    positional.push(self.parse_expr()?);
                }
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace, "to close artifact literal")?;
        Ok(Expr::Artifact(Box::new(ArtifactLiteralExpr {
            positional,
            named,
            pos,
        })))
    }

    /// Decides `(...)` between a parenthesized expression and a fn
    /// literal `(params) { body }` by scanning to the matching paren.
    fn looks_like_fn_literal(&self) -> bool {
        // Empty parameter list: `() {`.
        if self.peek(1).kind == TokenKind::RParen {
            return self.peek(2).kind == TokenKind::LBrace;
        }
        // First parameter shape: ident (or misused keyword) then ':'.
        let first_is_param = matches!(self.peek(1).kind, k if k == TokenKind::Identifier || k.is_keyword())
            && matches!(
                self.peek(2).kind,
                TokenKind::Colon | TokenKind::DoubleColon
            );
        if !first_is_param {
            return false;
        }
        // Balanced scan to the closing paren; a brace must follow.
        let mut depth = 1u32;
        let mut offset = 1usize;
        loop {
            match self.peek(offset).kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return self.peek(offset + 1).kind == TokenKind::LBrace;
                    }
                }
                TokenKind::End => return false,
                _ => {}
            }
            offset += 1;
        }
    }

    /// `(params) { body }` with the body tokens captured for deferred
    /// parsing.
    fn parse_fn_literal(&mut self) -> DiagResult<Expr> {
        let pos = self.current().pos;
        let params = self.parse_param_list()?;
        let open_pos = self.current().pos;
        if !self.eat(TokenKind::LBrace) {
            return Err(self.error_here("expected '{' to open fn literal body"));
        }
        let body_tokens = self.capture_block_tokens(open_pos)?;
        Ok(Expr::FnLiteral(Box::new(FnLiteralExpr {
            params,
            return_type: None,
            body_tokens,
            pos,
        })))
    }

    fn save(&self) -> usize {
        self.index
    }

    fn restore(&mut self, index: usize) {
        self.index = index;
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parse_program_str;

    fn first_return_expr(source: &str) -> Expr {
        let program = parse_program_str(source).unwrap();
        let Decl::Function(func) = &program.decls[0] else {
            panic!("expected function");
        };
        let Stmt::Return(ret) = &func.body[0] else {
            panic!("expected return");
        };
        ret.value.clone().expect("return value")
    }

    #[test]
    fn test_additive_multiplicative_precedence() {
        let expr = first_return_expr("main : i32 () { return 1 + 2 * 3; }");
        let Expr::Binary(bin) = expr else {
            panic!("expected binary");
        };
        assert_eq!(bin.op, BinOp::Add);
        let Expr::Binary(rhs) = bin.rhs else {
            panic!("expected nested binary");
        };
        assert_eq!(rhs.op, BinOp::Mul);
    }

    #[test]
    fn test_logical_binds_loosest() {
        let expr = first_return_expr("main : bool () { return 1 + 2 * 3 == 7 && 4 < 5; }");
        let Expr::Binary(bin) = expr else {
            panic!("expected binary");
        };
        assert_eq!(bin.op, BinOp::LogicalAnd);
    }

    #[test]
    fn test_bitwise_precedence_chain() {
        let expr = first_return_expr("main : i32 () { return 1 | 2 ^ 3 & 4 << 1; }");
        let Expr::Binary(or) = expr else {
            panic!("expected |");
        };
        assert_eq!(or.op, BinOp::BitOr);
        let Expr::Binary(xor) = or.rhs else {
            panic!("expected ^");
        };
        assert_eq!(xor.op, BinOp::BitXor);
        let Expr::Binary(and) = xor.rhs else {
            panic!("expected &");
        };
        assert_eq!(and.op, BinOp::BitAnd);
        let Expr::Binary(shift) = and.rhs else {
            panic!("expected <<");
        };
        assert_eq!(shift.op, BinOp::Shl);
    }

    #[test]
    fn test_call_member_index_postfix_chain() {
        let expr = first_return_expr("main : i32 () { return f(1).items[2].value + 3; }");
        let Expr::Binary(add) = expr else {
            panic!("expected +");
        };
        let Expr::Member(value) = add.lhs else {
            panic!("expected .value");
        };
        assert_eq!(value.name, "value");
        let Expr::Index(idx) = value.base else {
            panic!("expected index");
        };
        let Expr::Member(items) = idx.base else {
            panic!("expected .items");
        };
        assert_eq!(items.name, "items");
        assert!(matches!(items.base, Expr::Call(_)));
    }

    #[test]
    fn test_double_colon_member_rejected() {
        let err = parse_program_str("main : i32 () { return Math::PI; }").unwrap_err();
        assert!(err.message.contains("'::'"), "{}", err.message);
    }

    #[test]
    fn test_array_literal_and_index() {
        let expr = first_return_expr("main : i32 () { return [1,2,3][0] + [][0]; }");
        let Expr::Binary(add) = expr else {
            panic!("expected +");
        };
        assert!(matches!(add.lhs, Expr::Index(_)));
        assert!(matches!(add.rhs, Expr::Index(_)));
    }

    #[test]
    fn test_artifact_literal_mixed_fields() {
        let program = parse_program_str("main : void () { foo({ 1, .y = 2 }); }").unwrap();
        let Decl::Function(func) = &program.decls[0] else {
            panic!("expected function");
        };
        let Stmt::Expr(Expr::Call(call)) = &func.body[0] else {
            panic!("expected call statement");
        };
        let Expr::Artifact(lit) = &call.args[0] else {
            panic!("expected artifact literal");
        };
        assert_eq!(lit.positional.len(), 1);
        assert_eq!(lit.named.len(), 1);
        assert_eq!(lit.named[0].0, "y");
    }

    #[test]
    fn test_fn_literal_captures_body_tokens() {
        let program =
            parse_program_str("main : void () { f : (i32) : i32 = (x : i32) { return x; }; }")
                .unwrap();
        let Decl::Function(func) = &program.decls[0] else {
            panic!("expected function");
        };
        let Stmt::VarDecl(var) = &func.body[0] else {
            panic!("expected var decl");
        };
        let Some(Expr::FnLiteral(lit)) = &var.init else {
            panic!("expected fn literal");
        };
        assert_eq!(lit.params.len(), 1);
        assert!(!lit.body_tokens.is_empty());
        assert!(lit.return_type.is_none());
    }

    #[test]
    fn test_fn_literal_as_call_argument() {
        let program = parse_program_str(
            "apply : i32 (f : (i32) : i32, x : i32) { return x; }\
             main : i32 () { return apply((x : i32) { return x + 1; }, 41); }",
        )
        .unwrap();
        let Decl::Function(func) = &program.decls[1] else {
            panic!("expected function");
        };
        let Stmt::Return(ret) = &func.body[0] else {
            panic!("expected return");
        };
        let Some(Expr::Call(call)) = &ret.value else {
            panic!("expected call");
        };
        assert_eq!(call.args.len(), 2);
        assert!(matches!(call.args[0], Expr::FnLiteral(_)));
    }

    #[test]
    fn test_fn_shorthand_literal_binding() {
        let program =
            parse_program_str("main : void () { f : fn = i32 (a : i32, b : i32) { return a + b; }; }")
                .unwrap();
        let Decl::Function(func) = &program.decls[0] else {
            panic!("expected function");
        };
        let Stmt::VarDecl(var) = &func.body[0] else {
            panic!("expected var decl");
        };
        assert!(var.ty.is_fn_shorthand());
        let Some(Expr::FnLiteral(lit)) = &var.init else {
            panic!("expected fn literal");
        };
        assert_eq!(lit.params.len(), 2);
        assert_eq!(lit.return_type.as_ref().unwrap().name, "i32");
    }

    #[test]
    fn test_explicit_type_args_call() {
        let expr = first_return_expr("main : i32 () { return identity<i32>(10); }");
        let Expr::Call(call) = expr else {
            panic!("expected call");
        };
        assert_eq!(call.type_args.len(), 1);
        assert_eq!(call.type_args[0].name, "i32");
    }

    #[test]
    fn test_less_than_still_parses_as_comparison() {
        let expr = first_return_expr("main : bool () { return a < b; }");
        let Expr::Binary(bin) = expr else {
            panic!("expected binary");
        };
        assert_eq!(bin.op, BinOp::Lt);
    }

    #[test]
    fn test_at_cast_call() {
        let expr = first_return_expr("main : i32 () { return @i32(x); }");
        let Expr::Call(call) = expr else {
            panic!("expected call");
        };
        let Expr::Identifier(ident) = call.callee else {
            panic!("expected identifier callee");
        };
        assert_eq!(ident.name, "@i32");
    }

    #[test]
    fn test_self_member_expression() {
        let program =
            parse_program_str("Point :: artifact { x : i32 get : i32 () { return self.x; } }")
                .unwrap();
        let Decl::Artifact(artifact) = &program.decls[0] else {
            panic!("expected artifact");
        };
        let Stmt::Return(ret) = &artifact.methods[0].body[0] else {
            panic!("expected return");
        };
        let Some(Expr::Member(member)) = &ret.value else {
            panic!("expected member");
        };
        assert!(matches!(member.base, Expr::SelfRef(_)));
        assert_eq!(member.name, "x");
    }

    #[test]
    fn test_assignment_expression_in_parens() {
        let program = parse_program_str("main : void () { x : i32 = 0; (x = 1); }").unwrap();
        let Decl::Function(func) = &program.decls[0] else {
            panic!("expected function");
        };
        assert!(matches!(&func.body[1], Stmt::Expr(Expr::Assign(_))));
    }

    #[test]
    fn test_pre_and_post_inc_dec() {
        let program = parse_program_str("main : void () { x++; ++x; x--; --x; }").unwrap();
        let Decl::Function(func) = &program.decls[0] else {
            panic!("expected function");
        };
        assert_eq!(func.body.len(), 4);
        let ops: Vec<UnOp> = func
            .body
            .iter()
            .map(|s| {
                let Stmt::Expr(Expr::Unary(u)) = s else {
                    panic!("expected unary stmt");
                };
                u.op
            })
            .collect();
        assert_eq!(
            ops,
            vec![UnOp::PostInc, UnOp::PreInc, UnOp::PostDec, UnOp::PreDec]
        );
    }
}

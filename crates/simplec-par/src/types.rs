//! Type annotation parsing.
//!
//! Grammar, in order of dispatch:
//!
//! ```text
//! type      := '*'* (proc | named)
//! proc      := 'fn' [(':' | '::') type]              (shorthand)
//!            | '(' [type (',' type)*] ')' (':' | '::') type
//! named     := ident ['<' type (',' type)* '>'] dims*
//! dims      := '[' ']' | '[' int ']'
//! ```
//!
//! `callback` parses as a procedure type of unknown arity.

use simplec_lex::TokenKind;
use simplec_util::{parse_integer_literal, DiagResult, Pos};

use crate::ast::{Mutability, TypeDim, TypeRef};
use crate::Parser;

impl Parser {
    pub(crate) fn parse_type(&mut self) -> DiagResult<TypeRef> {
        let pos = self.current().pos;
        let mut pointer_depth = 0u32;
        while self.eat(TokenKind::Star) {
            pointer_depth += 1;
        }

        let mut ty = if self.check(TokenKind::KwFn) {
            self.parse_fn_shorthand_type()?
        } else if self.check(TokenKind::LParen) {
            self.parse_proc_type()?
        } else {
            self.parse_named_type()?
        };

        ty.pointer_depth = pointer_depth;
        ty.pos = pos;
        Ok(ty)
    }

    /// `fn`, `fn : Ret`, `fn :: Ret`.
    fn parse_fn_shorthand_type(&mut self) -> DiagResult<TypeRef> {
        self.advance(); // fn
        let mut ty = TypeRef {
            is_proc: true,
            ..Default::default()
        };
        if self.eat(TokenKind::Colon) {
            ty.proc_return_mutability = Mutability::Mutable;
            ty.proc_return = Some(Box::new(self.parse_type()?));
        } else if self.eat(TokenKind::DoubleColon) {
            ty.proc_return_mutability = Mutability::Immutable;
            ty.proc_return = Some(Box::new(self.parse_type()?));
        }
        Ok(ty)
    }

    /// `(T, ...) : Ret` / `(T, ...) :: Ret`.
    fn parse_proc_type(&mut self) -> DiagResult<TypeRef> {
        self.advance(); // (
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.parse_type()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "to close procedure parameter types")?;

        let mutability = if self.eat(TokenKind::DoubleColon) {
            Mutability::Immutable
        } else if self.eat(TokenKind::Colon) {
            Mutability::Mutable
        } else {
            return Err(self.error_here("procedure type missing return type"));
        };
        let ret = self.parse_type()?;

        Ok(TypeRef {
            is_proc: true,
            proc_params: params,
            proc_return: Some(Box::new(ret)),
            proc_return_mutability: mutability,
            ..Default::default()
        })
    }

    fn parse_named_type(&mut self) -> DiagResult<TypeRef> {
        let name_tok = self.expect_identifier("type name")?;
        if name_tok.text == "callback" {
            return Ok(TypeRef {
                is_proc: true,
                proc_is_callback: true,
                ..Default::default()
            });
        }

        let mut ty = TypeRef::named(name_tok.text);

        if self.eat(TokenKind::Lt) {
            loop {
                ty.type_args.push(self.parse_type()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Gt, "to close type arguments")?;
        }

        while self.check(TokenKind::LBracket) {
            self.advance();
            if self.eat(TokenKind::RBracket) {
                ty.dims.push(TypeDim::List);
                continue;
            }
            let size_tok = self.current().clone();
            if size_tok.kind != TokenKind::Integer {
                return Err(self.error_here("invalid array size"));
            }
            self.advance();
            let size = parse_integer_literal(&size_tok.text)
                .filter(|v| *v >= 0)
                .ok_or_else(|| self.error_here("invalid array size"))?;
            ty.dims.push(TypeDim::Fixed(size as u32));
            self.expect(TokenKind::RBracket, "to close array dimension")?;
        }

        Ok(ty)
    }

    /// Shorthand fn-literal initializer: `Ret (params) { body }`.
    ///
    /// Only reachable from a bare `fn` binding, where an expression
    /// would otherwise misread `void (...)` as a call.
    pub(crate) fn parse_fn_shorthand_literal(&mut self) -> DiagResult<crate::ast::Expr> {
        let pos = self.current().pos;
        let ret = self.parse_type()?;
        let params = self.parse_param_list()?;
        let open_pos = self.current().pos;
        if !self.eat(TokenKind::LBrace) {
            return Err(self.error_here("expected '{' to open fn literal body"));
        }
        let body_tokens = self.capture_block_tokens(open_pos)?;
        Ok(crate::ast::Expr::FnLiteral(Box::new(
            crate::ast::FnLiteralExpr {
                params,
                return_type: Some(ret),
                body_tokens,
                pos,
            },
        )))
    }

    /// Captures tokens up to the matching `}` (exclusive); the opening
    /// brace was already consumed.
    pub(crate) fn capture_block_tokens(
        &mut self,
        open_pos: Pos,
    ) -> DiagResult<Vec<simplec_lex::Token>> {
        let mut depth = 1u32;
        let mut tokens = Vec::new();
        loop {
            match self.current().kind {
                TokenKind::End => {
                    return Err(simplec_util::Diag::new(open_pos, "unterminated block"));
                }
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return Ok(tokens);
                    }
                }
                _ => {}
            }
            tokens.push(self.advance());
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::TypeDim;
    use crate::parse_type_str;

    #[test]
    fn test_parses_primitive_types() {
        for name in [
            "i8", "u8", "i16", "u16", "i32", "u32", "i64", "u64", "i128", "u128", "f32", "f64",
            "bool", "char", "string",
        ] {
            let ty = parse_type_str(name).unwrap();
            assert_eq!(ty.name, name);
            assert!(ty.is_scalar());
        }
    }

    #[test]
    fn test_parses_array_and_list_dims() {
        let ty = parse_type_str("i32[10][]").unwrap();
        assert_eq!(ty.dims, vec![TypeDim::Fixed(10), TypeDim::List]);

        let ty = parse_type_str("i32[][]").unwrap();
        assert_eq!(ty.dims, vec![TypeDim::List, TypeDim::List]);
    }

    #[test]
    fn test_parses_hex_and_binary_array_sizes() {
        assert_eq!(parse_type_str("i32[0x10]").unwrap().dims, vec![TypeDim::Fixed(16)]);
        assert_eq!(parse_type_str("i32[0b1010]").unwrap().dims, vec![TypeDim::Fixed(10)]);
    }

    #[test]
    fn test_rejects_bad_array_size() {
        assert!(parse_type_str("i32[foo]").is_err());
    }

    #[test]
    fn test_parses_generic_type() {
        let ty = parse_type_str("Map<string, i32>").unwrap();
        assert_eq!(ty.name, "Map");
        assert_eq!(ty.type_args.len(), 2);
        assert_eq!(ty.type_args[0].name, "string");
        assert_eq!(ty.type_args[1].name, "i32");
    }

    #[test]
    fn test_parses_proc_type() {
        let ty = parse_type_str("(i32, string) :: bool").unwrap();
        assert!(ty.is_proc);
        assert_eq!(ty.proc_params.len(), 2);
        assert_eq!(ty.proc_return.as_ref().unwrap().name, "bool");
    }

    #[test]
    fn test_parses_fn_return_shorthand() {
        let ty = parse_type_str("fn : i32").unwrap();
        assert!(ty.is_proc);
        assert!(ty.proc_params.is_empty());
        assert_eq!(ty.proc_return.as_ref().unwrap().name, "i32");
        assert!(!ty.is_fn_shorthand());
    }

    #[test]
    fn test_parses_bare_fn_shorthand() {
        let ty = parse_type_str("fn").unwrap();
        assert!(ty.is_fn_shorthand());
    }

    #[test]
    fn test_parses_pointer_types() {
        let ty = parse_type_str("*i32").unwrap();
        assert_eq!(ty.name, "i32");
        assert_eq!(ty.pointer_depth, 1);

        let ty = parse_type_str("**void").unwrap();
        assert_eq!(ty.name, "void");
        assert_eq!(ty.pointer_depth, 2);
    }

    #[test]
    fn test_parses_callback() {
        let ty = parse_type_str("callback").unwrap();
        assert!(ty.is_proc);
        assert!(ty.proc_is_callback);
    }

    #[test]
    fn test_proc_type_requires_return() {
        assert!(parse_type_str("(i32)").is_err());
    }
}

//! Item parsing: imports, externs, enums, artifacts, modules,
//! generics, and parameter lists.

use simplec_lex::TokenKind;
use simplec_lex::Token;
use simplec_util::DiagResult;

use crate::ast::*;
use crate::{Binding, Parser};

impl Parser {
    /// `import "path"`, `import bare.path`, optionally `as Alias`.
    pub(crate) fn parse_import(&mut self) -> DiagResult<ImportDecl> {
        let import_tok = self.advance();
        let path = if self.check(TokenKind::String) {
            self.advance().text
        } else {
            let mut path = self.expect_identifier("import path")?.text;
            while self.eat(TokenKind::Dot) {
                path.push('.');
                path.push_str(&self.expect_identifier("import path segment")?.text);
            }
            path
        };
        let alias = if self.check(TokenKind::Identifier) && self.current().text == "as" {
            self.advance();
            Some(self.expect_identifier("import alias")?.text)
        } else {
            None
        };
        Ok(ImportDecl {
            path,
            alias,
            pos: import_tok.pos,
        })
    }

    /// `extern [Module.]name : Ret (params)`.
    pub(crate) fn parse_extern(&mut self) -> DiagResult<ExternDecl> {
        let extern_tok = self.advance();
        let first = self.expect_identifier("extern symbol name")?;
        let (module, name) = if self.eat(TokenKind::Dot) {
            let name = self.expect_identifier("extern symbol name")?;
            (Some(first.text), name.text)
        } else {
            (None, first.text)
        };

        let return_mutability = if self.eat(TokenKind::DoubleColon) {
            Mutability::Immutable
        } else if self.eat(TokenKind::Colon) {
            Mutability::Mutable
        } else {
            return Err(self.error_here("expected ':' after extern symbol name"));
        };
        let return_type = self.parse_type()?;
        let params = self.parse_param_list()?;

        Ok(ExternDecl {
            module,
            name,
            params,
            return_type,
            return_mutability,
            pos: extern_tok.pos,
        })
    }

    /// `<T, U, ...>` generic parameter list.
    pub(crate) fn parse_generics(&mut self) -> DiagResult<Vec<String>> {
        self.expect(TokenKind::Lt, "to open generic parameters")?;
        let mut generics = Vec::new();
        loop {
            generics.push(self.expect_identifier("generic parameter name")?.text);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Gt, "to close generic parameters")?;
        Ok(generics)
    }

    /// `(name : Type, name :: Type, ...)`.
    pub(crate) fn parse_param_list(&mut self) -> DiagResult<Vec<ParamDecl>> {
        self.expect(TokenKind::LParen, "to open parameter list")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let name = self.expect_identifier("parameter name")?;
                let mutability = if self.eat(TokenKind::DoubleColon) {
                    Mutability::Immutable
                } else if self.eat(TokenKind::Colon) {
                    Mutability::Mutable
                } else {
                    return Err(self.error_here("expected ':' after parameter name"));
                };
                let ty = self.parse_type()?;
                params.push(ParamDecl {
                    name: name.text,
                    ty,
                    mutability,
                    pos: name.pos,
                });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "to close parameter list")?;
        Ok(params)
    }

    /// `Name :: enum { A = 1, B }` - the `enum` keyword was consumed.
    pub(crate) fn parse_enum_decl(&mut self, name_tok: Token) -> DiagResult<EnumDecl> {
        self.expect(TokenKind::LBrace, "to open enum body")?;
        let mut members = Vec::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                let member = self.expect_identifier("enum member name")?;
                let value = if self.eat(TokenKind::Assign) {
                    let value_tok =
                        self.expect(TokenKind::Integer, "as enum member value")?;
                    Some(value_tok.text)
                } else {
                    None
                };
                members.push(EnumMember {
                    name: member.text,
                    value,
                    pos: member.pos,
                });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
                if self.check(TokenKind::RBrace) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace, "to close enum body")?;
        Ok(EnumDecl {
            name: name_tok.text,
            members,
            pos: name_tok.pos,
        })
    }

    /// Artifact body: fields and methods separated by newline or `;`.
    pub(crate) fn parse_artifact_decl(
        &mut self,
        name_tok: Token,
        generics: Vec<String>,
    ) -> DiagResult<ArtifactDecl> {
        self.expect(TokenKind::LBrace, "to open artifact body")?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        loop {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            if self.eat(TokenKind::RBrace) {
                break;
            }
            if self.check(TokenKind::End) {
                return Err(simplec_util::Diag::new(name_tok.pos, "unterminated block"));
            }
            if self.check(TokenKind::Comma) {
                return Err(self.error_here("use newline or ';' between members"));
            }
            let member_name = self.expect_identifier("artifact member name")?;
            match self.parse_binding(member_name, Vec::new())? {
                Binding::Variable(field) => fields.push(field),
                Binding::Function(method) => methods.push(method),
            }
        }
        Ok(ArtifactDecl {
            name: name_tok.text,
            generics,
            fields,
            methods,
            pos: name_tok.pos,
        })
    }

    /// Module body: module-scope variables and functions.
    pub(crate) fn parse_module_decl(&mut self, name_tok: Token) -> DiagResult<ModuleDecl> {
        self.expect(TokenKind::LBrace, "to open module body")?;
        let mut variables = Vec::new();
        let mut functions = Vec::new();
        loop {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            if self.eat(TokenKind::RBrace) {
                break;
            }
            if self.check(TokenKind::End) {
                return Err(simplec_util::Diag::new(name_tok.pos, "unterminated block"));
            }
            if self.check(TokenKind::Comma) {
                return Err(self.error_here("use newline or ';' between members"));
            }
            let member_name = self.expect_identifier("module member name")?;
            match self.parse_binding(member_name, Vec::new())? {
                Binding::Variable(var) => variables.push(var),
                Binding::Function(func) => functions.push(func),
            }
        }
        Ok(ModuleDecl {
            name: name_tok.text,
            variables,
            functions,
            pos: name_tok.pos,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parse_program_str;

    #[test]
    fn test_parses_artifact_decl() {
        let program =
            parse_program_str("Point :: artifact { x : f32 y :: f32 len : i32 () { return 1; } }")
                .unwrap();
        let Decl::Artifact(artifact) = &program.decls[0] else {
            panic!("expected artifact");
        };
        assert_eq!(artifact.name, "Point");
        assert_eq!(artifact.fields.len(), 2);
        assert_eq!(artifact.fields[1].mutability, Mutability::Immutable);
        assert_eq!(artifact.methods.len(), 1);
    }

    #[test]
    fn test_parses_artifact_decl_capitalized_keyword() {
        let program =
            parse_program_str("Point :: Artifact { x : f32 y :: f32 len : i32 () { return 1; } }")
                .unwrap();
        assert!(matches!(program.decls[0], Decl::Artifact(_)));
    }

    #[test]
    fn test_artifact_comma_hint() {
        let err = parse_program_str("Point :: artifact { x : i32, y : i32 }").unwrap_err();
        assert!(
            err.message.contains("use newline or ';' between members"),
            "{}",
            err.message
        );
    }

    #[test]
    fn test_parses_generic_artifact() {
        let program = parse_program_str("Box<T> :: artifact { value : T }").unwrap();
        let Decl::Artifact(artifact) = &program.decls[0] else {
            panic!("expected artifact");
        };
        assert_eq!(artifact.generics, vec!["T"]);
        assert_eq!(artifact.fields[0].ty.name, "T");
    }

    #[test]
    fn test_parses_module_decl() {
        let program = parse_program_str(
            "Math :: module { scale : i32 = 2; add : i32 (a : i32, b : i32) { return a + b; } }",
        )
        .unwrap();
        let Decl::Module(module) = &program.decls[0] else {
            panic!("expected module");
        };
        assert_eq!(module.name, "Math");
        assert_eq!(module.variables.len(), 1);
        assert_eq!(module.functions.len(), 1);
    }

    #[test]
    fn test_parses_module_decl_capitalized_keyword() {
        let program = parse_program_str(
            "Math :: Module { scale : i32 = 2; add : i32 (a : i32, b : i32) { return a + b; } }",
        )
        .unwrap();
        assert!(matches!(program.decls[0], Decl::Module(_)));
    }

    #[test]
    fn test_parses_enum_decls() {
        let program = parse_program_str(
            "Status :: enum { Pending = 1, Active = 2 }Color :: enum { Red, Green, Blue }",
        )
        .unwrap();
        let Decl::Enum(status) = &program.decls[0] else {
            panic!("expected enum");
        };
        assert_eq!(status.members.len(), 2);
        assert_eq!(status.members[0].value.as_deref(), Some("1"));
        let Decl::Enum(color) = &program.decls[1] else {
            panic!("expected enum");
        };
        assert_eq!(color.members.len(), 3);
        assert!(color.members[0].value.is_none());
    }

    #[test]
    fn test_parses_enum_decl_capitalized_keyword() {
        let program = parse_program_str("Status :: Enum { Pending = 1 }").unwrap();
        assert!(matches!(program.decls[0], Decl::Enum(_)));
    }

    #[test]
    fn test_parses_import_variants() {
        let program = parse_program_str("import \"raylib\"").unwrap();
        let Decl::Import(import) = &program.decls[0] else {
            panic!("expected import");
        };
        assert_eq!(import.path, "raylib");
        assert!(import.alias.is_none());

        let program = parse_program_str("import \"raylib\" as Ray").unwrap();
        let Decl::Import(import) = &program.decls[0] else {
            panic!("expected import");
        };
        assert_eq!(import.alias.as_deref(), Some("Ray"));

        let program = parse_program_str("import System.io").unwrap();
        let Decl::Import(import) = &program.decls[0] else {
            panic!("expected import");
        };
        assert_eq!(import.path, "System.io");
    }

    #[test]
    fn test_parses_extern_decl() {
        let program = parse_program_str("extern Ray.InitWindow : void (w : i32, h : i32)").unwrap();
        let Decl::Extern(ext) = &program.decls[0] else {
            panic!("expected extern");
        };
        assert_eq!(ext.module.as_deref(), Some("Ray"));
        assert_eq!(ext.name, "InitWindow");
        assert_eq!(ext.params.len(), 2);
        assert_eq!(ext.params[0].name, "w");
    }

    #[test]
    fn test_parses_extern_without_module() {
        let program = parse_program_str("extern puts : i32 (s : string)").unwrap();
        let Decl::Extern(ext) = &program.decls[0] else {
            panic!("expected extern");
        };
        assert!(ext.module.is_none());
        assert_eq!(ext.name, "puts");
    }

    #[test]
    fn test_extern_pointer_types() {
        let program = parse_program_str(
            "Node :: artifact { next: *Node }\nextern C.walk : *Node (head : *Node)",
        )
        .unwrap();
        let Decl::Extern(ext) = &program.decls[1] else {
            panic!("expected extern");
        };
        assert_eq!(ext.return_type.pointer_depth, 1);
        assert_eq!(ext.params[0].ty.pointer_depth, 1);
    }
}

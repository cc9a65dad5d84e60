//! Statement checking: declarations, assignments, control flow,
//! mutability discipline, and return coverage.

use simplec_par::{Expr, Mutability, Stmt, TypeRef, VarDecl};
use simplec_util::{Diag, DiagResult, Pos};

use crate::expr::{check_fn_literal_against_type, module_name_from_expr};
use crate::scope::LocalInfo;
use crate::types::{check_type_ref, types_compatible_for_expr, TypeUse};
use crate::{Context, FnChecker};

impl<'a, 'p> FnChecker<'a, 'p> {
    pub(crate) fn check_stmt(&mut self, stmt: &'p Stmt, loop_depth: u32) -> DiagResult<()> {
        match stmt {
            Stmt::Return(ret) => {
                if self.return_is_void && ret.value.is_some() {
                    return Err(Diag::new(ret.pos, "void function cannot return a value"));
                }
                if !self.return_is_void && ret.value.is_none() {
                    return Err(Diag::new(ret.pos, "non-void function must return a value"));
                }
                if let Some(value) = &ret.value {
                    self.check_expr(value)?;
                    if let Some(actual) = self.infer_expr_type(value) {
                        if !types_compatible_for_expr(&self.expected_return, &actual, value) {
                            return Err(Diag::new(ret.pos, "return type mismatch"));
                        }
                    }
                }
                Ok(())
            }
            Stmt::Expr(expr) => self.check_expr(expr),
            Stmt::Assign(assign) => {
                self.check_expr(&assign.target)?;
                self.check_assignment_target(&assign.target, assign.pos)?;
                self.check_expr(&assign.value)?;
                self.check_assignment_types(&assign.target, assign.op, &assign.value, assign.pos)
            }
            Stmt::VarDecl(var) => self.check_var_decl(var),
            Stmt::IfChain(chain) => {
                for (cond, body) in &chain.branches {
                    self.check_expr(cond)?;
                    self.check_bool_condition(cond)?;
                    self.scopes.push();
                    let result = body
                        .iter()
                        .try_for_each(|child| self.check_stmt(child, loop_depth));
                    self.scopes.pop();
                    result?;
                }
                if !chain.else_body.is_empty() {
                    self.scopes.push();
                    let result = chain
                        .else_body
                        .iter()
                        .try_for_each(|child| self.check_stmt(child, loop_depth));
                    self.scopes.pop();
                    result?;
                }
                Ok(())
            }
            Stmt::If(if_stmt) => {
                self.check_expr(&if_stmt.cond)?;
                self.check_bool_condition(&if_stmt.cond)?;
                self.scopes.push();
                let result = if_stmt
                    .then_body
                    .iter()
                    .try_for_each(|child| self.check_stmt(child, loop_depth));
                self.scopes.pop();
                result?;
                if !if_stmt.else_body.is_empty() {
                    self.scopes.push();
                    let result = if_stmt
                        .else_body
                        .iter()
                        .try_for_each(|child| self.check_stmt(child, loop_depth));
                    self.scopes.pop();
                    result?;
                }
                Ok(())
            }
            Stmt::While(while_stmt) => {
                self.check_expr(&while_stmt.cond)?;
                self.check_bool_condition(&while_stmt.cond)?;
                self.scopes.push();
                let result = while_stmt
                    .body
                    .iter()
                    .try_for_each(|child| self.check_stmt(child, loop_depth + 1));
                self.scopes.pop();
                result
            }
            Stmt::For(for_stmt) => {
                // The header variable gets its own scope so the body
                // may shadow it.
                self.scopes.push();
                let result = (|| {
                    if let Some(var) = &for_stmt.var_decl {
                        self.check_var_decl(var)?;
                    }
                    if let Some(init) = &for_stmt.init {
                        self.check_expr(init)?;
                    }
                    self.check_expr(&for_stmt.cond)?;
                    self.check_bool_condition(&for_stmt.cond)?;
                    self.check_expr(&for_stmt.step)?;
                    self.scopes.push();
                    let body_result = for_stmt
                        .body
                        .iter()
                        .try_for_each(|child| self.check_stmt(child, loop_depth + 1));
                    self.scopes.pop();
                    body_result
                })();
                self.scopes.pop();
                result
            }
            Stmt::Break(pos) => {
                if loop_depth == 0 {
                    return Err(Diag::new(*pos, "break used outside of loop"));
                }
                Ok(())
            }
            Stmt::Skip(pos) => {
                if loop_depth == 0 {
                    return Err(Diag::new(*pos, "skip used outside of loop"));
                }
                Ok(())
            }
        }
    }

    fn check_var_decl(&mut self, var: &'p VarDecl) -> DiagResult<()> {
        let effective = var.ty.resolve_fn_shorthand(var.init.as_ref());
        check_type_ref(&effective, self.ctx, &self.type_params, TypeUse::Value)?;
        self.scopes.add(
            &var.name,
            LocalInfo::new(effective.clone(), var.mutability),
            var.pos,
        )?;
        let Some(init) = &var.init else {
            return Ok(());
        };
        self.check_expr(init)?;
        self.check_binding_init(&effective, init)?;

        if let Some(manifest) = self.dl_open_manifest_module(init) {
            if let Some(local) = self.scopes.find_mut(&var.name) {
                local.dl_module = Some(manifest);
            }
        }
        Ok(())
    }

    /// Initializer checks shared by locals and globals: fn-literal
    /// shape, bracket-literal shape and element types, plain type
    /// compatibility, and artifact literals.
    pub(crate) fn check_binding_init(&self, ty: &TypeRef, init: &Expr) -> DiagResult<()> {
        if let Expr::FnLiteral(lit) = init {
            return check_fn_literal_against_type(lit, ty);
        }
        if matches!(init, Expr::Bracket(_)) {
            return self.check_bracket_against_type(init, ty);
        }
        if let Expr::Artifact(lit) = init {
            return self.check_artifact_literal(lit, ty);
        }
        if let Some(init_type) = self.infer_expr_type(init) {
            if !types_compatible_for_expr(ty, &init_type, init) {
                return Err(Diag::new(init.pos(), "initializer type mismatch"));
            }
        }
        Ok(())
    }

    fn check_bool_condition(&self, cond: &Expr) -> DiagResult<()> {
        if let Some(ty) = self.infer_expr_type(cond) {
            if ty.pointer_depth != 0 || ty.name != "bool" || !ty.dims.is_empty() {
                return Err(Diag::new(cond.pos(), "condition must be bool"));
            }
        }
        Ok(())
    }

    /// `Core.DL.open(path, Manifest)` - yields the manifest module the
    /// bound variable carries for dynamic symbol calls.
    fn dl_open_manifest_module(&self, expr: &Expr) -> Option<String> {
        let Expr::Call(call) = expr else {
            return None;
        };
        let Expr::Member(member) = &call.callee else {
            return None;
        };
        let module = module_name_from_expr(&member.base)?;
        let resolved = self.ctx.resolve_reserved_module(&module)?;
        if resolved != "Core.DL"
            || simplec_util::normalize_core_dl_member(&member.name) != "open"
        {
            return None;
        }
        if call.args.len() != 2 {
            return None;
        }
        let Expr::Identifier(manifest) = &call.args[1] else {
            return None;
        };
        self.ctx
            .externs_by_module
            .contains_key(&manifest.name)
            .then(|| manifest.name.clone())
    }

    // =========================================================================
    // Assignment targets and mutability
    // =========================================================================

    pub(crate) fn check_assignment_target(&self, target: &Expr, pos: Pos) -> DiagResult<()> {
        match target {
            Expr::SelfRef(self_pos) => Err(Diag::new(*self_pos, "cannot assign to self")),
            Expr::Identifier(ident) => {
                if let Some(local) = self.scopes.find(&ident.name) {
                    if local.mutability == Mutability::Immutable {
                        return Err(Diag::new(
                            ident.pos,
                            format!("cannot assign to immutable local: {}", ident.name),
                        ));
                    }
                    return Ok(());
                }
                if let Some(global) = self.ctx.globals.get(&ident.name) {
                    if global.mutability == Mutability::Immutable {
                        return Err(Diag::new(
                            ident.pos,
                            format!("cannot assign to immutable variable: {}", ident.name),
                        ));
                    }
                    return Ok(());
                }
                if self.ctx.functions.contains_key(&ident.name) {
                    return Err(Diag::new(
                        ident.pos,
                        format!("cannot assign to function: {}", ident.name),
                    ));
                }
                Ok(())
            }
            Expr::Member(member) => {
                if !self.is_mutable_expr(&member.base) {
                    return Err(Diag::new(pos, "cannot assign through immutable value"));
                }
                if let Expr::SelfRef(_) = member.base {
                    let field = Context::find_artifact_field(self.current_artifact, &member.name);
                    if field.is_none()
                        && Context::find_artifact_method(self.current_artifact, &member.name)
                            .is_some()
                    {
                        return Err(Diag::new(
                            member.pos,
                            format!("cannot assign to method: self.{}", member.name),
                        ));
                    }
                    if let Some(field) = field {
                        if field.mutability == Mutability::Immutable {
                            return Err(Diag::new(
                                member.pos,
                                format!("cannot assign to immutable field: self.{}", member.name),
                            ));
                        }
                    }
                    return Ok(());
                }
                if let Expr::Identifier(base) = &member.base {
                    if let Some(local) = self.scopes.find(&base.name) {
                        let artifact = self.ctx.artifacts.get(&local.ty.name).copied();
                        let field = Context::find_artifact_field(artifact, &member.name);
                        if field.is_none()
                            && Context::find_artifact_method(artifact, &member.name).is_some()
                        {
                            return Err(Diag::new(
                                member.pos,
                                format!(
                                    "cannot assign to method: {}.{}",
                                    base.name, member.name
                                ),
                            ));
                        }
                        if let Some(field) = field {
                            if field.mutability == Mutability::Immutable {
                                return Err(Diag::new(
                                    member.pos,
                                    format!(
                                        "cannot assign to immutable field: {}.{}",
                                        base.name, member.name
                                    ),
                                ));
                            }
                        }
                        return Ok(());
                    }
                    if let Some(module) = self.ctx.modules.get(&base.name) {
                        let var = Context::find_module_var(module, &member.name);
                        if var.is_none()
                            && Context::find_module_func(module, &member.name).is_some()
                        {
                            return Err(Diag::new(
                                member.pos,
                                format!(
                                    "cannot assign to function: {}.{}",
                                    base.name, member.name
                                ),
                            ));
                        }
                        if let Some(var) = var {
                            if var.mutability == Mutability::Immutable {
                                return Err(Diag::new(
                                    member.pos,
                                    format!(
                                        "cannot assign to immutable module member: {}.{}",
                                        base.name, member.name
                                    ),
                                ));
                            }
                        }
                        return Ok(());
                    }
                    if let Some(module) = module_name_from_expr(&member.base) {
                        if self.ctx.is_reserved_module_enabled(&module) {
                            return Err(Diag::new(
                                member.pos,
                                format!(
                                    "cannot assign to immutable module member: {}.{}",
                                    module, member.name
                                ),
                            ));
                        }
                    }
                    if let Some(global) = self.ctx.globals.get(&base.name) {
                        let artifact = self.ctx.artifacts.get(&global.ty.name).copied();
                        let field = Context::find_artifact_field(artifact, &member.name);
                        if field.is_none()
                            && Context::find_artifact_method(artifact, &member.name).is_some()
                        {
                            return Err(Diag::new(
                                member.pos,
                                format!(
                                    "cannot assign to method: {}.{}",
                                    base.name, member.name
                                ),
                            ));
                        }
                        if let Some(field) = field {
                            if field.mutability == Mutability::Immutable {
                                return Err(Diag::new(
                                    member.pos,
                                    format!(
                                        "cannot assign to immutable field: {}.{}",
                                        base.name, member.name
                                    ),
                                ));
                            }
                        }
                    }
                }
                Ok(())
            }
            Expr::Index(index) => {
                if !self.is_mutable_expr(&index.base) {
                    return Err(Diag::new(pos, "cannot assign through immutable value"));
                }
                Ok(())
            }
            _ => Err(Diag::new(pos, "invalid assignment target")),
        }
    }

    /// Mutability of a value flows transitively through member and
    /// index bases; call results carry their declared return
    /// mutability.
    fn is_mutable_expr(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Identifier(ident) => {
                if let Some(local) = self.scopes.find(&ident.name) {
                    return local.mutability == Mutability::Mutable;
                }
                if let Some(global) = self.ctx.globals.get(&ident.name) {
                    return global.mutability == Mutability::Mutable;
                }
                true
            }
            Expr::SelfRef(_) => true,
            Expr::Member(member) => {
                if let Expr::SelfRef(_) = member.base {
                    if let Some(field) =
                        Context::find_artifact_field(self.current_artifact, &member.name)
                    {
                        return field.mutability == Mutability::Mutable;
                    }
                    return true;
                }
                if let Expr::Identifier(base) = &member.base {
                    if let Some(module) = self.ctx.modules.get(&base.name) {
                        if let Some(var) = Context::find_module_var(module, &member.name) {
                            return var.mutability == Mutability::Mutable;
                        }
                        return true;
                    }
                    if let Some(local) = self.scopes.find(&base.name) {
                        let artifact = self.ctx.artifacts.get(&local.ty.name).copied();
                        if let Some(field) = Context::find_artifact_field(artifact, &member.name) {
                            return field.mutability == Mutability::Mutable;
                        }
                        return true;
                    }
                    if let Some(global) = self.ctx.globals.get(&base.name) {
                        let artifact = self.ctx.artifacts.get(&global.ty.name).copied();
                        if let Some(field) = Context::find_artifact_field(artifact, &member.name) {
                            return field.mutability == Mutability::Mutable;
                        }
                    }
                }
                true
            }
            Expr::Call(call) => match self.call_target_info(&call.callee) {
                Ok(Some(info)) => info.return_mutability == Mutability::Mutable,
                _ => true,
            },
            Expr::Index(index) => self.is_mutable_expr(&index.base),
            _ => true,
        }
    }
}

/// Whether a statement guarantees a return on every path: `return`
/// does; `if`/`else` when both arms do; an if-chain when every branch
/// and the else do. Loops never count.
fn stmt_returns(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Return(_) => true,
        Stmt::If(if_stmt) => {
            !if_stmt.then_body.is_empty()
                && !if_stmt.else_body.is_empty()
                && stmts_return(&if_stmt.then_body)
                && stmts_return(&if_stmt.else_body)
        }
        Stmt::IfChain(chain) => {
            !chain.branches.is_empty()
                && !chain.else_body.is_empty()
                && chain.branches.iter().all(|(_, body)| stmts_return(body))
                && stmts_return(&chain.else_body)
        }
        _ => false,
    }
}

pub(crate) fn stmts_return(stmts: &[Stmt]) -> bool {
    stmts.iter().any(stmt_returns)
}

#[cfg(test)]
mod tests {
    use crate::validate_source;

    #[test]
    fn test_void_function_cannot_return_value() {
        assert!(validate_source("main : void () { return 1; }").is_err());
    }

    #[test]
    fn test_non_void_return_requires_value() {
        assert!(validate_source("main : i32 () { return; }").is_err());
    }

    #[test]
    fn test_missing_return_detected() {
        let err = validate_source("foo : i32 () { x : i32 = 1; }").unwrap_err();
        assert!(
            err.message.contains("non-void function does not return on all paths"),
            "{}",
            err.message
        );
    }

    #[test]
    fn test_main_may_fall_through() {
        assert!(validate_source("main : i32 () { x : i32 = 1; }").is_ok());
    }

    #[test]
    fn test_if_else_both_arms_return() {
        assert!(validate_source("main : i32 () { if true { return 1; } else { return 2; } }").is_ok());
        assert!(validate_source("foo : i32 () { if true { return 1; } }").is_err());
    }

    #[test]
    fn test_if_chain_return_coverage() {
        assert!(validate_source(
            "foo : i32 () { |> true { return 1; } |> default { return 2; } }"
        )
        .is_ok());
        assert!(validate_source("foo : i32 () { |> true { return 1; } }").is_err());
    }

    #[test]
    fn test_break_and_skip_outside_loop() {
        assert!(validate_source("main : void () { break; }")
            .unwrap_err()
            .message
            .contains("break used outside of loop"));
        assert!(validate_source("main : void () { skip; }")
            .unwrap_err()
            .message
            .contains("skip used outside of loop"));
        assert!(validate_source("main : void () { while true { break; skip; } }").is_ok());
    }

    #[test]
    fn test_shadowing_rules() {
        assert!(validate_source("main : void () { x : i32 = 1; x : i32 = 2; }").is_err());
        assert!(validate_source("main : void () { x : i32 = 1; if true { x : i32 = 2; } }").is_ok());
    }

    #[test]
    fn test_for_loop_scope_allows_reuse() {
        assert!(validate_source(
            "main : void () { x : i32 = 0; for x : i32 = x; x < 1; x = x + 1 { x : i32 = 2; } }"
        )
        .is_ok());
    }

    #[test]
    fn test_condition_must_be_bool() {
        assert!(validate_source("main : void () { if 1 { return; } }").is_err());
        assert!(validate_source("main : void () { while 1 { break; } }").is_err());
        assert!(validate_source("main : void () { |> 1 { return; } }").is_err());
        assert!(
            validate_source("main : void () { for i : i32 = 0; 1; i = i + 1 { break; } }").is_err()
        );
    }

    #[test]
    fn test_immutability_rules() {
        assert!(validate_source("main : void () { x :: i32 = 1; x = 2; }")
            .unwrap_err()
            .message
            .contains("cannot assign to immutable local: x"));
        assert!(validate_source("main : void (x :: i32) { x = 2; }").is_err());
        assert!(validate_source(
            "Point :: artifact { x :: i32 }main : void () { p : Point = { 1 }; p.x = 2; }"
        )
        .unwrap_err()
        .message
        .contains("cannot assign to immutable field: p.x"));
        assert!(validate_source(
            "Point :: artifact { x :: i32 set : void () { self.x = 1; } }"
        )
        .unwrap_err()
        .message
        .contains("cannot assign to immutable field: self.x"));
        assert!(validate_source(
            "Math :: module { PI :: f64 = 3.14; }main : void () { Math.PI = 0.0; }"
        )
        .unwrap_err()
        .message
        .contains("cannot assign to immutable module member: Math.PI"));
    }

    #[test]
    fn test_assign_through_immutable_base() {
        assert!(validate_source(
            "Point :: artifact { x : i32 }main : void () { p :: Point = { 1 }; p.x = 2; }"
        )
        .unwrap_err()
        .message
        .contains("cannot assign through immutable value"));
        assert!(validate_source("main : void () { a :: i32[] = [1, 2]; a[0] = 3; }")
            .unwrap_err()
            .message
            .contains("cannot assign through immutable value"));
    }

    #[test]
    fn test_immutable_method_return_assignment() {
        assert!(validate_source(
            "Point :: artifact { x : i32 }make :: Point () { return { 1 }; }\
             main : void () { make().x = 2; }"
        )
        .is_err());
    }

    #[test]
    fn test_assign_to_functions_and_methods() {
        assert!(validate_source(
            "add : i32 (a : i32, b : i32) { return a + b; }main : void () { add = 1; }"
        )
        .unwrap_err()
        .message
        .contains("cannot assign to function: add"));
        assert!(validate_source(
            "Math :: module { add : i32 (a : i32, b : i32) { return a + b; } }\
             main : void () { Math.add = 1; }"
        )
        .is_err());
        assert!(validate_source(
            "Point :: artifact { x : i32 get : i32 () { return self.x; } }\
             main : void () { p : Point = { 1 }; p.get = 1; }"
        )
        .unwrap_err()
        .message
        .contains("cannot assign to method: p.get"));
        assert!(validate_source(
            "Point :: artifact { x : i32 get : i32 () { return self.x; } set : void () { self.get = 1; } }"
        )
        .unwrap_err()
        .message
        .contains("cannot assign to method: self.get"));
    }

    #[test]
    fn test_inc_dec_targets() {
        assert!(validate_source("main : void () { x :: i32 = 1; x++; }").is_err());
        assert!(validate_source("main : void () { (1 + 2)++; }").is_err());
    }

    #[test]
    fn test_compound_assign_types() {
        assert!(validate_source("main : void () { x : i32 = 1; x += 2; x <<= 1; }").is_ok());
        assert!(validate_source("main : void () { x : i32 = 1; x += 1.0; }").is_err());
        assert!(validate_source("main : void () { x : bool = true; x += false; }").is_err());
    }

    #[test]
    fn test_var_init_type_mismatch() {
        assert!(validate_source("main : void () { x : i32 = \"hi\"; }").is_err());
        assert!(validate_source("main : void () { x : i32 = 1; x = \"hi\"; }").is_err());
    }

    #[test]
    fn test_assignment_expression_statement() {
        assert!(validate_source("main : void () { x : i32 = 0; (x = 1); }").is_ok());
        assert!(validate_source("main : void () { x : i32 = 0; (x = \"hi\"); }").is_err());
    }

    #[test]
    fn test_return_type_checks() {
        assert!(validate_source("main : i32 () { return \"hi\"; }")
            .unwrap_err()
            .message
            .contains("return type mismatch"));
        assert!(validate_source("main : string () { return \"hi\"; }").is_ok());
    }

    #[test]
    fn test_integer_literal_widening_in_decl() {
        assert!(validate_source("main : void () { x : i64 = 1; y : u8 = 200; }").is_ok());
        assert!(validate_source("main : void () { x : i32 = 0xFFFFFFFF; }").is_ok());
    }
}

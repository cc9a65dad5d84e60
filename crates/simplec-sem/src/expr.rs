//! Expression checking and type inference.
//!
//! `check_expr` enforces the operator, call, member, and index rules;
//! `infer_expr_type` produces the type the surrounding checks compare
//! against. Inference is deliberately partial: literals that need a
//! target type (artifact/array/fn literals) return `None` and are
//! checked against their context instead.

use rustc_hash::{FxHashMap, FxHashSet};
use simplec_par::{
    type_equals, ArtifactLiteralExpr, BinOp, CallExpr, Expr, ExternDecl, FnLiteralExpr,
    MemberExpr, Mutability, TypeRef, UnOp,
};
use simplec_util::{
    closest_match, normalize_core_dl_member, reserved_member_signature, reserved_member_var,
    reserved_members, AbiType, Diag, DiagResult, Pos,
};

use crate::types::*;
use crate::{Context, FnChecker};

/// Resolved shape of a call target.
pub(crate) struct CallTargetInfo {
    pub params: Vec<TypeRef>,
    pub return_type: TypeRef,
    pub return_mutability: Mutability,
    pub type_params: Vec<String>,
    /// Unknown-arity `callback` target: arity and argument types are
    /// not checked.
    pub is_callback: bool,
}

impl CallTargetInfo {
    fn simple(params: Vec<TypeRef>, return_type: TypeRef, return_mutability: Mutability) -> Self {
        Self {
            params,
            return_type,
            return_mutability,
            type_params: Vec::new(),
            is_callback: false,
        }
    }

    fn of_func(func: &simplec_par::FuncDecl) -> Self {
        Self {
            params: func.params.iter().map(|p| p.ty.clone()).collect(),
            return_type: func.return_type.clone(),
            return_mutability: func.return_mutability,
            type_params: func.generics.clone(),
            is_callback: false,
        }
    }

    fn of_extern(ext: &ExternDecl) -> Self {
        Self::simple(
            ext.params.iter().map(|p| p.ty.clone()).collect(),
            ext.return_type.clone(),
            ext.return_mutability,
        )
    }

    fn of_proc(ty: &TypeRef) -> Self {
        Self {
            params: ty.proc_params.clone(),
            return_type: ty
                .proc_return
                .as_deref()
                .cloned()
                .unwrap_or_else(TypeRef::void),
            return_mutability: ty.proc_return_mutability,
            type_params: Vec::new(),
            is_callback: ty.proc_is_callback,
        }
    }
}

fn abi_type_ref(abi: AbiType) -> TypeRef {
    match abi {
        AbiType::I32 => TypeRef::named("i32"),
        AbiType::I64 => TypeRef::named("i64"),
        AbiType::F32 => TypeRef::named("f32"),
        AbiType::F64 => TypeRef::named("f64"),
        AbiType::Bool => TypeRef::named("bool"),
        AbiType::String => TypeRef::named("string"),
        AbiType::Void => TypeRef::void(),
        AbiType::I32List => TypeRef::list_of("i32"),
        AbiType::TypeParam => TypeRef::named("T"),
    }
}

fn reserved_call_target(ctx: &Context, module: &str, member: &str) -> Option<CallTargetInfo> {
    let resolved = ctx.resolve_reserved_module(module)?;
    let member = if resolved == "Core.DL" {
        normalize_core_dl_member(member)
    } else {
        member
    };
    let sig = reserved_member_signature(&resolved, member)?;
    Some(CallTargetInfo {
        params: sig.params.iter().map(|p| abi_type_ref(*p)).collect(),
        return_type: abi_type_ref(sig.ret),
        return_mutability: Mutability::Mutable,
        type_params: if sig.generic {
            vec!["T".to_string()]
        } else {
            Vec::new()
        },
        is_callback: false,
    })
}

fn reserved_var_type(ctx: &Context, module: &str, member: &str) -> Option<TypeRef> {
    let resolved = ctx.resolve_reserved_module(module)?;
    reserved_member_var(&resolved, member).map(abi_type_ref)
}

/// `Ident` or the `Core.X` / `System.X` dotted form.
pub(crate) fn module_name_from_expr(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.name.clone()),
        Expr::Member(member) => match &member.base {
            Expr::Identifier(root) if root.name == "Core" || root.name == "System" => {
                Some(format!("{}.{}", root.name, member.name))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Checks a fn literal against the procedure type it initializes.
pub(crate) fn check_fn_literal_against_type(
    lit: &FnLiteralExpr,
    target: &TypeRef,
) -> DiagResult<()> {
    if !target.is_proc {
        return Err(Diag::new(lit.pos, "fn literal requires procedure type"));
    }
    if target.proc_is_callback {
        return Ok(());
    }
    if lit.params.len() != target.proc_params.len() {
        return Err(Diag::new(
            lit.pos,
            format!(
                "fn literal parameter count mismatch: expected {}, got {}",
                target.proc_params.len(),
                lit.params.len()
            ),
        ));
    }
    for (param, expected) in lit.params.iter().zip(&target.proc_params) {
        if !type_equals(&param.ty, expected) {
            return Err(Diag::new(param.pos, "fn literal parameter type mismatch"));
        }
    }
    Ok(())
}

impl<'a, 'p> FnChecker<'a, 'p> {
    // =========================================================================
    // Inference
    // =========================================================================

    /// Infers the type of an expression, or `None` when the expression
    /// needs a target type (artifact/array/fn literals) or refers to
    /// something inference does not model.
    pub(crate) fn infer_expr_type(&self, expr: &Expr) -> Option<TypeRef> {
        match expr {
            Expr::Literal(lit) => Some(TypeRef::named(match lit.kind {
                simplec_par::LiteralKind::Integer => "i32",
                simplec_par::LiteralKind::Float => "f64",
                simplec_par::LiteralKind::String => "string",
                simplec_par::LiteralKind::Char => "char",
                simplec_par::LiteralKind::Bool => "bool",
            })),
            Expr::Identifier(ident) => {
                if let Some(local) = self.scopes.find(&ident.name) {
                    return Some(local.ty.clone());
                }
                if let Some(global) = self.ctx.globals.get(&ident.name) {
                    return Some(global.ty.resolve_fn_shorthand(global.init.as_ref()));
                }
                None
            }
            Expr::SelfRef(_) => {
                let artifact = self.current_artifact?;
                Some(TypeRef::named(&artifact.name))
            }
            Expr::Unary(unary) => {
                let operand = self.infer_expr_type(&unary.operand)?;
                if !operand.is_scalar() {
                    return None;
                }
                match unary.op {
                    UnOp::Not => is_bool_type_name(&operand.name).then(|| TypeRef::named("bool")),
                    UnOp::Neg | UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                        is_numeric_type_name(&operand.name).then_some(operand)
                    }
                }
            }
            Expr::Binary(binary) => {
                let lhs = self.infer_expr_type(&binary.lhs)?;
                let rhs = self.infer_expr_type(&binary.rhs)?;
                if !lhs.is_scalar() || !rhs.is_scalar() {
                    return None;
                }
                let common = if type_equals(&lhs, &rhs) {
                    lhs
                } else if literal_compatible_with_scalar(&binary.lhs, &rhs) {
                    rhs
                } else if literal_compatible_with_scalar(&binary.rhs, &lhs) {
                    lhs
                } else {
                    return None;
                };
                if binary.op.is_comparison()
                    || matches!(binary.op, BinOp::LogicalAnd | BinOp::LogicalOr)
                {
                    return Some(TypeRef::named("bool"));
                }
                Some(common)
            }
            Expr::Assign(assign) => self.infer_expr_type(&assign.target),
            Expr::Member(member) => self.infer_member_type(member),
            Expr::Index(index) => {
                let base = self.infer_expr_type(&index.base)?;
                base.element_type()
            }
            Expr::Call(call) => self.infer_call_type(call),
            Expr::Bracket(_) | Expr::Artifact(_) | Expr::FnLiteral(_) => None,
        }
    }

    fn infer_member_type(&self, member: &MemberExpr) -> Option<TypeRef> {
        if let Expr::SelfRef(_) = member.base {
            let artifact = self.current_artifact?;
            if let Some(field) = Context::find_artifact_field(Some(artifact), &member.name) {
                return Some(field.ty.clone());
            }
            if let Some(method) = Context::find_artifact_method(Some(artifact), &member.name) {
                return Some(method.return_type.clone());
            }
            return None;
        }
        if let Some(module) = module_name_from_expr(&member.base) {
            if let Some(ty) = reserved_var_type(self.ctx, &module, &member.name) {
                return Some(ty);
            }
        }
        if let Expr::Identifier(base) = &member.base {
            // Enum member values deliberately stay uninferred: an enum
            // constant may flow anywhere its integer value does, and
            // enum-typed bindings reject scalars through the declared
            // side instead.
            if self.ctx.enums.contains_key(&base.name) {
                return None;
            }
            if let Some(module) = self.ctx.modules.get(&base.name) {
                if let Some(var) = Context::find_module_var(module, &member.name) {
                    return Some(var.ty.resolve_fn_shorthand(var.init.as_ref()));
                }
                return None;
            }
        }
        let base_type = self.infer_expr_type(&member.base)?;
        let artifact = self.ctx.artifacts.get(&base_type.name)?;
        let field = Context::find_artifact_field(Some(artifact), &member.name)?;
        let mapping = build_artifact_type_param_map(&base_type, &artifact.generics).ok()?;
        Some(substitute_type_params(&field.ty, &mapping))
    }

    fn infer_call_type(&self, call: &CallExpr) -> Option<TypeRef> {
        if let Expr::Identifier(ident) = &call.callee {
            if ident.name == "len" {
                return Some(TypeRef::named("i32"));
            }
            if ident.name == "str" {
                return Some(TypeRef::named("string"));
            }
            if let Some(target) = at_cast_target(&ident.name) {
                return Some(TypeRef::named(target));
            }
        }
        // IO.print/println yield void regardless of arity.
        if self.is_io_print_callee(&call.callee) {
            return Some(TypeRef::void());
        }
        if let Expr::Member(member) = &call.callee {
            if let Some(module) = module_name_from_expr(&member.base) {
                if let Some(resolved) = self.ctx.resolve_reserved_module(&module) {
                    // Math.abs/min/max mirror their argument type.
                    if resolved == "Math"
                        && matches!(member.name.as_str(), "abs" | "min" | "max")
                        && !call.args.is_empty()
                    {
                        return self.infer_expr_type(&call.args[0]);
                    }
                }
            }
        }
        let info = self.call_target_info(&call.callee).ok()??;
        if info.type_params.is_empty() {
            return Some(info.return_type);
        }
        let mapping = self.generic_call_mapping(&info, call)?;
        Some(substitute_type_params(&info.return_type, &mapping))
    }

    fn generic_call_mapping(
        &self,
        info: &CallTargetInfo,
        call: &CallExpr,
    ) -> Option<FxHashMap<String, TypeRef>> {
        let mut mapping = FxHashMap::default();
        if !call.type_args.is_empty() {
            if call.type_args.len() != info.type_params.len() {
                return None;
            }
            for (name, arg) in info.type_params.iter().zip(&call.type_args) {
                mapping.insert(name.clone(), arg.clone());
            }
            return Some(mapping);
        }
        let type_params: FxHashSet<String> = info.type_params.iter().cloned().collect();
        if info.params.len() != call.args.len() {
            return None;
        }
        for (param, arg) in info.params.iter().zip(&call.args) {
            let arg_type = self.infer_expr_type(arg)?;
            if !unify_type_params(param, &arg_type, &type_params, &mut mapping) {
                return None;
            }
        }
        if info.type_params.iter().any(|p| !mapping.contains_key(p)) {
            return None;
        }
        Some(mapping)
    }

    // =========================================================================
    // Checking
    // =========================================================================

    pub(crate) fn check_expr(&self, expr: &Expr) -> DiagResult<()> {
        match expr {
            Expr::Literal(_) | Expr::FnLiteral(_) => Ok(()),
            Expr::SelfRef(pos) => {
                if self.current_artifact.is_none() {
                    return Err(Diag::new(*pos, "self used outside of artifact method"));
                }
                Ok(())
            }
            Expr::Identifier(ident) => self.check_identifier(&ident.name, ident.pos),
            Expr::Unary(unary) => {
                self.check_expr(&unary.operand)?;
                if unary.op.is_inc_dec() {
                    self.check_assignment_target(&unary.operand, unary.pos)?;
                }
                self.check_unary_op_types(unary)
            }
            Expr::Binary(binary) => {
                self.check_expr(&binary.lhs)?;
                self.check_expr(&binary.rhs)?;
                self.check_binary_op_types(binary)
            }
            Expr::Assign(assign) => {
                self.check_expr(&assign.target)?;
                self.check_assignment_target(&assign.target, assign.pos)?;
                self.check_expr(&assign.value)?;
                self.check_assignment_types(
                    &assign.target,
                    assign.op,
                    &assign.value,
                    assign.pos,
                )
            }
            Expr::Call(call) => self.check_call(call),
            Expr::Member(member) => self.check_member(member),
            Expr::Index(index) => self.check_index(index),
            Expr::Bracket(bracket) => {
                for elem in &bracket.elems {
                    self.check_expr(elem)?;
                }
                Ok(())
            }
            Expr::Artifact(lit) => {
                for value in &lit.positional {
                    self.check_expr(value)?;
                }
                for (_, value) in &lit.named {
                    self.check_expr(value)?;
                }
                Ok(())
            }
        }
    }

    fn check_identifier(&self, name: &str, pos: Pos) -> DiagResult<()> {
        if name == "Core"
            && ["Core.DL", "Core.Os", "Core.Fs", "Core.Log"]
                .iter()
                .any(|m| self.ctx.reserved_imports.contains(*m))
        {
            return Ok(());
        }
        if let Some(artifact) = self.current_artifact {
            if Context::find_artifact_field(Some(artifact), name).is_some()
                || Context::find_artifact_method(Some(artifact), name).is_some()
            {
                return Err(Diag::new(
                    pos,
                    format!("artifact members must be accessed via self: {}", name),
                ));
            }
        }
        if name == "len" || name == "str" || is_primitive_cast_name(name) || at_cast_target(name).is_some() {
            return Ok(());
        }
        if self.scopes.find(name).is_some() {
            return Ok(());
        }
        if self.ctx.top_level.contains(name) {
            if self.ctx.modules.contains_key(name) {
                return Err(Diag::new(pos, format!("module is not a value: {}", name)));
            }
            if self.ctx.artifacts.contains_key(name) {
                return Err(Diag::new(pos, format!("type is not a value: {}", name)));
            }
            if self.ctx.enums.contains_key(name) {
                return Err(Diag::new(
                    pos,
                    format!("enum type is not a value: {}", name),
                ));
            }
            return Ok(());
        }
        if self.ctx.is_reserved_module_enabled(name) {
            return Err(Diag::new(pos, format!("module is not a value: {}", name)));
        }
        if self.ctx.externs_by_module.contains_key(name) {
            return Ok(());
        }
        if self.ctx.enum_members.contains(name) {
            return Err(Diag::new(
                pos,
                format!("unqualified enum value: {}", name),
            ));
        }
        Err(Diag::new(pos, format!("undeclared identifier: {}", name)))
    }

    fn check_unary_op_types(&self, unary: &simplec_par::UnaryExpr) -> DiagResult<()> {
        let Some(operand) = self.infer_expr_type(&unary.operand) else {
            return Ok(());
        };
        if !operand.is_scalar() {
            return Err(Diag::new(
                unary.pos,
                format!("operator '{}' requires scalar operands", unary.op.as_str()),
            ));
        }
        match unary.op {
            UnOp::Not => {
                if !is_bool_type_name(&operand.name) {
                    return Err(Diag::new(unary.pos, "operator '!' requires bool operand"));
                }
            }
            UnOp::Neg | UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                if !is_numeric_type_name(&operand.name) {
                    let op = match unary.op {
                        UnOp::Neg => "-",
                        UnOp::PreInc | UnOp::PostInc => "++",
                        _ => "--",
                    };
                    return Err(Diag::new(
                        unary.pos,
                        format!("operator '{}' requires numeric operand", op),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_binary_op_types(&self, binary: &simplec_par::BinaryExpr) -> DiagResult<()> {
        let (Some(lhs), Some(rhs)) = (
            self.infer_expr_type(&binary.lhs),
            self.infer_expr_type(&binary.rhs),
        ) else {
            return Ok(());
        };
        let op = binary.op.as_str();
        if !lhs.is_scalar() || !rhs.is_scalar() {
            return Err(Diag::new(
                binary.pos,
                format!("operator '{}' requires scalar operands", op),
            ));
        }
        if !type_equals(&lhs, &rhs)
            && !(literal_compatible_with_scalar(&binary.lhs, &rhs)
                || literal_compatible_with_scalar(&binary.rhs, &lhs))
        {
            return Err(Diag::new(
                binary.pos,
                format!("operator '{}' requires matching operand types", op),
            ));
        }

        match binary.op {
            BinOp::LogicalAnd | BinOp::LogicalOr => {
                if !is_bool_type_name(&lhs.name) {
                    return Err(Diag::new(
                        binary.pos,
                        format!("operator '{}' requires bool operands", op),
                    ));
                }
            }
            BinOp::Eq | BinOp::Ne => {
                if is_string_type_name(&lhs.name) {
                    return Err(Diag::new(
                        binary.pos,
                        format!("operator '{}' does not support string operands", op),
                    ));
                }
                if !is_numeric_type_name(&lhs.name) && !is_bool_type_name(&lhs.name) {
                    return Err(Diag::new(
                        binary.pos,
                        format!("operator '{}' requires numeric or bool operands", op),
                    ));
                }
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                if !is_numeric_type_name(&lhs.name) {
                    return Err(Diag::new(
                        binary.pos,
                        format!("operator '{}' requires numeric operands", op),
                    ));
                }
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                if !is_numeric_type_name(&lhs.name) {
                    return Err(Diag::new(
                        binary.pos,
                        format!("operator '{}' requires numeric operands", op),
                    ));
                }
            }
            BinOp::Rem => {
                if !is_integer_type_name(&lhs.name) {
                    return Err(Diag::new(
                        binary.pos,
                        "operator '%' requires integer operands",
                    ));
                }
            }
            BinOp::Shl | BinOp::Shr | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
                if !is_integer_type_name(&lhs.name) {
                    return Err(Diag::new(
                        binary.pos,
                        format!("operator '{}' requires integer operands", op),
                    ));
                }
            }
        }
        Ok(())
    }

    /// The shared type checks for both statement- and expression-form
    /// assignments (plain and compound).
    pub(crate) fn check_assignment_types(
        &self,
        target: &Expr,
        op: simplec_par::AssignOp,
        value: &Expr,
        pos: Pos,
    ) -> DiagResult<()> {
        let target_type = self.infer_expr_type(target);
        let value_type = self.infer_expr_type(value);

        if let (Some(target_type), Some(value_type)) = (&target_type, &value_type) {
            if let Some(bin_op) = op.binary_op() {
                return self.check_compound_assign_op(bin_op, target_type, value_type, pos);
            }
            if let Expr::FnLiteral(lit) = value {
                check_fn_literal_against_type(lit, target_type)?;
            }
            if matches!(value, Expr::Bracket(_)) {
                return self.check_bracket_against_type(value, target_type);
            }
            if !types_compatible_for_expr(target_type, value_type, value) {
                return Err(Diag::new(pos, "assignment type mismatch"));
            }
            return Ok(());
        }
        if let Some(target_type) = &target_type {
            if let Expr::FnLiteral(lit) = value {
                check_fn_literal_against_type(lit, target_type)?;
            }
            if matches!(value, Expr::Bracket(_)) {
                return self.check_bracket_against_type(value, target_type);
            }
        }
        Ok(())
    }

    fn check_compound_assign_op(
        &self,
        op: BinOp,
        lhs: &TypeRef,
        rhs: &TypeRef,
        pos: Pos,
    ) -> DiagResult<()> {
        let op_str = op.as_str();
        if !lhs.is_scalar() || !rhs.is_scalar() {
            return Err(Diag::new(
                pos,
                format!("operator '{}' requires scalar operands", op_str),
            ));
        }
        if !type_equals(lhs, rhs) {
            return Err(Diag::new(pos, "assignment type mismatch"));
        }
        match op {
            BinOp::Rem => {
                if !is_integer_type_name(&lhs.name) {
                    return Err(Diag::new(pos, "operator '%' requires integer operands"));
                }
            }
            BinOp::Shl | BinOp::Shr | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
                if !is_integer_type_name(&lhs.name) {
                    return Err(Diag::new(
                        pos,
                        format!("operator '{}' requires integer operands", op_str),
                    ));
                }
            }
            _ => {
                if !is_numeric_type_name(&lhs.name) {
                    return Err(Diag::new(
                        pos,
                        format!("operator '{}' requires numeric operands", op_str),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_index(&self, index: &simplec_par::IndexExpr) -> DiagResult<()> {
        self.check_expr(&index.base)?;
        self.check_expr(&index.index)?;

        if let Some(base_type) = self.infer_expr_type(&index.base) {
            if base_type.dims.is_empty() {
                return Err(Diag::new(
                    index.pos,
                    "indexing is only valid on arrays and lists",
                ));
            }
        } else if matches!(index.base, Expr::Literal(_)) {
            return Err(Diag::new(
                index.pos,
                "indexing is only valid on arrays and lists",
            ));
        }

        if let Expr::Literal(lit) = &index.index {
            if !matches!(
                lit.kind,
                simplec_par::LiteralKind::Integer | simplec_par::LiteralKind::Char
            ) {
                return Err(Diag::new(index.pos, "index must be an integer"));
            }
        } else if let Some(index_type) = self.infer_expr_type(&index.index) {
            if !is_integer_type_name(&index_type.name) && index_type.name != "char" {
                return Err(Diag::new(index.pos, "index must be an integer"));
            }
        }
        Ok(())
    }

    fn check_member(&self, member: &MemberExpr) -> DiagResult<()> {
        if self.is_io_print_member(member) {
            return Ok(());
        }
        if let Expr::Identifier(base) = &member.base {
            // Enum member access.
            if let Some(members) = self.ctx.enum_members_by_type.get(&base.name) {
                if !members.contains(&member.name) {
                    return Err(Diag::new(
                        member.pos,
                        format!("unknown enum member: {}.{}", base.name, member.name),
                    ));
                }
                return Ok(());
            }
            // Dynamic-DL bound local.
            if let Some(local) = self.scopes.find(&base.name) {
                if let Some(dl_module) = &local.dl_module {
                    if let Some(symbols) = self.ctx.externs_by_module.get(dl_module) {
                        if symbols.contains_key(&member.name) {
                            return Ok(());
                        }
                    }
                    return Err(Diag::new(
                        member.pos,
                        format!("unknown dynamic symbol: {}.{}", base.name, member.name),
                    ));
                }
            }
            // User module member.
            if let Some(module) = self.ctx.modules.get(&base.name) {
                if Context::find_module_var(module, &member.name).is_none()
                    && Context::find_module_func(module, &member.name).is_none()
                {
                    return Err(Diag::new(
                        member.pos,
                        format!("unknown module member: {}.{}", base.name, member.name),
                    ));
                }
                return Ok(());
            }
        }
        // Reserved module member.
        if let Some(module) = module_name_from_expr(&member.base) {
            if let Some(resolved) = self.ctx.resolve_reserved_module(&module) {
                if reserved_var_type(self.ctx, &module, &member.name).is_some()
                    || reserved_call_target(self.ctx, &module, &member.name).is_some()
                {
                    return Ok(());
                }
                let mut message =
                    format!("unknown module member: {}.{}", module, member.name);
                let members = reserved_members(&resolved);
                if let Some(best) = closest_match(&member.name, &members) {
                    message.push_str(&format!(" (did you mean '{}'?)", best));
                }
                return Err(Diag::new(member.pos, message));
            }
        }

        self.check_expr(&member.base)?;

        // Artifact field/method on an inferable base.
        if let Some(base_type) = self.infer_expr_type(&member.base) {
            if let Some(artifact) = self.ctx.artifacts.get(&base_type.name) {
                if Context::find_artifact_field(Some(artifact), &member.name).is_none()
                    && Context::find_artifact_method(Some(artifact), &member.name).is_none()
                {
                    return Err(Diag::new(
                        member.pos,
                        format!(
                            "unknown artifact member: {}.{}",
                            base_type.name, member.name
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    fn is_io_print_name(name: &str) -> bool {
        name == "print" || name == "println"
    }

    fn is_io_print_member(&self, member: &MemberExpr) -> bool {
        if !Self::is_io_print_name(&member.name) {
            return false;
        }
        match module_name_from_expr(&member.base) {
            Some(module) => {
                module == "IO"
                    || self
                        .ctx
                        .resolve_reserved_module(&module)
                        .is_some_and(|m| m == "IO")
            }
            None => false,
        }
    }

    fn is_io_print_callee(&self, callee: &Expr) -> bool {
        matches!(callee, Expr::Member(member) if self.is_io_print_member(member))
    }

    // =========================================================================
    // Calls
    // =========================================================================

    fn check_call(&self, call: &CallExpr) -> DiagResult<()> {
        self.check_expr(&call.callee)?;
        for arg in &call.args {
            self.check_expr(arg)?;
        }
        self.check_call_target(call)?;

        if self.is_io_print_callee(&call.callee) {
            return self.check_io_print_call(call);
        }

        if let Expr::Identifier(ident) = &call.callee {
            if ident.name == "len" {
                return self.check_len_call(call);
            }
            if ident.name == "str" {
                return self.check_str_call(call);
            }
            if is_primitive_cast_name(&ident.name) {
                return Err(Diag::new(
                    call.pos,
                    "primitive cast syntax requires '@'",
                ));
            }
            if let Some(target) = at_cast_target(&ident.name) {
                return self.check_cast_call(call, target);
            }
        }

        self.check_call_arg_types(call)
    }

    /// Arity and callability, mirroring the call-target resolution
    /// order used by the emitter.
    fn check_call_target(&self, call: &CallExpr) -> DiagResult<()> {
        let arg_count = call.args.len();
        let callee = &call.callee;

        if let Expr::FnLiteral(lit) = callee {
            if lit.params.len() != arg_count {
                return Err(Diag::new(
                    call.pos,
                    format!(
                        "call argument count mismatch for fn literal: expected {}, got {}",
                        lit.params.len(),
                        arg_count
                    ),
                ));
            }
            return Ok(());
        }

        if let Expr::Identifier(ident) = callee {
            if ident.name == "len"
                || ident.name == "str"
                || at_cast_target(&ident.name).is_some()
                || is_primitive_cast_name(&ident.name)
            {
                return Ok(());
            }
            if let Some(func) = self.ctx.functions.get(&ident.name) {
                return check_named_arity(&func.name, func.params.len(), arg_count, call.pos);
            }
            if let Some(ext) = self.ctx.externs.get(&ident.name) {
                if ext.params.len() != arg_count {
                    return Err(Diag::new(
                        call.pos,
                        format!(
                            "call argument count mismatch for extern {}: expected {}, got {}",
                            ident.name,
                            ext.params.len(),
                            arg_count
                        ),
                    ));
                }
                return Ok(());
            }
            if let Some(local) = self.scopes.find(&ident.name) {
                let ty = &local.ty;
                if ty.is_proc {
                    return check_proc_arity(ty, arg_count, call.pos);
                }
                return Err(Diag::new(
                    call.pos,
                    format!("attempt to call non-function: {}", ident.name),
                ));
            }
            if let Some(global) = self.ctx.globals.get(&ident.name) {
                let ty = global.ty.resolve_fn_shorthand(global.init.as_ref());
                if ty.is_proc {
                    return check_proc_arity(&ty, arg_count, call.pos);
                }
                return Err(Diag::new(
                    call.pos,
                    format!("attempt to call non-function: {}", ident.name),
                ));
            }
            return Ok(());
        }

        let Expr::Member(member) = callee else {
            return Ok(());
        };

        if self.is_io_print_member(member) {
            if arg_count == 0 {
                return Err(Diag::new(
                    call.pos,
                    format!("call argument count mismatch for IO.{}", member.name),
                ));
            }
            return Ok(());
        }

        if let Expr::SelfRef(_) = member.base {
            if let Some(method) =
                Context::find_artifact_method(self.current_artifact, &member.name)
            {
                return check_named_arity(&method.name, method.params.len(), arg_count, call.pos);
            }
            if let Some(field) = Context::find_artifact_field(self.current_artifact, &member.name)
            {
                if field.ty.is_proc {
                    return check_proc_arity(&field.ty, arg_count, call.pos);
                }
                return Err(Diag::new(
                    call.pos,
                    format!("attempt to call non-function: self.{}", member.name),
                ));
            }
            return Ok(());
        }

        if let Expr::Identifier(base) = &member.base {
            // Dynamic-DL bound local: member calls check against the
            // manifest's extern signatures.
            if let Some(local) = self.scopes.find(&base.name) {
                if let Some(dl_module) = &local.dl_module {
                    if let Some(symbols) = self.ctx.externs_by_module.get(dl_module) {
                        let Some(ext) = symbols.get(&member.name) else {
                            return Err(Diag::new(
                                call.pos,
                                format!(
                                    "unknown dynamic symbol: {}.{}",
                                    base.name, member.name
                                ),
                            ));
                        };
                        check_dl_dynamic_signature(ext, self.ctx, call.pos)?;
                        if ext.params.len() != arg_count {
                            return Err(Diag::new(
                                call.pos,
                                format!(
                                    "call argument count mismatch for dynamic symbol {}.{}: expected {}, got {}",
                                    base.name,
                                    member.name,
                                    ext.params.len(),
                                    arg_count
                                ),
                            ));
                        }
                        return Ok(());
                    }
                }
            }
            if let Some(module) = self.ctx.modules.get(&base.name) {
                if let Some(func) = Context::find_module_func(module, &member.name) {
                    return check_named_arity(
                        &func.name,
                        func.params.len(),
                        arg_count,
                        call.pos,
                    );
                }
                if let Some(var) = Context::find_module_var(module, &member.name) {
                    let ty = var.ty.resolve_fn_shorthand(var.init.as_ref());
                    if ty.is_proc {
                        return check_proc_arity(&ty, arg_count, call.pos);
                    }
                    return Err(Diag::new(
                        call.pos,
                        format!(
                            "attempt to call non-function: {}.{}",
                            base.name, member.name
                        ),
                    ));
                }
                return Ok(());
            }
        }

        if let Some(module) = module_name_from_expr(&member.base) {
            if let Some(resolved) = self.ctx.resolve_reserved_module(&module) {
                if let Some(info) = reserved_call_target(self.ctx, &module, &member.name) {
                    let is_core_dl_open = resolved == "Core.DL"
                        && normalize_core_dl_member(&member.name) == "open";
                    if is_core_dl_open {
                        if arg_count != 1 && arg_count != 2 {
                            return Err(Diag::new(
                                call.pos,
                                format!(
                                    "call argument count mismatch for {}.{}: expected 1 or 2, got {}",
                                    module, member.name, arg_count
                                ),
                            ));
                        }
                        return Ok(());
                    }
                    if info.params.len() != arg_count {
                        return Err(Diag::new(
                            call.pos,
                            format!(
                                "call argument count mismatch for {}.{}: expected {}, got {}",
                                module,
                                member.name,
                                info.params.len(),
                                arg_count
                            ),
                        ));
                    }
                    return Ok(());
                }
            }
            if let Some(symbols) = self.ctx.externs_by_module.get(&module) {
                let Some(ext) = symbols.get(&member.name) else {
                    return Err(Diag::new(
                        call.pos,
                        format!("unknown extern member: {}.{}", module, member.name),
                    ));
                };
                if ext.params.len() != arg_count {
                    return Err(Diag::new(
                        call.pos,
                        format!(
                            "call argument count mismatch for extern {}.{}: expected {}, got {}",
                            module,
                            member.name,
                            ext.params.len(),
                            arg_count
                        ),
                    ));
                }
                return Ok(());
            }
        }

        // Method or proc-typed field on an artifact value.
        if let Some(base_type) = self.infer_expr_type(&member.base) {
            if let Some(artifact) = self.ctx.artifacts.get(&base_type.name) {
                if let Some(method) = Context::find_artifact_method(Some(artifact), &member.name) {
                    return check_named_arity(
                        &method.name,
                        method.params.len(),
                        arg_count,
                        call.pos,
                    );
                }
                if let Some(field) = Context::find_artifact_field(Some(artifact), &member.name) {
                    if field.ty.is_proc {
                        return check_proc_arity(&field.ty, arg_count, call.pos);
                    }
                    let base_name = match &member.base {
                        Expr::Identifier(ident) => ident.name.clone(),
                        _ => base_type.name.clone(),
                    };
                    return Err(Diag::new(
                        call.pos,
                        format!(
                            "attempt to call non-function: {}.{}",
                            base_name, member.name
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Resolves the call target's parameter/return shape; `Ok(None)`
    /// when the callee is something inference tolerates.
    pub(crate) fn call_target_info(&self, callee: &Expr) -> DiagResult<Option<CallTargetInfo>> {
        if let Expr::FnLiteral(lit) = callee {
            return Ok(Some(CallTargetInfo {
                params: lit.params.iter().map(|p| p.ty.clone()).collect(),
                return_type: lit
                    .return_type
                    .clone()
                    .unwrap_or_else(TypeRef::void),
                return_mutability: Mutability::Mutable,
                type_params: Vec::new(),
                is_callback: false,
            }));
        }
        if let Expr::Identifier(ident) = callee {
            if let Some(func) = self.ctx.functions.get(&ident.name) {
                return Ok(Some(CallTargetInfo::of_func(func)));
            }
            if let Some(ext) = self.ctx.externs.get(&ident.name) {
                return Ok(Some(CallTargetInfo::of_extern(ext)));
            }
            if let Some(local) = self.scopes.find(&ident.name) {
                if local.ty.is_proc {
                    return Ok(Some(CallTargetInfo::of_proc(&local.ty)));
                }
                return Ok(None);
            }
            if let Some(global) = self.ctx.globals.get(&ident.name) {
                let ty = global.ty.resolve_fn_shorthand(global.init.as_ref());
                if ty.is_proc {
                    return Ok(Some(CallTargetInfo::of_proc(&ty)));
                }
            }
            return Ok(None);
        }
        let Expr::Member(member) = callee else {
            return Ok(None);
        };
        if self.is_io_print_member(member) {
            return Ok(Some(CallTargetInfo {
                params: vec![TypeRef::named("T")],
                return_type: TypeRef::void(),
                return_mutability: Mutability::Mutable,
                type_params: vec!["T".to_string()],
                is_callback: false,
            }));
        }
        if let Expr::SelfRef(_) = member.base {
            if let Some(method) =
                Context::find_artifact_method(self.current_artifact, &member.name)
            {
                return Ok(Some(CallTargetInfo::of_func(method)));
            }
            return Ok(None);
        }
        if let Expr::Identifier(base) = &member.base {
            if let Some(local) = self.scopes.find(&base.name) {
                if let Some(dl_module) = &local.dl_module {
                    if let Some(ext) = self
                        .ctx
                        .externs_by_module
                        .get(dl_module)
                        .and_then(|symbols| symbols.get(&member.name))
                    {
                        check_dl_dynamic_signature(ext, self.ctx, member.pos)?;
                        return Ok(Some(CallTargetInfo::of_extern(ext)));
                    }
                }
            }
            if let Some(module) = self.ctx.modules.get(&base.name) {
                if let Some(func) = Context::find_module_func(module, &member.name) {
                    return Ok(Some(CallTargetInfo::of_func(func)));
                }
                if let Some(var) = Context::find_module_var(module, &member.name) {
                    let ty = var.ty.resolve_fn_shorthand(var.init.as_ref());
                    if ty.is_proc {
                        return Ok(Some(CallTargetInfo::of_proc(&ty)));
                    }
                }
                return Ok(None);
            }
        }
        if let Some(module) = module_name_from_expr(&member.base) {
            if let Some(info) = reserved_call_target(self.ctx, &module, &member.name) {
                return Ok(Some(info));
            }
            if let Some(ext) = self
                .ctx
                .externs_by_module
                .get(&module)
                .and_then(|symbols| symbols.get(&member.name))
            {
                return Ok(Some(CallTargetInfo::of_extern(ext)));
            }
        }
        if let Some(base_type) = self.infer_expr_type(&member.base) {
            if let Some(artifact) = self.ctx.artifacts.get(&base_type.name) {
                let mapping = build_artifact_type_param_map(&base_type, &artifact.generics)?;
                if let Some(method) = Context::find_artifact_method(Some(artifact), &member.name) {
                    let mut info = CallTargetInfo::of_func(method);
                    info.params = info
                        .params
                        .iter()
                        .map(|p| substitute_type_params(p, &mapping))
                        .collect();
                    info.return_type = substitute_type_params(&info.return_type, &mapping);
                    return Ok(Some(info));
                }
                if let Some(field) = Context::find_artifact_field(Some(artifact), &member.name) {
                    let resolved = substitute_type_params(&field.ty, &mapping);
                    if resolved.is_proc {
                        return Ok(Some(CallTargetInfo::of_proc(&resolved)));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Generic handling plus per-argument type compatibility.
    fn check_call_arg_types(&self, call: &CallExpr) -> DiagResult<()> {
        self.check_reserved_call_specifics(call)?;

        let Some(info) = self.call_target_info(&call.callee)? else {
            return Ok(());
        };
        if info.is_callback {
            return Ok(());
        }

        if info.type_params.is_empty() && !call.type_args.is_empty() {
            return Err(Diag::new(
                call.pos,
                "non-generic call cannot take type arguments",
            ));
        }
        let mut mapping = FxHashMap::default();
        if !info.type_params.is_empty() {
            if !call.type_args.is_empty() {
                if call.type_args.len() != info.type_params.len() {
                    return Err(Diag::new(
                        call.pos,
                        format!(
                            "generic type argument count mismatch: expected {}, got {}",
                            info.type_params.len(),
                            call.type_args.len()
                        ),
                    ));
                }
                for (name, arg) in info.type_params.iter().zip(&call.type_args) {
                    mapping.insert(name.clone(), arg.clone());
                }
            } else {
                let type_params: FxHashSet<String> = info.type_params.iter().cloned().collect();
                let mut inferred = FxHashMap::default();
                let mut ok = info.params.len() == call.args.len();
                if ok {
                    for (param, arg) in info.params.iter().zip(&call.args) {
                        let Some(arg_type) = self.infer_expr_type(arg) else {
                            ok = false;
                            break;
                        };
                        if !unify_type_params(param, &arg_type, &type_params, &mut inferred) {
                            ok = false;
                            break;
                        }
                    }
                }
                if ok {
                    ok = info.type_params.iter().all(|p| inferred.contains_key(p));
                }
                if !ok {
                    return Err(Diag::new(call.pos, "cannot infer type arguments for call"));
                }
                mapping = inferred;
            }
        }

        for (param, arg) in info.params.iter().zip(&call.args) {
            let expected = substitute_type_params(param, &mapping);
            let Some(actual) = self.infer_expr_type(arg) else {
                continue;
            };
            if !types_compatible_for_expr(&expected, &actual, arg) {
                return Err(Diag::new(arg.pos(), "call argument type mismatch"));
            }
        }
        Ok(())
    }

    /// Hand-rolled signatures for reserved members whose rules are not
    /// expressible in the table (generic Math members, Core.DL.open's
    /// manifest form, typed buffers).
    fn check_reserved_call_specifics(&self, call: &CallExpr) -> DiagResult<()> {
        let Expr::Member(member) = &call.callee else {
            return Ok(());
        };
        let Some(module) = module_name_from_expr(&member.base) else {
            return Ok(());
        };
        let Some(resolved) = self.ctx.resolve_reserved_module(&module) else {
            return Ok(());
        };
        let name = if resolved == "Core.DL" {
            normalize_core_dl_member(&member.name).to_string()
        } else {
            member.name.clone()
        };
        let infer_arg = |i: usize| -> Option<TypeRef> {
            call.args.get(i).and_then(|arg| self.infer_expr_type(arg))
        };
        let is_i32_buffer = |t: &TypeRef| {
            t.name == "i32" && !t.is_proc && t.type_args.is_empty() && t.dims.len() == 1
        };

        match resolved.as_str() {
            "Math" => match name.as_str() {
                "abs" => {
                    if call.args.len() != 1 {
                        return Ok(());
                    }
                    let Some(arg) = infer_arg(0) else { return Ok(()) };
                    if (arg.name != "i32" && arg.name != "i64") || !arg.dims.is_empty() || arg.is_proc
                    {
                        return Err(Diag::new(call.pos, "Math.abs expects i32 or i64 argument"));
                    }
                }
                "min" | "max" => {
                    if call.args.len() != 2 {
                        return Ok(());
                    }
                    let (Some(a), Some(b)) = (infer_arg(0), infer_arg(1)) else {
                        return Ok(());
                    };
                    let allowed =
                        |t: &TypeRef| matches!(t.name.as_str(), "i32" | "i64" | "f32" | "f64");
                    if !allowed(&a)
                        || !allowed(&b)
                        || !type_equals(&a, &b)
                        || !a.dims.is_empty()
                        || !b.dims.is_empty()
                    {
                        return Err(Diag::new(
                            call.pos,
                            format!("Math.{} expects two numeric arguments of the same type", name),
                        ));
                    }
                }
                _ => {}
            },
            "Time" => {
                if matches!(name.as_str(), "mono_ns" | "wall_ns") && !call.args.is_empty() {
                    return Err(Diag::new(
                        call.pos,
                        format!("Time.{} expects no arguments", name),
                    ));
                }
            }
            "Core.DL" if name == "open" => {
                if call.args.len() != 1 && call.args.len() != 2 {
                    return Err(Diag::new(
                        call.pos,
                        "Core.DL.open expects (string) or (string, manifest)",
                    ));
                }
                if let Some(path) = infer_arg(0) {
                    if path.name != "string" || !path.dims.is_empty() {
                        return Err(Diag::new(
                            call.pos,
                            "Core.DL.open expects first argument string path",
                        ));
                    }
                }
                if call.args.len() == 2 {
                    let Expr::Identifier(manifest) = &call.args[1] else {
                        return Err(Diag::new(
                            call.pos,
                            "Core.DL.open manifest must be an extern module identifier",
                        ));
                    };
                    let Some(symbols) = self.ctx.externs_by_module.get(&manifest.name) else {
                        return Err(Diag::new(
                            call.pos,
                            format!(
                                "Core.DL.open manifest has no extern symbols: {}",
                                manifest.name
                            ),
                        ));
                    };
                    if symbols.is_empty() {
                        return Err(Diag::new(
                            call.pos,
                            format!(
                                "Core.DL.open manifest has no extern symbols: {}",
                                manifest.name
                            ),
                        ));
                    }
                    for ext in symbols.values() {
                        check_dl_dynamic_signature(ext, self.ctx, call.pos)?;
                    }
                }
            }
            "File" | "Core.Fs" => match name.as_str() {
                "open" => {
                    if call.args.len() != 2 {
                        return Ok(());
                    }
                    let (Some(path), Some(flags)) = (infer_arg(0), infer_arg(1)) else {
                        return Ok(());
                    };
                    if path.name != "string"
                        || !path.dims.is_empty()
                        || flags.name != "i32"
                        || !flags.dims.is_empty()
                    {
                        return Err(Diag::new(call.pos, "File.open expects (string, i32)"));
                    }
                }
                "close" => {
                    if call.args.len() != 1 {
                        return Ok(());
                    }
                    let Some(fd) = infer_arg(0) else { return Ok(()) };
                    if fd.name != "i32" || !fd.dims.is_empty() {
                        return Err(Diag::new(call.pos, "File.close expects (i32)"));
                    }
                }
                "read" | "write" => {
                    if call.args.len() != 3 {
                        return Ok(());
                    }
                    let (Some(fd), Some(buf), Some(len)) =
                        (infer_arg(0), infer_arg(1), infer_arg(2))
                    else {
                        return Ok(());
                    };
                    if fd.name != "i32"
                        || !fd.dims.is_empty()
                        || len.name != "i32"
                        || !len.dims.is_empty()
                        || !is_i32_buffer(&buf)
                    {
                        return Err(Diag::new(
                            call.pos,
                            format!("File.{} expects (i32, i32[], i32)", name),
                        ));
                    }
                }
                _ => {}
            },
            "IO" => match name.as_str() {
                "buffer_new" => {
                    if call.args.len() != 1 {
                        return Ok(());
                    }
                    let Some(len) = infer_arg(0) else { return Ok(()) };
                    if len.name != "i32" || !len.dims.is_empty() {
                        return Err(Diag::new(call.pos, "IO.buffer_new expects (i32)"));
                    }
                }
                "buffer_len" => {
                    if call.args.len() != 1 {
                        return Ok(());
                    }
                    let Some(buf) = infer_arg(0) else { return Ok(()) };
                    if !is_i32_buffer(&buf) {
                        return Err(Diag::new(call.pos, "IO.buffer_len expects (i32[])"));
                    }
                }
                "buffer_fill" => {
                    if call.args.len() != 3 {
                        return Ok(());
                    }
                    let (Some(buf), Some(value), Some(count)) =
                        (infer_arg(0), infer_arg(1), infer_arg(2))
                    else {
                        return Ok(());
                    };
                    if !is_i32_buffer(&buf)
                        || value.name != "i32"
                        || !value.dims.is_empty()
                        || count.name != "i32"
                        || !count.dims.is_empty()
                    {
                        return Err(Diag::new(call.pos, "IO.buffer_fill expects (i32[], i32, i32)"));
                    }
                }
                "buffer_copy" => {
                    if call.args.len() != 3 {
                        return Ok(());
                    }
                    let (Some(dst), Some(src), Some(count)) =
                        (infer_arg(0), infer_arg(1), infer_arg(2))
                    else {
                        return Ok(());
                    };
                    if !is_i32_buffer(&dst)
                        || !is_i32_buffer(&src)
                        || count.name != "i32"
                        || !count.dims.is_empty()
                    {
                        return Err(Diag::new(
                            call.pos,
                            "IO.buffer_copy expects (i32[], i32[], i32)",
                        ));
                    }
                }
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }

    fn check_io_print_call(&self, call: &CallExpr) -> DiagResult<()> {
        let scalar_printable = |ty: &TypeRef| -> bool {
            ty.pointer_depth == 0
                && !ty.is_proc
                && ty.type_args.is_empty()
                && ty.dims.is_empty()
                && (is_numeric_type_name(&ty.name)
                    || is_bool_type_name(&ty.name)
                    || ty.name == "char"
                    || ty.name == "string")
        };

        if call.args.len() == 1 {
            let Some(arg_type) = self.infer_expr_type(&call.args[0]) else {
                return Err(Diag::new(call.pos, "IO.print expects scalar argument"));
            };
            if arg_type.pointer_depth != 0
                || arg_type.is_proc
                || !arg_type.type_args.is_empty()
                || !arg_type.dims.is_empty()
            {
                return Err(Diag::new(call.pos, "IO.print expects scalar argument"));
            }
            if !scalar_printable(&arg_type) {
                return Err(Diag::new(
                    call.pos,
                    "IO.print supports numeric, bool, char, or string",
                ));
            }
            return Ok(());
        }

        let Expr::Literal(fmt) = &call.args[0] else {
            return Err(Diag::new(
                call.pos,
                "IO.print format call expects string literal as first argument",
            ));
        };
        if fmt.kind != simplec_par::LiteralKind::String {
            return Err(Diag::new(
                call.pos,
                "IO.print format call expects string literal as first argument",
            ));
        }
        let placeholder_count = count_format_placeholders(&fmt.text, call.pos)?;
        let value_count = call.args.len() - 1;
        if placeholder_count != value_count {
            return Err(Diag::new(
                call.pos,
                format!(
                    "IO.print format placeholder count mismatch: expected {}, got {}",
                    placeholder_count, value_count
                ),
            ));
        }
        for arg in &call.args[1..] {
            let Some(arg_type) = self.infer_expr_type(arg) else {
                return Err(Diag::new(
                    arg.pos(),
                    "IO.print format expects scalar arguments",
                ));
            };
            if arg_type.pointer_depth != 0
                || arg_type.is_proc
                || !arg_type.type_args.is_empty()
                || !arg_type.dims.is_empty()
            {
                return Err(Diag::new(
                    arg.pos(),
                    "IO.print format expects scalar arguments",
                ));
            }
            if !scalar_printable(&arg_type) {
                return Err(Diag::new(
                    arg.pos(),
                    "IO.print supports numeric, bool, char, or string",
                ));
            }
        }
        Ok(())
    }

    fn check_len_call(&self, call: &CallExpr) -> DiagResult<()> {
        if call.args.len() != 1 {
            return Err(Diag::new(
                call.pos,
                format!(
                    "call argument count mismatch for len: expected 1, got {}",
                    call.args.len()
                ),
            ));
        }
        match self.infer_expr_type(&call.args[0]) {
            Some(arg_type) => {
                if arg_type.dims.is_empty() && arg_type.name != "string" {
                    return Err(Diag::new(
                        call.pos,
                        "len expects array, list, or string argument",
                    ));
                }
                Ok(())
            }
            None => Err(Diag::new(
                call.pos,
                "len expects array, list, or string argument",
            )),
        }
    }

    fn check_str_call(&self, call: &CallExpr) -> DiagResult<()> {
        if call.args.len() != 1 {
            return Err(Diag::new(
                call.pos,
                format!(
                    "call argument count mismatch for str: expected 1, got {}",
                    call.args.len()
                ),
            ));
        }
        match self.infer_expr_type(&call.args[0]) {
            Some(arg_type) => {
                if arg_type.pointer_depth != 0
                    || (!is_numeric_type_name(&arg_type.name) && !is_bool_type_name(&arg_type.name))
                {
                    return Err(Diag::new(call.pos, "str expects numeric or bool argument"));
                }
                Ok(())
            }
            None => Err(Diag::new(call.pos, "str expects numeric or bool argument")),
        }
    }

    fn check_cast_call(&self, call: &CallExpr, target: &str) -> DiagResult<()> {
        if call.args.len() != 1 {
            return Err(Diag::new(
                call.pos,
                format!(
                    "call argument count mismatch for {}: expected 1, got {}",
                    target,
                    call.args.len()
                ),
            ));
        }
        let Some(arg_type) = self.infer_expr_type(&call.args[0]) else {
            return Err(Diag::new(
                call.pos,
                format!("{} cast expects scalar argument", target),
            ));
        };
        if arg_type.is_proc || !arg_type.type_args.is_empty() || !arg_type.dims.is_empty() {
            return Err(Diag::new(
                call.pos,
                format!("{} cast expects scalar argument", target),
            ));
        }
        if is_string_type_name(&arg_type.name) && !(target == "i32" || target == "f64") {
            return Err(Diag::new(
                call.pos,
                format!("{} cast from string is unsupported", target),
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Artifact and bracket literals against a target type
    // =========================================================================

    pub(crate) fn check_artifact_literal(
        &self,
        lit: &ArtifactLiteralExpr,
        target: &TypeRef,
    ) -> DiagResult<()> {
        let Some(artifact) = self.ctx.artifacts.get(&target.name) else {
            return Ok(());
        };
        let mapping = build_artifact_type_param_map(target, &artifact.generics)?;

        if lit.positional.len() > artifact.fields.len() {
            return Err(Diag::new(
                lit.pos,
                "too many positional values in artifact literal",
            ));
        }

        let mut seen = FxHashSet::default();
        for (name, _) in &lit.named {
            if !seen.insert(name.clone()) {
                return Err(Diag::new(
                    lit.pos,
                    format!("duplicate named field in artifact literal: {}", name),
                ));
            }
        }
        for (value, field) in lit.positional.iter().zip(&artifact.fields) {
            if seen.contains(&field.name) {
                return Err(Diag::new(
                    lit.pos,
                    format!("field specified twice in artifact literal: {}", field.name),
                ));
            }
            seen.insert(field.name.clone());
            if let Some(value_type) = self.infer_expr_type(value) {
                let expected = substitute_type_params(&field.ty, &mapping);
                if !types_compatible_for_expr(&expected, &value_type, value) {
                    return Err(Diag::new(
                        value.pos(),
                        format!("artifact field type mismatch: {}", field.name),
                    ));
                }
            }
        }
        for (name, value) in &lit.named {
            let Some(field) = artifact.fields.iter().find(|f| &f.name == name) else {
                return Err(Diag::new(
                    value.pos(),
                    format!("unknown artifact field: {}", name),
                ));
            };
            if let Some(value_type) = self.infer_expr_type(value) {
                let expected = substitute_type_params(&field.ty, &mapping);
                if !types_compatible_for_expr(&expected, &value_type, value) {
                    return Err(Diag::new(
                        value.pos(),
                        format!("artifact field type mismatch: {}", name),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Shape and element checks for `[...]` against an array/list
    /// target type.
    pub(crate) fn check_bracket_against_type(
        &self,
        expr: &Expr,
        target: &TypeRef,
    ) -> DiagResult<()> {
        if target.dims.is_empty() {
            return Err(Diag::new(
                expr.pos(),
                "array/list literal requires array or list type",
            ));
        }
        self.check_bracket_shape(expr, &target.dims, 0)?;
        let mut elem_base = target.clone();
        elem_base.dims.clear();
        self.check_bracket_element_types(expr, &target.dims, 0, &elem_base)
    }

    fn check_bracket_shape(
        &self,
        expr: &Expr,
        dims: &[simplec_par::TypeDim],
        dim_index: usize,
    ) -> DiagResult<()> {
        let Some(dim) = dims.get(dim_index) else {
            return Ok(());
        };
        let simplec_par::TypeDim::Fixed(size) = dim else {
            return Ok(());
        };
        let Expr::Bracket(bracket) = expr else {
            return Ok(());
        };
        if bracket.elems.len() != *size as usize {
            return Err(Diag::new(
                bracket.pos,
                "array literal size does not match fixed dimensions",
            ));
        }
        if dim_index + 1 < dims.len() {
            for child in &bracket.elems {
                self.check_bracket_shape(child, dims, dim_index + 1)?;
            }
        }
        Ok(())
    }

    fn check_bracket_element_types(
        &self,
        expr: &Expr,
        dims: &[simplec_par::TypeDim],
        dim_index: usize,
        elem_base: &TypeRef,
    ) -> DiagResult<()> {
        let Expr::Bracket(bracket) = expr else {
            return Ok(());
        };
        let is_list = matches!(dims.get(dim_index), Some(simplec_par::TypeDim::List));
        let kind = if is_list { "list" } else { "array" };
        if dim_index + 1 >= dims.len() {
            for child in &bracket.elems {
                let Some(child_type) = self.infer_expr_type(child) else {
                    // A nested bracket where a scalar belongs.
                    if matches!(child, Expr::Bracket(_)) {
                        return Err(Diag::new(
                            child.pos(),
                            format!("{} literal element type mismatch", kind),
                        ));
                    }
                    continue;
                };
                if !types_compatible_for_expr(elem_base, &child_type, child) {
                    return Err(Diag::new(
                        child.pos(),
                        format!("{} literal element type mismatch", kind),
                    ));
                }
            }
            return Ok(());
        }
        for child in &bracket.elems {
            if !matches!(child, Expr::Bracket(_)) {
                return Err(Diag::new(
                    child.pos(),
                    format!("{} literal element type mismatch", kind),
                ));
            }
            self.check_bracket_element_types(child, dims, dim_index + 1, elem_base)?;
        }
        Ok(())
    }
}

fn check_named_arity(name: &str, expected: usize, got: usize, pos: Pos) -> DiagResult<()> {
    if expected != got {
        return Err(Diag::new(
            pos,
            format!(
                "call argument count mismatch for {}: expected {}, got {}",
                name, expected, got
            ),
        ));
    }
    Ok(())
}

fn check_proc_arity(ty: &TypeRef, got: usize, pos: Pos) -> DiagResult<()> {
    if ty.proc_is_callback {
        return Ok(());
    }
    if ty.proc_params.len() != got {
        return Err(Diag::new(
            pos,
            format!(
                "call argument count mismatch: expected {}, got {}",
                ty.proc_params.len(),
                got
            ),
        ));
    }
    Ok(())
}

/// ABI rules for dynamic-DL symbols: scalar/pointer/string/artifact/
/// enum only, no arrays or procedure params, at most 254 parameters.
pub(crate) fn is_supported_dl_abi_type(ty: &TypeRef, ctx: &Context, allow_void: bool) -> bool {
    if ty.is_proc || !ty.type_args.is_empty() || !ty.dims.is_empty() {
        return false;
    }
    if ty.pointer_depth > 0 {
        return true;
    }
    if allow_void && ty.name == "void" {
        return true;
    }
    if matches!(
        ty.name.as_str(),
        "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64" | "f32" | "f64" | "bool"
            | "char" | "string"
    ) {
        return true;
    }
    ctx.enums.contains_key(&ty.name) || ctx.artifacts.contains_key(&ty.name)
}

pub(crate) fn check_dl_dynamic_signature(
    ext: &ExternDecl,
    ctx: &Context,
    pos: Pos,
) -> DiagResult<()> {
    let module = ext.module.as_deref().unwrap_or("");
    if !is_supported_dl_abi_type(&ext.return_type, ctx, true) {
        return Err(Diag::new(
            pos,
            format!(
                "dynamic DL return type for '{}.{}' is not ABI-supported",
                module, ext.name
            ),
        ));
    }
    for param in &ext.params {
        if !is_supported_dl_abi_type(&param.ty, ctx, false) {
            return Err(Diag::new(
                pos,
                format!(
                    "dynamic DL parameter type for '{}.{}' is not ABI-supported",
                    module, ext.name
                ),
            ));
        }
    }
    if ext.params.len() > 254 {
        return Err(Diag::new(
            pos,
            format!(
                "dynamic DL symbol '{}.{}' currently supports up to 254 ABI parameters",
                module, ext.name
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::validate_source;

    #[test]
    fn test_undeclared_identifier() {
        let err = validate_source("main : i32 () { return foo; }").unwrap_err();
        assert!(err.message.contains("undeclared identifier: foo"));
    }

    #[test]
    fn test_unknown_type() {
        let err = validate_source("main : i32 () { x : NotAType = 1; return 0; }").unwrap_err();
        assert!(err.message.contains("unknown type: NotAType"));
    }

    #[test]
    fn test_void_only_as_return_type() {
        assert!(validate_source("main : i32 () { x : void = 1; return 0; }")
            .unwrap_err()
            .message
            .contains("void is only valid as a return type"));
        assert!(validate_source("main : i32 (x : void) { return 0; }").is_err());
    }

    #[test]
    fn test_pointer_to_void_allowed() {
        assert!(validate_source(
            "extern C.peek : i32 (p : *void)\nmain : i32 () { return 0; }"
        )
        .is_ok());
    }

    #[test]
    fn test_primitive_type_args_rejected() {
        let err = validate_source("main : i32 () { x : i32<i32> = 1; return 0; }").unwrap_err();
        assert!(err.message.contains("primitive type cannot have type arguments"));
    }

    #[test]
    fn test_type_param_usable_and_unparameterized() {
        assert!(validate_source("id<T> : T (v : T) { return v; }").is_ok());
        assert!(validate_source("id<T> : i32 (v : T<i32>) { return 0; }")
            .unwrap_err()
            .message
            .contains("type parameter cannot have type arguments"));
    }

    #[test]
    fn test_enum_member_access_rules() {
        assert!(validate_source("Color :: enum { Red = 1 }main : i32 () { return Color.Red; }").is_ok());
        assert!(validate_source("Color :: enum { Red = 1 }main : i32 () { return Red; }")
            .unwrap_err()
            .message
            .contains("unqualified enum value: Red"));
        assert!(validate_source("Color :: enum { Red = 1 }main : i32 () { return Color.Blue; }")
            .unwrap_err()
            .message
            .contains("unknown enum member: Color.Blue"));
        assert!(validate_source(
            "Color :: enum { Red = 1 }main : i32 () { x : i32 = Color; return x; }"
        )
        .unwrap_err()
        .message
        .contains("enum type is not a value: Color"));
        assert!(validate_source("Color :: enum { Red = 1 }main : i32 () { return Color::Red; }").is_err());
    }

    #[test]
    fn test_enum_scalar_assignment_rejected() {
        let err = validate_source(
            "State :: enum { Idle = 0, Running = 1 }\nmain : i32 () {\n  s : State = 1\n  return 0\n}",
        )
        .unwrap_err();
        assert!(err.message.contains("type mismatch"), "{}", err.message);
    }

    #[test]
    fn test_modules_and_types_are_not_values_or_types() {
        assert!(validate_source("Math :: module { }main : void () { x : i32 = Math; }")
            .unwrap_err()
            .message
            .contains("module is not a value: Math"));
        assert!(validate_source("Point :: artifact { x : i32 }main : void () { p : Point = Point; }")
            .unwrap_err()
            .message
            .contains("type is not a value: Point"));
        assert!(validate_source("Calc :: module { pi : i32 = 3; }main : void () { x : Calc = 1; }")
            .unwrap_err()
            .message
            .contains("module is not a type: Calc"));
        assert!(validate_source("fn Foo : i32 () { return 0; }main : void () { x : Foo = 1; }")
            .unwrap_err()
            .message
            .contains("function is not a type: Foo"));
    }

    #[test]
    fn test_unknown_members() {
        assert!(validate_source(
            "Calc :: module { x : i32 = 1; }main : i32 () { return Calc.y; }"
        )
        .unwrap_err()
        .message
        .contains("unknown module member: Calc.y"));
        assert!(validate_source(
            "Point :: artifact { x : i32 }main : i32 () { p : Point = { 1 }; return p.y; }"
        )
        .unwrap_err()
        .message
        .contains("unknown artifact member: Point.y"));
    }

    #[test]
    fn test_artifact_members_require_self() {
        assert!(validate_source("Point :: artifact { x : i32 get : i32 () { return x; } }")
            .unwrap_err()
            .message
            .contains("artifact members must be accessed via self: x"));
        assert!(validate_source(
            "Point :: artifact { get : i32 () { return 1; } use : i32 () { return get(); } }"
        )
        .is_err());
        assert!(validate_source(
            "Point :: artifact { x : i32 get : i32 () { return self.x; } use : i32 () { return self.get(); } }"
        )
        .is_ok());
    }

    #[test]
    fn test_self_outside_artifact() {
        let err = validate_source("main : void () { self; }").unwrap_err();
        assert!(err.message.contains("self used outside of artifact method"));
    }

    #[test]
    fn test_call_arity_checks() {
        assert!(validate_source(
            "add : i32 (a : i32, b : i32) { return a; }main : i32 () { return add(1); }"
        )
        .unwrap_err()
        .message
        .contains("call argument count mismatch for add: expected 2, got 1"));
        assert!(validate_source("x : i32 = 1;\nmain : i32 () { return x(1); }")
            .unwrap_err()
            .message
            .contains("attempt to call non-function: x"));
        assert!(validate_source(
            "Calc :: module { add : i32 (a : i32, b : i32) { return a; } }main : i32 () { return Calc.add(1); }"
        )
        .is_err());
        assert!(validate_source(
            "Calc :: module { PI :: f64 = 3.14; }main : i32 () { return Calc.PI(1); }"
        )
        .unwrap_err()
        .message
        .contains("attempt to call non-function: Calc.PI"));
        assert!(validate_source(
            "Point :: artifact { x : i32 get : i32 () { return self.x; } }main : i32 () { p : Point = { 1 }; return p.get(1); }"
        )
        .is_err());
        assert!(validate_source(
            "Point :: artifact { x : i32 }main : i32 () { p : Point = { 1 }; return p.x(1); }"
        )
        .unwrap_err()
        .message
        .contains("attempt to call non-function: p.x"));
    }

    #[test]
    fn test_call_arg_type_checks() {
        assert!(validate_source(
            "add : i32 (a : i32, b : i32) { return a + b; }main : void () { add(1, \"hi\"); }"
        )
        .unwrap_err()
        .message
        .contains("call argument type mismatch"));
        assert!(validate_source(
            "add : i32 (a : i32, b : i32) { return a + b; }main : void () { add(1, 2); }"
        )
        .is_ok());
    }

    #[test]
    fn test_method_arg_type_strict() {
        let err = validate_source(
            "Counter :: artifact {\n  value : i32\n  add : void (step : i32) { self.value = self.value + step }\n}\nmain : i32 () {\n  c : Counter = { 0 }\n  c.add(\"bad\")\n  return 0\n}",
        )
        .unwrap_err();
        assert!(err.message.contains("call argument type mismatch"));
    }

    #[test]
    fn test_proc_values_and_literals() {
        assert!(validate_source(
            "main : i32 () {\n  f : (i32, i32) : i32 = (a : i32, b : i32) { return a + b }\n  g : (i32) : i32 = (x : i32) { return x + 2 }\n  h : (i32, i32) : i32 = f\n  return 42\n}",
        )
        .is_ok());
        assert!(validate_source(
            "accept : void (f : (i32, i32) : i32) { return }\nmain : i32 () {\n  accept((x : i32, y : i32) { return x + y })\n  return 0\n}",
        )
        .is_ok());
        assert!(validate_source(
            "main : i32 () { f : (i32) : i32 = (x : i32) { return x }\n  return f(\"oops\")\n}",
        )
        .unwrap_err()
        .message
        .contains("call argument type mismatch"));
        assert!(validate_source(
            "main : i32 () { f : (i32) : i32 = (x : i32) { return true }\n  g : (i32) : string = f\n  return 0\n}",
        )
        .unwrap_err()
        .message
        .contains("initializer type mismatch"));
    }

    #[test]
    fn test_fn_literal_shape_checks() {
        assert!(validate_source(
            "main : void () { f : (i32) : i32 = (a : i32) { return a; }; }"
        )
        .is_ok());
        assert!(validate_source(
            "main : void () { f : (i32) : i32 = (a : f64) { return 1; }; }"
        )
        .unwrap_err()
        .message
        .contains("fn literal parameter type mismatch"));
        assert!(validate_source("main : void () { f : i32 = (a : i32) { return a; }; }")
            .unwrap_err()
            .message
            .contains("fn literal requires procedure type"));
        assert!(validate_source(
            "main : i32 () { f : (i32) : i32 = (x : i32) { return x; }; return f(1, 2); }"
        )
        .is_err());
    }

    #[test]
    fn test_fn_shorthand_binding_validates() {
        assert!(validate_source(
            "Player :: artifact { position : i32 velocity : i32 }\nmain : i32 () {\n  update : fn = void (p : Player) { p.position += p.velocity }\n  player : Player = { 40, 2 }\n  update(player)\n  return player.position\n}",
        )
        .is_ok());
    }

    #[test]
    fn test_callback_rules() {
        assert!(validate_source(
            "invoke : void (cb : callback, x : i32) { cb(x) }\nmain : i32 () {\n  printv : fn = void (v : i32) { return; }\n  invoke(printv, 42)\n  return 0\n}",
        )
        .is_ok());
        assert!(validate_source("main : void () { cb : callback; }").is_err());
        assert!(validate_source("make : callback () { return; }").is_err());
        assert!(validate_source("Node :: artifact { cb : callback }").is_err());
    }

    #[test]
    fn test_generic_artifacts() {
        assert!(validate_source(
            "Box<T> :: artifact { value : T }main : void () { b : Box<i32> = { 1 }; }"
        )
        .is_ok());
        assert!(validate_source(
            "Box<T> :: artifact { value : T }main : void () { b : Box<i32> = { \"hi\" }; }"
        )
        .unwrap_err()
        .message
        .contains("artifact field type mismatch: value"));
        assert!(validate_source(
            "Box<T> :: artifact { value : T }main : void () { b : Box<i32> = { 1 }; x : i32 = b.value; }"
        )
        .is_ok());
        assert!(validate_source(
            "Box<T> :: artifact { value : T }main : void () { b : Box<i32> = { 1 }; x : f64 = b.value; }"
        )
        .is_err());
        assert!(validate_source(
            "Box<T> :: artifact { value : T get : T () { return self.value; } }main : void () { b : Box<i32> = { 1 }; x : i32 = b.get(); }"
        )
        .is_ok());
        assert!(validate_source(
            "Box<T> :: artifact { value : T get : T () { return self.value; } }main : void () { b : Box<i32> = { 1 }; x : f64 = b.get(); }"
        )
        .is_err());
        assert!(validate_source("Box<T> :: artifact { value : T }main : void () { x : Box = { 1 }; }")
            .unwrap_err()
            .message
            .contains("generic type argument count mismatch for Box"));
        assert!(validate_source(
            "Box<T> :: artifact { value : T }main : void () { x : Box<i32, i32> = { 1 }; }"
        )
        .is_err());
        assert!(validate_source(
            "Point :: artifact { x : i32 }main : void () { p : Point<i32> = { 1 }; }"
        )
        .is_err());
        assert!(validate_source(
            "Color :: enum { Red = 1 }main : void () { c : Color<i32> = Color.Red; }"
        )
        .unwrap_err()
        .message
        .contains("enum type cannot have type arguments"));
    }

    #[test]
    fn test_generic_calls() {
        assert!(validate_source(
            "identity<T> : T (value : T) { return value; }main : void () { x : i32 = identity<i32>(10); }"
        )
        .is_ok());
        assert!(validate_source(
            "identity<T> : T (value : T) { return value; }main : void () { x : i32 = identity(10); }"
        )
        .is_ok());
        assert!(validate_source(
            "identity<T> : T (value : T) { return value; }main : void () { x : i32 = identity(); }"
        )
        .unwrap_err()
        .message
        .contains("cannot infer type arguments for call"));
        assert!(validate_source(
            "identity<T> : T (value : T) { return value; }main : void () { x : i32 = identity<i32>(\"hi\"); }"
        )
        .unwrap_err()
        .message
        .contains("call argument type mismatch"));
        assert!(validate_source(
            "add : i32 (a : i32) { return a; }main : void () { x : i32 = add<i32>(1); }"
        )
        .unwrap_err()
        .message
        .contains("non-generic call cannot take type arguments"));
    }

    #[test]
    fn test_array_literal_shapes() {
        assert!(validate_source("main : void () { a : i32[2][2] = [[1,2],[3,4]]; }").is_ok());
        assert!(validate_source("main : void () { a : i32[2] = [1,2,3]; }")
            .unwrap_err()
            .message
            .contains("array literal size does not match fixed dimensions"));
        assert!(validate_source("main : void () { a : i32[2][2] = [[1,2,3],[4,5,6]]; }").is_err());
        assert!(validate_source("main : void () { a : i32[2][2] = [1,2]; }").is_err());
        assert!(validate_source("main : void () { a : i32[2] = []; }").is_err());
        assert!(validate_source("main : void () { a : i32[0] = []; }").is_ok());
        assert!(validate_source("main : void () { a : i32[2] = [1, true]; }")
            .unwrap_err()
            .message
            .contains("array literal element type mismatch"));
        assert!(validate_source("main : void () { a : i32[] = [1, true]; }")
            .unwrap_err()
            .message
            .contains("list literal element type mismatch"));
        assert!(validate_source("main : void () { a : i32[][] = [[1,2],[3,true]]; }").is_err());
        assert!(validate_source("main : void () { a : i32 = [1,2]; }")
            .unwrap_err()
            .message
            .contains("array/list literal requires array or list type"));
        assert!(validate_source("main : void () { a : i32[] = [1,2]; }").is_ok());
    }

    #[test]
    fn test_index_rules() {
        assert!(validate_source("main : i32 () { return [1,2,3][1]; }").is_ok());
        assert!(validate_source("main : i32 () { return [1,2,3][1.5]; }")
            .unwrap_err()
            .message
            .contains("index must be an integer"));
        assert!(validate_source("main : i32 () { return [1,2,3][\"no\"]; }").is_err());
        assert!(validate_source("main : i32 () { return 123[0]; }")
            .unwrap_err()
            .message
            .contains("indexing is only valid on arrays and lists"));
        assert!(validate_source("main : i32 () { x : i32 = 1; return x[0]; }").is_err());
        assert!(validate_source("main : i32 () { a : i32[] = []; return a[true]; }").is_err());
        assert!(validate_source("main : void () { arr : i32[2] = [1,2]; x : f64 = arr[0]; }").is_err());
        assert!(validate_source(
            "main : void () { arr : i32[2][2] = [[1,2],[3,4]]; row : i32[2] = arr[0]; }"
        )
        .is_ok());
        assert!(validate_source(
            "main : void () { list : string[] = [\"a\"]; s : string = list[0]; }"
        )
        .is_ok());
        assert!(validate_source(
            "main : void () { list : string[] = [\"a\"]; x : i32 = list[0]; }"
        )
        .is_err());
    }

    #[test]
    fn test_artifact_literal_rules() {
        let point = "Point :: artifact { x : i32 y : i32 }";
        assert!(validate_source(&format!("{}main : void () {{ p : Point = {{ 1, 2, 3 }}; }}", point))
            .unwrap_err()
            .message
            .contains("too many positional values in artifact literal"));
        assert!(validate_source(&format!(
            "{}main : void () {{ p : Point = {{ .x = 1, .x = 2 }}; }}",
            point
        ))
        .unwrap_err()
        .message
        .contains("duplicate named field in artifact literal: x"));
        assert!(validate_source(&format!("{}main : void () {{ p : Point = {{ .z = 1 }}; }}", point))
            .unwrap_err()
            .message
            .contains("unknown artifact field: z"));
        assert!(validate_source(&format!(
            "{}main : void () {{ p : Point = {{ 1, .x = 2 }}; }}",
            point
        ))
        .unwrap_err()
        .message
        .contains("field specified twice in artifact literal: x"));
        assert!(validate_source(&format!("{}main : void () {{ p : Point = {{ .x = 1 }}; }}", point)).is_ok());
        assert!(validate_source(&format!("{}main : void () {{ p : Point = {{ 1, true }}; }}", point))
            .unwrap_err()
            .message
            .contains("artifact field type mismatch: y"));
        assert!(validate_source(&format!(
            "{}main : void () {{ p : Point = {{ .y = true }}; }}",
            point
        ))
        .is_err());
    }

    #[test]
    fn test_operator_typing() {
        assert!(validate_source("main : i32 () { return !1; }")
            .unwrap_err()
            .message
            .contains("operator '!' requires bool operand"));
        assert!(validate_source("main : i32 () { return 1 + 2.0; }")
            .unwrap_err()
            .message
            .contains("requires matching operand types"));
        assert!(validate_source("main : bool () { return 1 < true; }").is_err());
        assert!(validate_source("main : i32 () { return 1 & 2.0; }").is_err());
        assert!(validate_source("main : f64 () { return 1.0 % 2.0; }")
            .unwrap_err()
            .message
            .contains("operator '%' requires integer operands"));
        assert!(validate_source("main : bool () { s : string = \"a\"; t : string = \"b\"; return s == t; }")
            .unwrap_err()
            .message
            .contains("does not support string operands"));
        assert!(validate_source("main : bool () { return true && false; }").is_ok());
        assert!(validate_source("main : bool () { return 1 && 2; }").is_err());
    }

    #[test]
    fn test_len_str_and_casts() {
        assert!(validate_source("main : i32 () { a : i32[3] = [1,2,3]; return len(a); }").is_ok());
        assert!(validate_source("main : i32 () { s : string = \"hi\"; return len(s); }").is_ok());
        assert!(validate_source("main : i32 () { x : i32 = 1; return len(x); }")
            .unwrap_err()
            .message
            .contains("len expects array, list, or string argument"));
        assert!(validate_source("main : i32 () { a : i32[] = []; return len(a, a); }").is_err());
        assert!(validate_source("main : string () { x : i32 = 1; return str(x); }").is_ok());
        assert!(validate_source("main : string () { return str(true); }").is_ok());
        assert!(validate_source("main : string () { s : string = \"hi\"; return str(s); }")
            .unwrap_err()
            .message
            .contains("str expects numeric or bool argument"));
        assert!(validate_source("main : i32 () { s : string = \"42\"; return @i32(s); }").is_ok());
        assert!(validate_source("main : f64 () { s : string = \"1.5\"; return @f64(s); }").is_ok());
        assert!(validate_source("main : i64 () { s : string = \"1\"; return @i64(s); }")
            .unwrap_err()
            .message
            .contains("cast from string is unsupported"));
        assert!(validate_source("main : i32 () { x : i8 = 1; return i32(x); }")
            .unwrap_err()
            .message
            .contains("primitive cast syntax requires '@'"));
        assert!(validate_source("main : i32 () { x : i32 = 1; return @i32(x); }").is_ok());
    }

    #[test]
    fn test_io_print_rules() {
        assert!(validate_source("import \"IO\"\nmain : void () { IO.print(); }").is_err());
        assert!(validate_source("import \"IO\"\nmain : void () { IO.print<i32>(1); }").is_ok());
        assert!(validate_source(
            "import \"IO\"\nmain : void () { a : i32[] = [1,2]; IO.print(a); }"
        )
        .unwrap_err()
        .message
        .contains("IO.print expects scalar argument"));
        assert!(validate_source(
            "import \"IO\"\nmain : void () { x : i32 = 42; IO.println(\"x={}\", x); }"
        )
        .is_ok());
        assert!(validate_source("import \"IO\"\nmain : void () { IO.println(\"x={}, y={}\", 1); }")
            .unwrap_err()
            .message
            .contains("format placeholder count mismatch: expected 2, got 1"));
        assert!(validate_source(
            "import \"IO\"\nmain : void () { fmt : string = \"x={}\"; IO.println(fmt, 1); }"
        )
        .unwrap_err()
        .message
        .contains("format call expects string literal"));
    }

    #[test]
    fn test_reserved_module_members() {
        assert!(validate_source(
            "import system.os\nmain : i32 () { if os.is_linux || os.is_macos || os.is_windows { return 1 } return 0 }"
        )
        .is_ok());
        assert!(validate_source(
            "import system.dl\nmain : i32 () { if dl.supported { return 1 } return 0 }"
        )
        .is_ok());
        let err = validate_source("import system.io\nmain : void () { io.printlnn(1); }").unwrap_err();
        assert!(err.message.contains("did you mean 'println'"), "{}", err.message);
    }

    #[test]
    fn test_io_buffer_apis() {
        assert!(validate_source(
            "import system.io\nmain : i32 () {\n  a : i32[] = io.buffer_new(4);\n  b : i32[] = io.buffer_new(4);\n  io.buffer_fill(a, 7, 3);\n  io.buffer_copy(b, a, 4);\n  return io.buffer_len(b);\n}",
        )
        .is_ok());
        assert!(validate_source(
            "import system.io\nmain : i32 () { return io.buffer_len(1); }"
        )
        .unwrap_err()
        .message
        .contains("IO.buffer_len expects (i32[])"));
    }

    #[test]
    fn test_math_time_and_file_signatures() {
        assert!(validate_source(
            "import \"Math\"\nmain : i32 () { return Math.abs(0 - 3); }"
        )
        .is_ok());
        assert!(validate_source("import \"Math\"\nmain : f64 () { return Math.abs(1.5); }")
            .unwrap_err()
            .message
            .contains("Math.abs expects i32 or i64 argument"));
        assert!(validate_source(
            "import \"Time\"\nmain : i64 () { return Time.mono_ns(); }"
        )
        .is_ok());
        assert!(validate_source("import \"Time\"\nmain : i64 () { return Time.mono_ns(1); }")
            .unwrap_err()
            .message
            .contains("Time.mono_ns expects no arguments"));
        assert!(validate_source(
            "import \"File\"\nmain : i32 () { fd : i32 = File.open(\"x\", 0); File.close(fd); return 0; }"
        )
        .is_ok());
        assert!(validate_source("import \"File\"\nmain : i32 () { File.close(\"x\"); return 0; }")
            .unwrap_err()
            .message
            .contains("File.close expects (i32)"));
    }

    #[test]
    fn test_extern_calls() {
        assert!(validate_source(
            "extern Ray.InitWindow : void (w : i32, h : i32)\nmain : i32 () { Ray.InitWindow(1, 2); return 0; }"
        )
        .is_ok());
        assert!(validate_source(
            "extern Ray.InitWindow : void (w : i32, h : i32)\nmain : i32 () { Ray.InitWindow(1); return 0; }"
        )
        .unwrap_err()
        .message
        .contains("call argument count mismatch for extern Ray.InitWindow"));
        assert!(validate_source(
            "extern Ray.InitWindow : void (w : i32)\nmain : i32 () { Ray.Missing(1); return 0; }"
        )
        .unwrap_err()
        .message
        .contains("unknown extern member: Ray.Missing"));
        assert!(validate_source(
            "Node :: artifact { next: *Node }\nextern C.walk : *Node (head : *Node)\nmain : i32 () { return 0; }"
        )
        .is_ok());
    }

    #[test]
    fn test_core_dl_open_manifest() {
        assert!(validate_source(
            "import core.dl\nextern sdl.init : i32 (flags : i32)\nmain : i32 () {\n  h : i64 = dl.open(\"libsdl.so\", sdl)\n  return h.init(1)\n}",
        )
        .is_ok());
        assert!(validate_source(
            "import core.dl\nmain : i64 () { return dl.open(\"lib.so\", missing); }"
        )
        .unwrap_err()
        .message
        .contains("undeclared identifier: missing"));
        assert!(validate_source(
            "import core.dl\nmain : i64 () { return dl.open(1); }"
        )
        .unwrap_err()
        .message
        .contains("Core.DL.open expects first argument string path"));
    }

    #[test]
    fn test_dynamic_symbol_rules() {
        assert!(validate_source(
            "import core.dl\nextern sdl.init : i32 (flags : i32)\nmain : i32 () {\n  h : i64 = dl.open(\"libsdl.so\", sdl)\n  return h.quit(1)\n}",
        )
        .unwrap_err()
        .message
        .contains("unknown dynamic symbol: h.quit"));
        assert!(validate_source(
            "import core.dl\nextern sdl.init : i32 (flags : i32)\nmain : i32 () {\n  h : i64 = dl.open(\"libsdl.so\", sdl)\n  return h.init(1, 2)\n}",
        )
        .unwrap_err()
        .message
        .contains("call argument count mismatch for dynamic symbol h.init"));
        assert!(validate_source(
            "import core.dl\nextern sdl.fill : i32 (values : i32[])\nmain : i32 () {\n  h : i64 = dl.open(\"libsdl.so\", sdl)\n  return 0\n}",
        )
        .unwrap_err()
        .message
        .contains("is not ABI-supported"));
    }

    #[test]
    fn test_hex_literal_widening() {
        assert!(validate_source("main : void () { x : i32 = 0xFFFFFFFF; }").is_ok());
    }
}

pub(crate) fn count_format_placeholders(fmt: &str, pos: Pos) -> DiagResult<usize> {
    let bytes = fmt.as_bytes();
    let mut count = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                if i + 1 >= bytes.len() || bytes[i + 1] != b'}' {
                    return Err(Diag::new(
                        pos,
                        "invalid format string: expected '{}' placeholder",
                    ));
                }
                count += 1;
                i += 2;
            }
            b'}' => {
                return Err(Diag::new(pos, "invalid format string: unmatched '}'"));
            }
            _ => i += 1,
        }
    }
    Ok(count)
}

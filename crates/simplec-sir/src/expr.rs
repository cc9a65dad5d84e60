//! Expression lowering.
//!
//! Every emission helper keeps the running stack depth current via
//! `push_stack`/`pop_stack`; the function finalizer turns the observed
//! maximum into the frame's `stack=` header.

use simplec_par::{
    parse_block_tokens, ArtifactLiteralExpr, AssignOp, BinOp, BinaryExpr, CallExpr, Expr,
    FnLiteralExpr, FuncDecl, IndexExpr, LiteralExpr, LiteralKind, MemberExpr, ParamDecl, TypeRef,
    UnOp, UnaryExpr,
};
use simplec_util::{intrinsic, print_tag, Diag, DiagResult};

use crate::state::EmitState;
use crate::types::*;

pub(crate) fn host_is_linux() -> bool {
    cfg!(target_os = "linux")
}

pub(crate) fn host_is_macos() -> bool {
    cfg!(target_os = "macos")
}

pub(crate) fn host_is_windows() -> bool {
    cfg!(target_os = "windows")
}

pub(crate) fn host_has_dl() -> bool {
    cfg!(unix)
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

fn is_io_print_name(name: &str) -> bool {
    name == "print" || name == "println"
}

pub(crate) fn is_io_print_callee(callee: &Expr, st: &EmitState) -> bool {
    let Expr::Member(member) = callee else {
        return false;
    };
    if !is_io_print_name(&member.name) {
        return false;
    }
    if matches!(&member.base, Expr::Identifier(base) if base.name == "IO") {
        return true;
    }
    match module_name_from_expr(&member.base) {
        Some(module) => st
            .resolve_reserved_module(&module)
            .is_some_and(|m| m == "IO"),
        None => false,
    }
}

/// Splits a format string around `{}` placeholders, returning the
/// literal segments (placeholder count = segments.len() - 1).
pub(crate) fn split_format_placeholders(fmt: &str, pos: simplec_util::Pos) -> DiagResult<Vec<String>> {
    let bytes = fmt.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                if i + 1 >= bytes.len() || bytes[i + 1] != b'}' {
                    return Err(Diag::new(
                        pos,
                        "invalid format string: expected '{}' placeholder",
                    ));
                }
                segments.push(fmt[start..i].to_string());
                i += 2;
                start = i;
            }
            b'}' => {
                return Err(Diag::new(pos, "invalid format string: unmatched '}'"));
            }
            _ => i += 1,
        }
    }
    segments.push(fmt[start..].to_string());
    Ok(segments)
}

// =============================================================================
// Inference (emitter-local; the program has already validated)
// =============================================================================

fn infer_literal_type(lit: &LiteralExpr) -> TypeRef {
    TypeRef::named(match lit.kind {
        LiteralKind::Integer => "i32",
        LiteralKind::Float => "f64",
        LiteralKind::String => "string",
        LiteralKind::Char => "char",
        LiteralKind::Bool => "bool",
    })
}

pub(crate) fn infer_expr_type(st: &EmitState, expr: &Expr) -> DiagResult<TypeRef> {
    match expr {
        Expr::Literal(lit) => Ok(infer_literal_type(lit)),
        Expr::Identifier(ident) => {
            if let Some(ty) = st.local_types.get(&ident.name) {
                return Ok(ty.clone());
            }
            if let Some(ty) = st.global_types.get(&ident.name) {
                return Ok(ty.clone());
            }
            Err(Diag::new(
                ident.pos,
                format!("unknown local '{}'", ident.name),
            ))
        }
        Expr::SelfRef(pos) => st
            .local_types
            .get("self")
            .cloned()
            .ok_or_else(|| Diag::new(*pos, "unknown local 'self'")),
        Expr::Unary(unary) => infer_expr_type(st, &unary.operand),
        Expr::Binary(binary) => {
            let lhs = infer_expr_type(st, &binary.lhs)?;
            let rhs = infer_expr_type(st, &binary.rhs)?;
            if binary.op.is_comparison()
                || matches!(binary.op, BinOp::LogicalAnd | BinOp::LogicalOr)
            {
                return Ok(TypeRef::named("bool"));
            }
            if lhs.name == rhs.name {
                return Ok(lhs);
            }
            if binary.lhs.is_integer_literal() && is_integral_type(&rhs.name) {
                return Ok(rhs);
            }
            if binary.rhs.is_integer_literal() && is_integral_type(&lhs.name) {
                return Ok(lhs);
            }
            Err(Diag::new(
                binary.pos,
                format!("operand type mismatch for '{}'", binary.op.as_str()),
            ))
        }
        Expr::Assign(assign) => infer_expr_type(st, &assign.target),
        Expr::Index(index) => {
            let container = infer_expr_type(st, &index.base)?;
            if container.dims.is_empty() {
                return Err(Diag::new(
                    index.pos,
                    "indexing is only valid on arrays and lists",
                ));
            }
            container
                .element_type()
                .ok_or_else(|| Diag::new(index.pos, "failed to determine index element type"))
        }
        Expr::Member(member) => infer_member_type(st, member),
        Expr::Call(call) => infer_call_type(st, call),
        Expr::Artifact(lit) => Err(Diag::new(lit.pos, "artifact literal requires expected type")),
        Expr::Bracket(lit) => Err(Diag::new(
            lit.pos,
            "array/list literal requires expected type",
        )),
        Expr::FnLiteral(lit) => Err(Diag::new(
            lit.pos,
            "fn literal requires a proc-typed context",
        )),
    }
}

fn infer_member_type(st: &EmitState, member: &MemberExpr) -> DiagResult<TypeRef> {
    if let Expr::Identifier(base) = &member.base {
        if let Some(resolved) = st.resolve_reserved_module(&base.name) {
            if resolved == "Math" && member.name == "PI" {
                return Ok(TypeRef::named("f64"));
            }
            if resolved == "Core.DL" && member.name == "supported" {
                return Ok(TypeRef::named("bool"));
            }
            if resolved == "Core.Os"
                && matches!(
                    member.name.as_str(),
                    "is_linux" | "is_macos" | "is_windows" | "has_dl"
                )
            {
                return Ok(TypeRef::named("bool"));
            }
        }
        if st.enum_values.contains_key(&base.name) {
            return Ok(TypeRef::named(&base.name));
        }
    }
    let base_type = infer_expr_type(st, &member.base)?;
    let layout = st
        .artifact_layouts
        .get(&base_type.name)
        .ok_or_else(|| Diag::new(member.pos, "member access base is not an artifact"))?;
    let index = layout
        .field_index
        .get(&member.name)
        .copied()
        .ok_or_else(|| Diag::new(member.pos, format!("unknown field '{}'", member.name)))?;
    Ok(layout.fields[index].ty.clone())
}

fn infer_call_type(st: &EmitState, call: &CallExpr) -> DiagResult<TypeRef> {
    if let Expr::Identifier(ident) = &call.callee {
        if ident.name == "len" {
            return Ok(TypeRef::named("i32"));
        }
        if ident.name == "str" {
            return Ok(TypeRef::named("string"));
        }
        if let Some(target) = ident.name.strip_prefix('@') {
            return Ok(TypeRef::named(target));
        }
        if let Some(ret) = st.func_returns.get(&ident.name) {
            return Ok(ret.clone());
        }
        if let Some(ret) = st.extern_returns.get(&ident.name) {
            return Ok(ret.clone());
        }
        if let Some(local) = st.local_types.get(&ident.name) {
            if local.is_proc {
                return Ok(local
                    .proc_return
                    .as_deref()
                    .cloned()
                    .unwrap_or_else(TypeRef::void));
            }
        }
    }
    if let Expr::Member(member) = &call.callee {
        if is_io_print_callee(&call.callee, st) {
            return Ok(TypeRef::void());
        }
        if let Expr::Identifier(base) = &member.base {
            let dl_module = st
                .local_dl_modules
                .get(&base.name)
                .or_else(|| st.global_dl_modules.get(&base.name));
            if let Some(dl_module) = dl_module {
                if let Some(ret) = st
                    .extern_returns_by_module
                    .get(dl_module)
                    .and_then(|symbols| symbols.get(&member.name))
                {
                    return Ok(ret.clone());
                }
            }
        }
        if let Some(raw_module) = module_name_from_expr(&member.base) {
            let (module, member_name) = match st.resolve_reserved_module(&raw_module) {
                Some(resolved) => {
                    let member_name = if resolved == "Core.DL" {
                        simplec_util::normalize_core_dl_member(&member.name).to_string()
                    } else {
                        member.name.clone()
                    };
                    if resolved == "Math"
                        && matches!(member_name.as_str(), "abs" | "min" | "max")
                        && !call.args.is_empty()
                    {
                        return infer_expr_type(st, &call.args[0]);
                    }
                    if resolved == "Time" && matches!(member_name.as_str(), "mono_ns" | "wall_ns") {
                        return Ok(TypeRef::named("i64"));
                    }
                    (resolved, member_name)
                }
                None => (raw_module, member.name.clone()),
            };
            if let Some(ret) = st
                .extern_returns_by_module
                .get(&module)
                .and_then(|symbols| symbols.get(&member_name))
            {
                return Ok(ret.clone());
            }
            let key = format!("{}.{}", module, member_name);
            if let Some(emit_name) = st.module_func_names.get(&key) {
                if let Some(ret) = st.func_returns.get(emit_name) {
                    return Ok(ret.clone());
                }
            }
        }
        if let Ok(base_type) = infer_expr_type(st, &member.base) {
            let key = format!("{}.{}", base_type.name, member.name);
            if let Some(emit_name) = st.artifact_method_names.get(&key) {
                if let Some(ret) = st.func_returns.get(emit_name) {
                    return Ok(ret.clone());
                }
            }
        }
    }
    Err(Diag::new(
        call.pos,
        "call type not supported in SIR emission",
    ))
}

// =============================================================================
// Constants and defaults
// =============================================================================

fn emit_const_for_type(st: &mut EmitState, ty: &TypeRef, lit: &LiteralExpr) -> DiagResult<()> {
    match lit.kind {
        LiteralKind::String => {
            let name = st.add_string_const(&lit.text)?;
            st.emit(format!("const.string {}", name));
            st.push_stack(1);
            Ok(())
        }
        LiteralKind::Char => {
            let value = lit.text.bytes().next().unwrap_or(0);
            st.emit(format!("const.char {}", value));
            st.push_stack(1);
            Ok(())
        }
        LiteralKind::Bool => {
            let value = u32::from(lit.text == "true");
            st.emit(format!("const.bool {}", value));
            st.push_stack(1);
            Ok(())
        }
        LiteralKind::Integer | LiteralKind::Float => {
            if !is_numeric_type(&ty.name) {
                return Err(Diag::new(
                    lit.pos,
                    "literal type not supported for SIR emission",
                ));
            }
            st.emit(format!("const.{} {}", ty.name, lit.text));
            st.push_stack(1);
            Ok(())
        }
    }
}

pub(crate) fn emit_default_init(st: &mut EmitState, ty: &TypeRef) -> DiagResult<()> {
    if !is_supported_type(ty) || ty.name == "void" {
        return Err(Diag::message(format!(
            "unsupported default init type '{}'",
            ty.name
        )));
    }
    if ty.is_proc || !ty.dims.is_empty() || st.artifacts.contains_key(&ty.name) {
        st.emit("const.null");
        st.push_stack(1);
        return Ok(());
    }
    if st.enum_values.contains_key(&ty.name) {
        st.emit("const.i32 0");
        st.push_stack(1);
        return Ok(());
    }
    let lit = if ty.name == "string" {
        LiteralExpr {
            kind: LiteralKind::String,
            text: String::new(),
            pos: ty.pos,
        }
    } else {
        LiteralExpr {
            kind: LiteralKind::Integer,
            text: "0".to_string(),
            pos: ty.pos,
        }
    };
    emit_const_for_type(st, ty, &lit)
}

// =============================================================================
// IO print lowering
// =============================================================================

fn print_tag_for_type(ty: &TypeRef) -> DiagResult<u32> {
    if ty.is_proc || !ty.type_args.is_empty() || !ty.dims.is_empty() {
        return Err(Diag::new(ty.pos, "IO.print expects scalar value"));
    }
    print_tag(&ty.name)
        .ok_or_else(|| Diag::new(ty.pos, "IO.print supports numeric, bool, char, or string"))
}

fn emit_print_any_value(st: &mut EmitState, arg: &Expr, arg_type: &TypeRef) -> DiagResult<()> {
    emit_expr(st, arg, Some(arg_type))?;
    let tag = print_tag_for_type(arg_type)?;
    st.emit(format!("const.i32 {}", tag));
    st.push_stack(1);
    st.emit(format!("intrinsic {}", intrinsic::PRINT_ANY));
    st.pop_stack(2);
    Ok(())
}

fn emit_print_segment(st: &mut EmitState, text: &str, pos: simplec_util::Pos) -> DiagResult<()> {
    let lit = Expr::Literal(LiteralExpr {
        kind: LiteralKind::String,
        text: text.to_string(),
        pos,
    });
    emit_print_any_value(st, &lit, &TypeRef::named("string"))
}

fn emit_print_newline(st: &mut EmitState, pos: simplec_util::Pos) -> DiagResult<()> {
    emit_print_segment(st, "\n", pos)
}

// =============================================================================
// Expression emission
// =============================================================================

pub(crate) fn emit_expr(
    st: &mut EmitState,
    expr: &Expr,
    expected: Option<&TypeRef>,
) -> DiagResult<()> {
    match expr {
        Expr::Identifier(ident) => {
            if let Some(index) = st.local_indices.get(&ident.name).copied() {
                st.emit(format!("ldloc {}", index));
                st.push_stack(1);
                return Ok(());
            }
            if let Some(index) = st.global_indices.get(&ident.name).copied() {
                st.emit(format!("ldglob {}", index));
                st.push_stack(1);
                return Ok(());
            }
            Err(Diag::new(
                ident.pos,
                format!("unknown local '{}'", ident.name),
            ))
        }
        Expr::SelfRef(pos) => {
            let Some(index) = st.local_indices.get("self").copied() else {
                return Err(Diag::new(*pos, "unknown local 'self'"));
            };
            st.emit(format!("ldloc {}", index));
            st.push_stack(1);
            Ok(())
        }
        Expr::Literal(lit) => {
            let literal_type = infer_literal_type(lit);
            let use_type = expected.unwrap_or(&literal_type);
            if !is_supported_type(use_type) || use_type.name == "void" {
                return Err(Diag::new(lit.pos, "literal type not supported in SIR emission"));
            }
            if use_type.name == "i128" || use_type.name == "u128" {
                return Err(Diag::new(lit.pos, "i128/u128 const not supported in SIR"));
            }
            emit_const_for_type(st, &use_type.clone(), lit)
        }
        Expr::Unary(unary) => emit_unary(st, unary, expected),
        Expr::Binary(binary) => emit_binary(st, binary, expected),
        Expr::Assign(assign) => {
            if expected.is_some() {
                return Err(Diag::new(
                    assign.pos,
                    "assignment expression not supported in typed context",
                ));
            }
            emit_assignment_expr(st, assign)
        }
        Expr::Index(index) => emit_index_load(st, index),
        Expr::Bracket(bracket) => emit_bracket_literal(st, bracket, expected),
        Expr::Artifact(lit) => emit_artifact_literal(st, lit, expected),
        Expr::FnLiteral(lit) => emit_fn_literal(st, lit, expected),
        Expr::Member(member) => emit_member_load(st, member),
        Expr::Call(call) => emit_call(st, call),
    }
}

fn emit_index_load(st: &mut EmitState, index: &IndexExpr) -> DiagResult<()> {
    let container_type = infer_expr_type(st, &index.base)?;
    if container_type.dims.is_empty() {
        return Err(Diag::new(
            index.pos,
            "indexing is only valid on arrays and lists",
        ));
    }
    let element_type = container_type
        .element_type()
        .ok_or_else(|| Diag::new(index.pos, "failed to resolve index element type"))?;
    let suffix = vm_op_suffix_for_type(&element_type).ok_or_else(|| {
        Diag::new(index.pos, "unsupported index element type for SIR emission")
    })?;
    emit_expr(st, &index.base, Some(&container_type))?;
    emit_expr(st, &index.index, Some(&TypeRef::named("i32")))?;
    emit_index_get_op(st, &container_type, suffix);
    Ok(())
}

pub(crate) fn emit_index_get_op(st: &mut EmitState, container: &TypeRef, suffix: &str) {
    if container.dims[0].is_list() {
        st.emit(format!("list.get.{}", suffix));
    } else {
        st.emit(format!("array.get.{}", suffix));
    }
    st.pop_stack(2);
    st.push_stack(1);
}

pub(crate) fn emit_index_set_op(st: &mut EmitState, container: &TypeRef, suffix: &str) {
    if container.dims[0].is_list() {
        st.emit(format!("list.set.{}", suffix));
    } else {
        st.emit(format!("array.set.{}", suffix));
    }
    st.pop_stack(3);
}

fn emit_member_load(st: &mut EmitState, member: &MemberExpr) -> DiagResult<()> {
    if let Expr::Identifier(base) = &member.base {
        if let Some(resolved) = st.resolve_reserved_module(&base.name) {
            if resolved == "Math" && member.name == "PI" {
                st.emit("const.f64 3.141592653589793");
                st.push_stack(1);
                return Ok(());
            }
            if resolved == "Core.DL" && member.name == "supported" {
                st.emit(format!("const.i32 {}", u32::from(host_has_dl())));
                st.push_stack(1);
                return Ok(());
            }
            if resolved == "Core.Os" {
                let value = match member.name.as_str() {
                    "is_linux" => Some(host_is_linux()),
                    "is_macos" => Some(host_is_macos()),
                    "is_windows" => Some(host_is_windows()),
                    "has_dl" => Some(host_has_dl()),
                    _ => None,
                };
                if let Some(value) = value {
                    st.emit(format!("const.i32 {}", u32::from(value)));
                    st.push_stack(1);
                    return Ok(());
                }
            }
        }
        if let Some(values) = st.enum_values.get(&base.name) {
            let Some(value) = values.get(&member.name).copied() else {
                return Err(Diag::new(
                    member.pos,
                    format!("unknown enum member '{}'", member.name),
                ));
            };
            st.emit(format!("const.i32 {}", value));
            st.push_stack(1);
            return Ok(());
        }
        let key = format!("{}.{}", base.name, member.name);
        if st.module_func_names.contains_key(&key) {
            return Err(Diag::new(
                member.pos,
                format!("module function requires call: {}", key),
            ));
        }
        if st.artifact_method_names.contains_key(&key) {
            return Err(Diag::new(
                member.pos,
                format!("artifact method requires call: {}", key),
            ));
        }
    }
    let base_type = infer_expr_type(st, &member.base)?;
    if !st.artifact_layouts.contains_key(&base_type.name) {
        return Err(Diag::new(member.pos, "member access base is not an artifact"));
    }
    emit_expr(st, &member.base, Some(&base_type))?;
    st.emit(format!("ldfld {}.{}", base_type.name, member.name));
    st.pop_stack(1);
    st.push_stack(1);
    Ok(())
}

fn emit_bracket_literal(
    st: &mut EmitState,
    bracket: &simplec_par::BracketLiteral,
    expected: Option<&TypeRef>,
) -> DiagResult<()> {
    let Some(expected) = expected else {
        return Err(Diag::new(
            bracket.pos,
            "array/list literal requires expected type",
        ));
    };
    if expected.dims.is_empty() {
        return Err(Diag::new(
            bracket.pos,
            "array/list literal requires array or list type",
        ));
    }
    let is_list = expected.dims[0].is_list();
    let element_type = expected
        .element_type()
        .ok_or_else(|| Diag::new(bracket.pos, "failed to resolve array/list element type"))?;
    let suffix = vm_op_suffix_for_type(&element_type);
    let elem_name = vm_type_name_for_element(&element_type);
    let (Some(suffix), Some(elem_name)) = (suffix, elem_name) else {
        return Err(Diag::new(
            bracket.pos,
            "unsupported array/list element type for SIR emission",
        ));
    };
    let length = bracket.elems.len();
    if is_list {
        st.emit(format!("newlist {} {}", elem_name, length));
    } else {
        st.emit(format!("newarray {} {}", elem_name, length));
    }
    st.push_stack(1);
    for (i, elem) in bracket.elems.iter().enumerate() {
        st.emit_dup();
        emit_expr(st, elem, Some(&element_type))?;
        if is_list {
            st.emit(format!("list.push.{}", suffix));
            st.pop_stack(2);
        } else {
            st.emit(format!("const.i32 {}", i));
            st.push_stack(1);
            st.emit("swap");
            st.emit(format!("array.set.{}", suffix));
            st.pop_stack(3);
        }
    }
    Ok(())
}

fn emit_artifact_literal(
    st: &mut EmitState,
    lit: &ArtifactLiteralExpr,
    expected: Option<&TypeRef>,
) -> DiagResult<()> {
    let Some(expected) = expected else {
        return Err(Diag::new(lit.pos, "artifact literal requires expected type"));
    };
    let layout = st
        .artifact_layouts
        .get(&expected.name)
        .cloned()
        .ok_or_else(|| Diag::new(lit.pos, "artifact literal expects artifact type"))?;

    let mut field_exprs: Vec<Option<&Expr>> = vec![None; layout.fields.len()];
    if lit.positional.len() > layout.fields.len() {
        return Err(Diag::new(
            lit.pos,
            "artifact literal has too many positional values",
        ));
    }
    for (i, value) in lit.positional.iter().enumerate() {
        field_exprs[i] = Some(value);
    }
    for (name, value) in &lit.named {
        let Some(index) = layout.field_index.get(name).copied() else {
            return Err(Diag::new(
                value.pos(),
                format!("unknown artifact field '{}'", name),
            ));
        };
        field_exprs[index] = Some(value);
    }

    st.emit(format!("newobj {}", expected.name));
    st.push_stack(1);
    for (field, value) in layout.fields.iter().zip(&field_exprs) {
        st.emit_dup();
        match value {
            Some(value) => emit_expr(st, value, Some(&field.ty))?,
            None => emit_default_init(st, &field.ty)?,
        }
        st.emit(format!("stfld {}.{}", expected.name, field.name));
        st.pop_stack(2);
    }
    Ok(())
}

/// Synthesizes a `__lambda<N>` function and pushes a closure for it.
fn emit_fn_literal(
    st: &mut EmitState,
    lit: &FnLiteralExpr,
    expected: Option<&TypeRef>,
) -> DiagResult<()> {
    let Some(expected) = expected.filter(|t| t.is_proc) else {
        return Err(Diag::new(lit.pos, "fn literal requires a proc-typed context"));
    };
    if !expected.proc_is_callback && lit.params.len() != expected.proc_params.len() {
        return Err(Diag::new(lit.pos, "fn literal parameter count mismatch"));
    }

    let name = format!("__lambda{}", st.lambda_counter);
    st.lambda_counter += 1;

    let return_type = expected
        .proc_return
        .as_deref()
        .cloned()
        .or_else(|| lit.return_type.clone())
        .unwrap_or_else(TypeRef::void);

    let body = parse_block_tokens(lit.body_tokens.clone())?;
    let lambda = FuncDecl {
        name: name.clone(),
        generics: Vec::new(),
        params: lit
            .params
            .iter()
            .map(|p| ParamDecl {
                name: p.name.clone(),
                ty: p.ty.clone(),
                mutability: p.mutability,
                pos: p.pos,
            })
            .collect(),
        return_type: return_type.clone(),
        return_mutability: expected.proc_return_mutability,
        body,
        pos: lit.pos,
    };

    let func_id = st.base_func_count + st.lambda_funcs.len() as u32;
    st.func_ids.insert(name.clone(), func_id);
    st.func_returns.insert(name.clone(), return_type);
    st.func_params.insert(
        name.clone(),
        lambda.params.iter().map(|p| p.ty.clone()).collect(),
    );
    st.lambda_funcs.push(lambda);

    st.emit(format!("newclosure {} 0", name));
    st.push_stack(1);
    Ok(())
}

// =============================================================================
// Unary operators
// =============================================================================

fn emit_unary(st: &mut EmitState, unary: &UnaryExpr, expected: Option<&TypeRef>) -> DiagResult<()> {
    let operand_type = infer_expr_type(st, &unary.operand)?;
    let use_type = expected.unwrap_or(&operand_type).clone();

    match unary.op {
        UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
            let is_inc = matches!(unary.op, UnOp::PreInc | UnOp::PostInc);
            let is_pre = matches!(unary.op, UnOp::PreInc | UnOp::PreDec);
            let op_name = if is_inc {
                inc_op_for_type(&use_type.name)
            } else {
                dec_op_for_type(&use_type.name)
            }
            .ok_or_else(|| {
                Diag::new(
                    unary.pos,
                    format!("unsupported inc/dec type '{}'", use_type.name),
                )
            })?
            .to_string();
            emit_inc_dec(st, unary, &op_name, is_pre)
        }
        UnOp::Neg => {
            emit_expr(st, &unary.operand, Some(&use_type))?;
            if !is_numeric_type(&use_type.name) {
                return Err(Diag::new(unary.pos, "unsupported unary operator '-'"));
            }
            st.emit(format!("neg.{}", use_type.name));
            Ok(())
        }
        UnOp::Not => {
            emit_expr(st, &unary.operand, Some(&use_type))?;
            if use_type.name != "bool" {
                return Err(Diag::new(unary.pos, "unsupported unary operator '!'"));
            }
            st.emit("bool.not");
            Ok(())
        }
    }
}

/// In-place increment/decrement. Pre-forms leave the new value, post-
/// forms the old. Index and member targets use dup/rot sequences so
/// the base is not re-evaluated for the read.
fn emit_inc_dec(
    st: &mut EmitState,
    unary: &UnaryExpr,
    op_name: &str,
    is_pre: bool,
) -> DiagResult<()> {
    match &unary.operand {
        Expr::Identifier(ident) => {
            let Some(index) = st.local_indices.get(&ident.name).copied() else {
                return Err(Diag::new(
                    ident.pos,
                    format!("unknown local '{}'", ident.name),
                ));
            };
            st.emit(format!("ldloc {}", index));
            st.push_stack(1);
            if is_pre {
                st.emit(op_name);
                st.emit_dup();
            } else {
                st.emit_dup();
                st.emit(op_name);
            }
            st.emit(format!("stloc {}", index));
            st.pop_stack(1);
            Ok(())
        }
        Expr::Index(target) => {
            let container_type = infer_expr_type(st, &target.base)?;
            if container_type.dims.is_empty() {
                return Err(Diag::new(
                    target.pos,
                    "indexing is only valid on arrays and lists",
                ));
            }
            let element_type = container_type
                .element_type()
                .ok_or_else(|| Diag::new(target.pos, "failed to resolve index element type"))?;
            let suffix = vm_op_suffix_for_type(&element_type).ok_or_else(|| {
                Diag::new(target.pos, "unsupported index element type for SIR emission")
            })?;
            let index_type = TypeRef::named("i32");
            emit_expr(st, &target.base, Some(&container_type))?;
            emit_expr(st, &target.index, Some(&index_type))?;
            emit_index_get_op(st, &container_type, suffix);
            if is_pre {
                st.emit(op_name);
                st.emit_dup();
            } else {
                st.emit_dup();
                st.emit(op_name);
            }
            emit_expr(st, &target.base, Some(&container_type))?;
            emit_expr(st, &target.index, Some(&index_type))?;
            st.emit("rot");
            emit_index_set_op(st, &container_type, suffix);
            Ok(())
        }
        Expr::Member(target) => {
            let base_type = infer_expr_type(st, &target.base)?;
            if !st.artifact_layouts.contains_key(&base_type.name) {
                return Err(Diag::new(target.pos, "member access base is not an artifact"));
            }
            emit_expr(st, &target.base, Some(&base_type))?;
            st.emit(format!("ldfld {}.{}", base_type.name, target.name));
            if is_pre {
                st.emit(op_name);
                st.emit_dup();
            } else {
                st.emit_dup();
                st.emit(op_name);
            }
            emit_expr(st, &target.base, Some(&base_type))?;
            st.emit("swap");
            st.emit(format!("stfld {}.{}", base_type.name, target.name));
            st.pop_stack(2);
            Ok(())
        }
        _ => Err(Diag::new(
            unary.pos,
            "inc/dec target not supported in SIR emission",
        )),
    }
}

// =============================================================================
// Binary operators
// =============================================================================

/// Emits the arithmetic/bitwise instruction for one binary op in the
/// lane of `type_name`; the two operands are already on the stack.
pub(crate) fn emit_binary_op(
    st: &mut EmitState,
    op: BinOp,
    type_name: &str,
    pos: simplec_util::Pos,
) -> DiagResult<()> {
    let lane = if op.is_bitwise() {
        normalize_bitwise_op_type(type_name)
    } else {
        normalize_numeric_op_type(type_name)
    }
    .ok_or_else(|| {
        Diag::new(
            pos,
            format!("unsupported operand type for '{}'", op.as_str()),
        )
    })?;
    let mnemonic = match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div => "div",
        BinOp::Rem => {
            if !is_integral_type(type_name) {
                return Err(Diag::new(
                    pos,
                    format!("unsupported operand type for '{}'", op.as_str()),
                ));
            }
            "mod"
        }
        BinOp::BitAnd => "and",
        BinOp::BitOr => "or",
        BinOp::BitXor => "xor",
        BinOp::Shl => "shl",
        BinOp::Shr => "shr",
        _ => {
            return Err(Diag::new(
                pos,
                format!("unsupported binary operator '{}'", op.as_str()),
            ));
        }
    };
    st.emit(format!("{}.{}", mnemonic, lane));
    Ok(())
}

fn emit_binary(
    st: &mut EmitState,
    binary: &BinaryExpr,
    expected: Option<&TypeRef>,
) -> DiagResult<()> {
    let mut left_type = infer_expr_type(st, &binary.lhs)?;
    let right_type = infer_expr_type(st, &binary.rhs)?;
    if left_type.name != right_type.name && expected.is_none() {
        if binary.lhs.is_integer_literal() && is_integral_type(&right_type.name) {
            left_type = right_type;
        } else if !(binary.rhs.is_integer_literal() && is_integral_type(&left_type.name)) {
            return Err(Diag::new(
                binary.pos,
                format!("operand type mismatch for '{}'", binary.op.as_str()),
            ));
        }
    }

    if matches!(binary.op, BinOp::LogicalAnd | BinOp::LogicalOr) {
        return emit_short_circuit(st, binary);
    }

    let op_type = match expected {
        Some(expected) => expected.clone(),
        None => left_type,
    };

    emit_expr(st, &binary.lhs, Some(&op_type))?;
    emit_expr(st, &binary.rhs, Some(&op_type))?;
    st.pop_stack(1);

    if binary.op.is_comparison() {
        let lane = normalize_numeric_op_type(&op_type.name).ok_or_else(|| {
            Diag::new(
                binary.pos,
                format!("unsupported operand type for '{}'", binary.op.as_str()),
            )
        })?;
        if op_type.name == "bool" {
            return Err(Diag::new(
                binary.pos,
                "bool comparisons not supported in SIR emission",
            ));
        }
        let cmp = match binary.op {
            BinOp::Eq => "cmp.eq",
            BinOp::Ne => "cmp.ne",
            BinOp::Lt => "cmp.lt",
            BinOp::Le => "cmp.le",
            BinOp::Gt => "cmp.gt",
            _ => "cmp.ge",
        };
        st.emit(format!("{}.{}", cmp, lane));
        return Ok(());
    }

    emit_binary_op(st, binary.op, &op_type.name, binary.pos)
}

/// `&&`/`||` short-circuit to explicit bool constants through labeled
/// jumps.
fn emit_short_circuit(st: &mut EmitState, binary: &BinaryExpr) -> DiagResult<()> {
    let bool_type = TypeRef::named("bool");
    emit_expr(st, &binary.lhs, Some(&bool_type))?;
    let is_and = binary.op == BinOp::LogicalAnd;
    let short_label = st.new_label(if is_and { "and_false_" } else { "or_true_" });
    let end_label = st.new_label("bool_end_");
    if is_and {
        st.emit(format!("jmp.false {}", short_label));
        st.pop_stack(1);
        emit_expr(st, &binary.rhs, Some(&bool_type))?;
        st.emit(format!("jmp.false {}", short_label));
        st.pop_stack(1);
        st.emit("const.bool 1");
        st.push_stack(1);
        st.emit(format!("jmp {}", end_label));
        st.emit_label(&short_label);
        st.emit("const.bool 0");
        st.push_stack(1);
        st.emit_label(&end_label);
    } else {
        st.emit(format!("jmp.true {}", short_label));
        st.pop_stack(1);
        emit_expr(st, &binary.rhs, Some(&bool_type))?;
        st.emit(format!("jmp.true {}", short_label));
        st.pop_stack(1);
        st.emit("const.bool 0");
        st.push_stack(1);
        st.emit(format!("jmp {}", end_label));
        st.emit_label(&short_label);
        st.emit("const.bool 1");
        st.push_stack(1);
        st.emit_label(&end_label);
    }
    // The two constant pushes are alternatives of one result slot.
    st.pop_stack(1);
    Ok(())
}

// =============================================================================
// Assignments
// =============================================================================

pub(crate) fn emit_local_assignment(
    st: &mut EmitState,
    name: &str,
    ty: &TypeRef,
    value: &Expr,
    op: AssignOp,
    return_value: bool,
    pos: simplec_util::Pos,
) -> DiagResult<()> {
    let Some(index) = st.local_indices.get(name).copied() else {
        return Err(Diag::new(pos, format!("unknown local '{}'", name)));
    };
    if let Some(bin_op) = op.binary_op() {
        st.emit(format!("ldloc {}", index));
        st.push_stack(1);
        emit_expr(st, value, Some(ty))?;
        st.pop_stack(1);
        emit_binary_op(st, bin_op, &ty.name, pos)?;
    } else {
        emit_expr(st, value, Some(ty))?;
    }
    st.emit(format!("stloc {}", index));
    st.pop_stack(1);
    if return_value {
        st.emit(format!("ldloc {}", index));
        st.push_stack(1);
    }
    Ok(())
}

pub(crate) fn emit_global_assignment(
    st: &mut EmitState,
    name: &str,
    ty: &TypeRef,
    value: &Expr,
    op: AssignOp,
    return_value: bool,
    pos: simplec_util::Pos,
) -> DiagResult<()> {
    let Some(index) = st.global_indices.get(name).copied() else {
        return Err(Diag::new(pos, format!("unknown global '{}'", name)));
    };
    if let Some(bin_op) = op.binary_op() {
        st.emit(format!("ldglob {}", index));
        st.push_stack(1);
        emit_expr(st, value, Some(ty))?;
        st.pop_stack(1);
        emit_binary_op(st, bin_op, &ty.name, pos)?;
    } else {
        emit_expr(st, value, Some(ty))?;
    }
    st.emit(format!("stglob {}", index));
    st.pop_stack(1);
    if return_value {
        st.emit(format!("ldglob {}", index));
        st.push_stack(1);
    }
    Ok(())
}

/// Assignment in expression position: performs the store and leaves
/// the stored value on the stack.
fn emit_assignment_expr(st: &mut EmitState, assign: &simplec_par::AssignExpr) -> DiagResult<()> {
    match &assign.target {
        Expr::Identifier(ident) => {
            if let Some(ty) = st.local_types.get(&ident.name).cloned() {
                return emit_local_assignment(
                    st,
                    &ident.name,
                    &ty,
                    &assign.value,
                    assign.op,
                    true,
                    assign.pos,
                );
            }
            if let Some(ty) = st.global_types.get(&ident.name).cloned() {
                return emit_global_assignment(
                    st,
                    &ident.name,
                    &ty,
                    &assign.value,
                    assign.op,
                    true,
                    assign.pos,
                );
            }
            Err(Diag::new(
                ident.pos,
                format!("unknown type for local '{}'", ident.name),
            ))
        }
        Expr::Index(target) => {
            let container_type = infer_expr_type(st, &target.base)?;
            if container_type.dims.is_empty() {
                return Err(Diag::new(
                    target.pos,
                    "index assignment expects array or list target",
                ));
            }
            let element_type = container_type
                .element_type()
                .ok_or_else(|| Diag::new(target.pos, "failed to resolve index element type"))?;
            let suffix = vm_op_suffix_for_type(&element_type).ok_or_else(|| {
                Diag::new(
                    target.pos,
                    "unsupported index assignment element type for SIR emission",
                )
            })?;
            emit_expr(st, &target.base, Some(&container_type))?;
            emit_expr(st, &target.index, Some(&TypeRef::named("i32")))?;
            if let Some(bin_op) = assign.op.binary_op() {
                st.emit_dup2();
                emit_index_get_op(st, &container_type, suffix);
                emit_expr(st, &assign.value, Some(&element_type))?;
                st.pop_stack(1);
                emit_binary_op(st, bin_op, &element_type.name, assign.pos)?;
                st.emit_dup();
                emit_index_set_op(st, &container_type, suffix);
                return Ok(());
            }
            emit_expr(st, &assign.value, Some(&element_type))?;
            st.emit_dup();
            emit_index_set_op(st, &container_type, suffix);
            Ok(())
        }
        Expr::Member(target) => {
            let base_type = infer_expr_type(st, &target.base)?;
            let field_type = member_field_type(st, &base_type, target)?;
            emit_expr(st, &target.base, Some(&base_type))?;
            if let Some(bin_op) = assign.op.binary_op() {
                st.emit_dup();
                st.emit(format!("ldfld {}.{}", base_type.name, target.name));
                emit_expr(st, &assign.value, Some(&field_type))?;
                st.pop_stack(1);
                emit_binary_op(st, bin_op, &field_type.name, assign.pos)?;
                st.emit_dup();
                st.emit(format!("stfld {}.{}", base_type.name, target.name));
                st.pop_stack(2);
                return Ok(());
            }
            emit_expr(st, &assign.value, Some(&field_type))?;
            st.emit_dup();
            st.emit(format!("stfld {}.{}", base_type.name, target.name));
            st.pop_stack(2);
            Ok(())
        }
        _ => Err(Diag::new(
            assign.pos,
            "assignment target not supported in SIR emission",
        )),
    }
}

pub(crate) fn member_field_type(
    st: &EmitState,
    base_type: &TypeRef,
    member: &MemberExpr,
) -> DiagResult<TypeRef> {
    let layout = st
        .artifact_layouts
        .get(&base_type.name)
        .ok_or_else(|| Diag::new(member.pos, "member assignment base is not an artifact"))?;
    let index = layout
        .field_index
        .get(&member.name)
        .copied()
        .ok_or_else(|| Diag::new(member.pos, format!("unknown field '{}'", member.name)))?;
    Ok(layout.fields[index].ty.clone())
}

// =============================================================================
// Calls
// =============================================================================

fn emit_call(st: &mut EmitState, call: &CallExpr) -> DiagResult<()> {
    if is_io_print_callee(&call.callee, st) {
        return emit_io_print_call(st, call);
    }

    if let Expr::Member(member) = &call.callee {
        // Dynamic-DL bound variable.
        if let Expr::Identifier(base) = &member.base {
            let dl_module = st
                .local_dl_modules
                .get(&base.name)
                .or_else(|| st.global_dl_modules.get(&base.name))
                .cloned();
            if let Some(dl_module) = dl_module {
                return emit_dynamic_dl_call(st, call, member, base, &dl_module);
            }
        }
        if let Some(raw_module) = module_name_from_expr(&member.base) {
            if let Some(resolved) = st.resolve_reserved_module(&raw_module) {
                if let Some(handled) = emit_reserved_intrinsic_call(st, call, member, &resolved)? {
                    return Ok(handled);
                }
                // Table-backed reserved members resolve through the
                // canonical extern tables below.
                return emit_module_member_call(st, call, member, &resolved, true);
            }
            return emit_module_member_call(st, call, member, &raw_module, false);
        }
        return emit_method_call(st, call, member);
    }

    if let Expr::FnLiteral(_) = call.callee {
        return Err(Diag::new(
            call.pos,
            "calling fn literal directly is not supported in SIR emission",
        ));
    }

    let Expr::Identifier(ident) = &call.callee else {
        return emit_indirect_call_via_type(st, call);
    };
    let name = ident.name.clone();

    if name == "len" {
        return emit_len_call(st, call);
    }
    if let Some(target) = name.strip_prefix('@') {
        return emit_cast_call(st, call, target);
    }

    if let Some(proc_type) = st.local_types.get(&name).filter(|t| t.is_proc).cloned() {
        return emit_indirect_call(st, call, &proc_type);
    }
    if let Some(proc_type) = st.global_types.get(&name).filter(|t| t.is_proc).cloned() {
        return emit_indirect_call(st, call, &proc_type);
    }
    if let Some(import_id) = st.extern_ids.get(&name).cloned() {
        let params = st.extern_params.get(&name).cloned().ok_or_else(|| {
            Diag::new(call.pos, format!("missing signature for extern '{}'", name))
        })?;
        let ret = st.extern_returns.get(&name).cloned().ok_or_else(|| {
            Diag::new(call.pos, format!("missing signature for extern '{}'", name))
        })?;
        return emit_import_call(st, call, &import_id, &params, &ret);
    }
    let Some(func_id) = st.func_ids.get(&name).copied() else {
        return Err(Diag::new(call.pos, format!("unknown function '{}'", name)));
    };
    let params = st
        .func_params
        .get(&name)
        .cloned()
        .ok_or_else(|| Diag::new(call.pos, format!("missing signature for '{}'", name)))?;
    if call.args.len() != params.len() {
        return Err(Diag::new(
            call.pos,
            format!("call argument count mismatch for '{}'", name),
        ));
    }
    for (arg, param) in call.args.iter().zip(&params) {
        emit_expr(st, arg, Some(param))?;
    }
    st.emit(format!("call {} {}", func_id, params.len()));
    st.pop_stack(params.len() as u32);
    if st.func_returns.get(&name).is_some_and(|r| r.name != "void") {
        st.push_stack(1);
    }
    Ok(())
}

/// Reserved members that lower to intrinsics rather than imports:
/// `Math.abs/min/max`, `Time.mono_ns/wall_ns`, `Core.DL.call_*`.
/// Returns `Ok(None)` when the member belongs to the extern tables.
fn emit_reserved_intrinsic_call(
    st: &mut EmitState,
    call: &CallExpr,
    member: &MemberExpr,
    resolved: &str,
) -> DiagResult<Option<()>> {
    let member_name = if resolved == "Core.DL" {
        simplec_util::normalize_core_dl_member(&member.name).to_string()
    } else {
        member.name.clone()
    };

    if resolved == "Math" {
        if member_name == "abs" {
            if call.args.len() != 1 {
                return Err(Diag::new(
                    call.pos,
                    "call argument count mismatch for 'Math.abs'",
                ));
            }
            let arg_type = infer_expr_type(st, &call.args[0])?;
            emit_expr(st, &call.args[0], Some(&arg_type))?;
            let id = match arg_type.name.as_str() {
                "i32" => intrinsic::ABS_I32,
                "i64" => intrinsic::ABS_I64,
                _ => return Err(Diag::new(call.pos, "Math.abs expects i32 or i64")),
            };
            st.emit(format!("intrinsic {}", id));
            st.pop_stack(1);
            st.push_stack(1);
            return Ok(Some(()));
        }
        if member_name == "min" || member_name == "max" {
            if call.args.len() != 2 {
                return Err(Diag::new(
                    call.pos,
                    format!("call argument count mismatch for 'Math.{}'", member.name),
                ));
            }
            let arg_type = infer_expr_type(st, &call.args[0])?;
            emit_expr(st, &call.args[0], Some(&arg_type))?;
            emit_expr(st, &call.args[1], Some(&arg_type))?;
            let is_min = member_name == "min";
            let id = match arg_type.name.as_str() {
                "i32" => {
                    if is_min {
                        intrinsic::MIN_I32
                    } else {
                        intrinsic::MAX_I32
                    }
                }
                "i64" => {
                    if is_min {
                        intrinsic::MIN_I64
                    } else {
                        intrinsic::MAX_I64
                    }
                }
                "f32" => {
                    if is_min {
                        intrinsic::MIN_F32
                    } else {
                        intrinsic::MAX_F32
                    }
                }
                "f64" => {
                    if is_min {
                        intrinsic::MIN_F64
                    } else {
                        intrinsic::MAX_F64
                    }
                }
                _ =>

                {
                    return Err(Diag::new(
                        call.pos,
                        format!("Math.{} expects numeric type", member.name),
                    ));
                }
            };
            st.emit(format!("intrinsic {}", id));
            st.pop_stack(2);
            st.push_stack(1);
            return Ok(Some(()));
        }
        return Ok(None);
    }

    if resolved == "Time" {
        if member_name == "mono_ns" || member_name == "wall_ns" {
            if !call.args.is_empty() {
                return Err(Diag::new(
                    call.pos,
                    format!("Time.{} expects no arguments", member_name),
                ));
            }
            let id = if member_name == "mono_ns" {
                intrinsic::MONO_NS
            } else {
                intrinsic::WALL_NS
            };
            st.emit(format!("intrinsic {}", id));
            st.push_stack(1);
            return Ok(Some(()));
        }
        return Ok(None);
    }

    if resolved == "Core.DL" {
        match member_name.as_str() {
            "open" => {
                if call.args.len() != 1 && call.args.len() != 2 {
                    return Err(Diag::new(
                        call.pos,
                        "call argument count mismatch for 'Core.DL.open'",
                    ));
                }
                let import_id = st
                    .extern_ids_by_module
                    .get(resolved)
                    .and_then(|symbols| symbols.get("open"))
                    .cloned()
                    .ok_or_else(|| {
                        Diag::new(call.pos, "missing extern id for 'Core.DL.open'")
                    })?;
                // The manifest argument is a compile-time binding, not
                // a runtime value; only the path is passed through.
                emit_expr(st, &call.args[0], Some(&TypeRef::named("string")))?;
                st.emit(format!("call {} 1", import_id));
                st.pop_stack(1);
                st.push_stack(1);
                return Ok(Some(()));
            }
            "call_i32" | "call_i64" | "call_f32" | "call_f64" => {
                if call.args.len() != 3 {
                    return Err(Diag::new(
                        call.pos,
                        format!(
                            "call argument count mismatch for 'Core.DL.{}'",
                            member_name
                        ),
                    ));
                }
                let (arg_name, id) = match member_name.as_str() {
                    "call_i32" => ("i32", intrinsic::DL_CALL_I32),
                    "call_i64" => ("i64", intrinsic::DL_CALL_I64),
                    "call_f32" => ("f32", intrinsic::DL_CALL_F32),
                    _ => ("f64", intrinsic::DL_CALL_F64),
                };
                emit_expr(st, &call.args[0], Some(&TypeRef::named("i64")))?;
                emit_expr(st, &call.args[1], Some(&TypeRef::named(arg_name)))?;
                emit_expr(st, &call.args[2], Some(&TypeRef::named(arg_name)))?;
                st.emit(format!("intrinsic {}", id));
                st.pop_stack(3);
                st.push_stack(1);
                return Ok(Some(()));
            }
            "call_str0" => {
                if call.args.len() != 1 {
                    return Err(Diag::new(
                        call.pos,
                        "call argument count mismatch for 'Core.DL.call_str0'",
                    ));
                }
                emit_expr(st, &call.args[0], Some(&TypeRef::named("i64")))?;
                st.emit(format!("intrinsic {}", intrinsic::DL_CALL_STR0));
                st.pop_stack(1);
                st.push_stack(1);
                return Ok(Some(()));
            }
            _ => return Ok(None),
        }
    }

    Ok(None)
}

/// User-module functions, reserved extern imports, and module-scoped
/// externs; falls back to artifact method dispatch.
fn emit_module_member_call(
    st: &mut EmitState,
    call: &CallExpr,
    member: &MemberExpr,
    module: &str,
    is_reserved: bool,
) -> DiagResult<()> {
    let member_name = if is_reserved && module == "Core.DL" {
        simplec_util::normalize_core_dl_member(&member.name).to_string()
    } else {
        member.name.clone()
    };
    let key = format!("{}.{}", module, member_name);

    if let Some(emit_name) = st.module_func_names.get(&key).cloned() {
        let params = st
            .func_params
            .get(&emit_name)
            .cloned()
            .ok_or_else(|| Diag::new(call.pos, format!("missing signature for '{}'", key)))?;
        if call.args.len() != params.len() {
            return Err(Diag::new(
                call.pos,
                format!("call argument count mismatch for '{}'", key),
            ));
        }
        for (arg, param) in call.args.iter().zip(&params) {
            emit_expr(st, arg, Some(param))?;
        }
        let func_id = st
            .func_ids
            .get(&emit_name)
            .copied()
            .ok_or_else(|| Diag::new(call.pos, format!("unknown function '{}'", key)))?;
        st.emit(format!("call {} {}", func_id, params.len()));
        st.pop_stack(params.len() as u32);
        if st
            .func_returns
            .get(&emit_name)
            .is_some_and(|r| r.name != "void")
        {
            st.push_stack(1);
        }
        return Ok(());
    }

    if let Some(import_id) = st
        .extern_ids_by_module
        .get(module)
        .and_then(|symbols| symbols.get(&member_name))
        .cloned()
    {
        let params = st
            .extern_params_by_module
            .get(module)
            .and_then(|m| m.get(&member_name))
            .cloned()
            .ok_or_else(|| {
                Diag::new(call.pos, format!("missing signature for extern '{}'", key))
            })?;
        let ret = st
            .extern_returns_by_module
            .get(module)
            .and_then(|m| m.get(&member_name))
            .cloned()
            .ok_or_else(|| {
                Diag::new(call.pos, format!("missing signature for extern '{}'", key))
            })?;
        if call.args.len() != params.len() {
            return Err(Diag::new(
                call.pos,
                format!("call argument count mismatch for '{}'", key),
            ));
        }
        return emit_import_call(st, call, &import_id, &params, &ret);
    }

    emit_method_call(st, call, member)
}

fn emit_import_call(
    st: &mut EmitState,
    call: &CallExpr,
    import_id: &str,
    params: &[TypeRef],
    ret: &TypeRef,
) -> DiagResult<()> {
    if call.args.len() != params.len() {
        return Err(Diag::new(
            call.pos,
            "call argument count mismatch for extern call",
        ));
    }
    for (arg, param) in call.args.iter().zip(params) {
        emit_expr(st, arg, Some(param))?;
    }
    st.emit(format!("call {} {}", import_id, params.len()));
    st.pop_stack(params.len() as u32);
    if ret.name != "void" {
        st.push_stack(1);
    }
    Ok(())
}

/// Method dispatch on an artifact value: `self` rides as the first
/// argument of the hoisted `Artifact__method` function.
fn emit_method_call(st: &mut EmitState, call: &CallExpr, member: &MemberExpr) -> DiagResult<()> {
    let base_type = infer_expr_type(st, &member.base)
        .map_err(|_| Diag::new(call.pos, "call target not supported in SIR emission"))?;
    let key = format!("{}.{}", base_type.name, member.name);
    let Some(emit_name) = st.artifact_method_names.get(&key).cloned() else {
        return Err(Diag::new(
            call.pos,
            "call target not supported in SIR emission",
        ));
    };
    let params = st
        .func_params
        .get(&emit_name)
        .cloned()
        .ok_or_else(|| Diag::new(call.pos, format!("missing signature for '{}'", key)))?;
    if call.args.len() + 1 != params.len() {
        return Err(Diag::new(
            call.pos,
            format!("call argument count mismatch for '{}'", key),
        ));
    }
    emit_expr(st, &member.base, Some(&base_type))?;
    for (arg, param) in call.args.iter().zip(&params[1..]) {
        emit_expr(st, arg, Some(param))?;
    }
    let func_id = st
        .func_ids
        .get(&emit_name)
        .copied()
        .ok_or_else(|| Diag::new(call.pos, format!("unknown function '{}'", key)))?;
    st.emit(format!("call {} {}", func_id, params.len()));
    st.pop_stack(params.len() as u32);
    if st
        .func_returns
        .get(&emit_name)
        .is_some_and(|r| r.name != "void")
    {
        st.push_stack(1);
    }
    Ok(())
}

/// Dynamic DL symbol call: resolve the address via `Core.DL.sym`, then
/// invoke the synthesized `core.dl call$<n>` import with the address
/// plus the ABI arguments.
fn emit_dynamic_dl_call(
    st: &mut EmitState,
    call: &CallExpr,
    member: &MemberExpr,
    base: &simplec_par::IdentExpr,
    dl_module: &str,
) -> DiagResult<()> {
    let params = st
        .extern_params_by_module
        .get(dl_module)
        .and_then(|m| m.get(&member.name))
        .cloned()
        .ok_or_else(|| {
            Diag::new(
                call.pos,
                format!("unknown dynamic symbol: {}.{}", base.name, member.name),
            )
        })?;
    let ret = st
        .extern_returns_by_module
        .get(dl_module)
        .and_then(|m| m.get(&member.name))
        .cloned()
        .ok_or_else(|| {
            Diag::new(
                call.pos,
                format!("unknown dynamic symbol: {}.{}", base.name, member.name),
            )
        })?;
    if call.args.len() != params.len() {
        return Err(Diag::new(
            call.pos,
            format!(
                "call argument count mismatch for dynamic symbol '{}.{}'",
                base.name, member.name
            ),
        ));
    }
    let call_import_id = st
        .dl_call_import_ids_by_module
        .get(dl_module)
        .and_then(|m| m.get(&member.name))
        .cloned()
        .ok_or_else(|| {
            Diag::new(
                call.pos,
                format!("missing dynamic DL call import: {}.{}", dl_module, member.name),
            )
        })?;
    let sym_import_id = st
        .extern_ids_by_module
        .get("Core.DL")
        .and_then(|symbols| symbols.get("sym"))
        .cloned()
        .ok_or_else(|| {
            Diag::new(call.pos, "missing Core.DL.sym import for dynamic symbol calls")
        })?;

    emit_expr(st, &member.base, Some(&TypeRef::named("i64")))?;
    let symbol_const = st.add_string_const(&member.name)?;
    st.emit(format!("const.string {}", symbol_const));
    st.push_stack(1);
    st.emit(format!("call {} 2", sym_import_id));
    st.pop_stack(2);
    st.push_stack(1);

    let mut abi_arg_count: u32 = 1;
    for (arg, param) in call.args.iter().zip(&params) {
        emit_expr(st, arg, Some(param))?;
        abi_arg_count += 1;
    }
    if abi_arg_count > 255 {
        return Err(Diag::new(
            call.pos,
            "dynamic DL call has too many ABI parameters",
        ));
    }
    st.emit(format!("call {} {}", call_import_id, abi_arg_count));
    st.pop_stack(abi_arg_count);
    if ret.name != "void" {
        st.push_stack(1);
    }
    Ok(())
}

fn emit_len_call(st: &mut EmitState, call: &CallExpr) -> DiagResult<()> {
    if call.args.len() != 1 {
        return Err(Diag::new(
            call.pos,
            "call argument count mismatch for 'len'",
        ));
    }
    let arg_type = infer_expr_type(st, &call.args[0])?;
    emit_expr(st, &call.args[0], Some(&arg_type))?;
    if arg_type.name == "string" && arg_type.dims.is_empty() {
        st.emit("string.len");
    } else if !arg_type.dims.is_empty() {
        if arg_type.dims[0].is_list() {
            st.emit("list.len");
        } else {
            st.emit("array.len");
        }
    } else {
        return Err(Diag::new(
            call.pos,
            "len expects array, list, or string argument",
        ));
    }
    st.pop_stack(1);
    st.push_stack(1);
    Ok(())
}

/// `@T(x)` primitive casts. Cross-lane casts emit `conv.*`; same-lane
/// casts to `i32` are normalized with `const.i32 0` + `add.i32`, a
/// `u64 -> i64` cast masks with `const.i64 -1` + `and.i64`, and
/// `@i32(bool)` is rejected.
fn emit_cast_call(st: &mut EmitState, call: &CallExpr, target: &str) -> DiagResult<()> {
    if call.args.len() != 1 {
        return Err(Diag::new(
            call.pos,
            format!("call argument count mismatch for '{}'", target),
        ));
    }
    let arg_type = infer_expr_type(st, &call.args[0])?;
    emit_expr(st, &call.args[0], Some(&arg_type))?;
    let src = cast_vm_kind(&arg_type.name);
    let dst = cast_vm_kind(target);
    let (Some(src), Some(dst)) = (src, dst) else {
        return Err(Diag::new(
            call.pos,
            format!(
                "unsupported cast in SIR emission: {} -> {}",
                arg_type.name, target
            ),
        ));
    };
    if src != dst {
        let conv = conv_instruction(src, dst).ok_or_else(|| {
            Diag::new(
                call.pos,
                format!(
                    "unsupported cast in SIR emission: {} -> {}",
                    arg_type.name, target
                ),
            )
        })?;
        st.emit(conv);
        return Ok(());
    }
    if arg_type.name != target {
        if dst == CastVmKind::I32 && target == "i32" {
            if arg_type.name == "bool" {
                return Err(Diag::new(
                    call.pos,
                    format!(
                        "unsupported cast in SIR emission: {} -> {}",
                        arg_type.name, target
                    ),
                ));
            }
            st.emit("const.i32 0");
            st.push_stack(1);
            st.emit("add.i32");
            st.pop_stack(2);
            st.push_stack(1);
        } else if dst == CastVmKind::I64 && target == "i64" && arg_type.name == "u64" {
            st.emit("const.i64 -1");
            st.push_stack(1);
            st.emit("and.i64");
            st.pop_stack(2);
            st.push_stack(1);
        }
    }
    Ok(())
}

/// Indirect call through a procedure-typed value: arguments first,
/// closure last, `call.indirect` against the deduplicated proc sig.
fn emit_indirect_call(st: &mut EmitState, call: &CallExpr, proc_type: &TypeRef) -> DiagResult<()> {
    // A `callback` value has unknown arity; the signature is built
    // from the argument types with a void return.
    let proc_type = if proc_type.proc_is_callback {
        let mut params = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            params.push(infer_expr_type(st, arg)?);
        }
        TypeRef {
            is_proc: true,
            proc_params: params,
            proc_return: Some(Box::new(TypeRef::void())),
            ..Default::default()
        }
    } else {
        proc_type.clone()
    };
    if call.args.len() != proc_type.proc_params.len() {
        return Err(Diag::new(
            call.pos,
            "call argument count mismatch for callee",
        ));
    }
    for (arg, param) in call.args.iter().zip(&proc_type.proc_params) {
        emit_expr(st, arg, Some(param))?;
    }
    emit_expr(st, &call.callee, Some(&proc_type))?;
    let sig_name = get_proc_sig_name(st, &proc_type)?;
    st.emit(format!(
        "call.indirect {} {}",
        sig_name,
        proc_type.proc_params.len()
    ));
    st.pop_stack(proc_type.proc_params.len() as u32 + 1);
    if proc_type
        .proc_return
        .as_ref()
        .is_some_and(|r| r.name != "void")
    {
        st.push_stack(1);
    }
    Ok(())
}

fn emit_indirect_call_via_type(st: &mut EmitState, call: &CallExpr) -> DiagResult<()> {
    let callee_type = infer_expr_type(st, &call.callee)?;
    if !callee_type.is_proc {
        return Err(Diag::new(
            call.pos,
            "call target not supported in SIR emission",
        ));
    }
    emit_indirect_call(st, call, &callee_type)
}

/// Deduplicated indirect-call signature names (`sig_proc_<n>`).
pub(crate) fn get_proc_sig_name(st: &mut EmitState, proc_type: &TypeRef) -> DiagResult<String> {
    let ret = match &proc_type.proc_return {
        Some(ret) => sig_type_name(ret, st)?,
        None => "void".to_string(),
    };
    let mut key = format!("{}|", ret);
    let mut param_names = Vec::with_capacity(proc_type.proc_params.len());
    for (i, param) in proc_type.proc_params.iter().enumerate() {
        let name = sig_type_name(param, st)?;
        if i > 0 {
            key.push(',');
        }
        key.push_str(&name);
        param_names.push(name);
    }
    if let Some(name) = st.proc_sig_names.get(&key) {
        return Ok(name.clone());
    }
    let name = format!("sig_proc_{}", st.proc_sig_names.len());
    let line = format!("  sig {}: ({}) -> {}", name, param_names.join(", "), ret);
    st.proc_sig_names.insert(key, name.clone());
    st.proc_sig_lines.push(line);
    Ok(name)
}

/// `IO.print`/`IO.println`: single scalar, or a format literal split
/// around `{}` with one PrintAny per segment and value; `println`
/// appends a newline.
fn emit_io_print_call(st: &mut EmitState, call: &CallExpr) -> DiagResult<()> {
    let Expr::Member(member) = &call.callee else {
        return Err(Diag::new(call.pos, "IO.print call expects member callee"));
    };
    if call.args.is_empty() {
        return Err(Diag::new(
            call.pos,
            format!("call argument count mismatch for 'IO.{}'", member.name),
        ));
    }
    if call.args.len() == 1 {
        let arg_type = infer_expr_type(st, &call.args[0])?;
        emit_print_any_value(st, &call.args[0], &arg_type)?;
    } else {
        let Expr::Literal(fmt) = &call.args[0] else {
            return Err(Diag::new(
                call.pos,
                "IO.print format call expects string literal as first argument",
            ));
        };
        if fmt.kind != LiteralKind::String {
            return Err(Diag::new(
                call.pos,
                "IO.print format call expects string literal as first argument",
            ));
        }
        let segments = split_format_placeholders(&fmt.text, fmt.pos)?;
        let placeholder_count = segments.len() - 1;
        if placeholder_count != call.args.len() - 1 {
            return Err(Diag::new(
                call.pos,
                format!(
                    "IO.print format placeholder count mismatch: expected {}, got {}",
                    placeholder_count,
                    call.args.len() - 1
                ),
            ));
        }
        for (segment, value) in segments[..placeholder_count].iter().zip(&call.args[1..]) {
            if !segment.is_empty() {
                emit_print_segment(st, segment, fmt.pos)?;
            }
            let arg_type = infer_expr_type(st, value)?;
            emit_print_any_value(st, value, &arg_type)?;
        }
        if let Some(last) = segments.last() {
            if !last.is_empty() {
                emit_print_segment(st, last, fmt.pos)?;
            }
        }
    }
    if member.name == "println" {
        emit_print_newline(st, call.pos)?;
    }
    Ok(())
}

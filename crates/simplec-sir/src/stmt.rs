//! Statement lowering and per-function emission.

use simplec_par::{FuncDecl, Stmt, TypeRef};
use simplec_util::{Diag, DiagResult};

use crate::expr::*;
use crate::state::{EmitState, FuncItem};
use crate::types::{is_supported_type, vm_op_suffix_for_type};

pub(crate) fn emit_block(st: &mut EmitState, body: &[Stmt]) -> DiagResult<()> {
    for stmt in body {
        emit_stmt(st, stmt)?;
    }
    Ok(())
}

pub(crate) fn emit_stmt(st: &mut EmitState, stmt: &Stmt) -> DiagResult<()> {
    match stmt {
        Stmt::VarDecl(var) => {
            let ty = var.ty.resolve_fn_shorthand(var.init.as_ref());
            if !is_supported_type(&ty) {
                return Err(Diag::new(
                    var.pos,
                    format!("unsupported type for local '{}'", var.name),
                ));
            }
            if st.local_indices.contains_key(&var.name) {
                return Err(Diag::new(
                    var.pos,
                    format!("duplicate local '{}'", var.name),
                ));
            }
            let index = st.next_local;
            st.next_local += 1;
            st.local_indices.insert(var.name.clone(), index);
            st.local_types.insert(var.name.clone(), ty.clone());
            if let Some(init) = &var.init {
                if let Some(manifest) = dl_open_manifest_module(st, init) {
                    st.local_dl_modules.insert(var.name.clone(), manifest);
                }
                emit_expr(st, init, Some(&ty))?;
            } else {
                emit_default_init(st, &ty)?;
            }
            st.emit(format!("stloc {}", index));
            st.pop_stack(1);
            Ok(())
        }
        Stmt::Assign(assign) => match &assign.target {
            simplec_par::Expr::Identifier(ident) => {
                if let Some(ty) = st.local_types.get(&ident.name).cloned() {
                    return emit_local_assignment(
                        st,
                        &ident.name,
                        &ty,
                        &assign.value,
                        assign.op,
                        false,
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
                        false,
                        assign.pos,
                    );
                }
                Err(Diag::new(
                    ident.pos,
                    format!("unknown type for local '{}'", ident.name),
                ))
            }
            simplec_par::Expr::Index(target) => {
                let container_type = infer_expr_type(st, &target.base)?;
                if container_type.dims.is_empty() {
                    return Err(Diag::new(
                        target.pos,
                        "index assignment expects array or list target",
                    ));
                }
                let element_type = container_type.element_type().ok_or_else(|| {
                    Diag::new(target.pos, "failed to resolve index element type")
                })?;
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
                    emit_index_set_op(st, &container_type, suffix);
                    return Ok(());
                }
                emit_expr(st, &assign.value, Some(&element_type))?;
                emit_index_set_op(st, &container_type, suffix);
                Ok(())
            }
            simplec_par::Expr::Member(target) => {
                let base_type = infer_expr_type(st, &target.base)?;
                let field_type = member_field_type(st, &base_type, target)?;
                emit_expr(st, &target.base, Some(&base_type))?;
                if let Some(bin_op) = assign.op.binary_op() {
                    st.emit_dup();
                    st.emit(format!("ldfld {}.{}", base_type.name, target.name));
                    emit_expr(st, &assign.value, Some(&field_type))?;
                    st.pop_stack(1);
                    emit_binary_op(st, bin_op, &field_type.name, assign.pos)?;
                    st.emit(format!("stfld {}.{}", base_type.name, target.name));
                    st.pop_stack(2);
                    return Ok(());
                }
                emit_expr(st, &assign.value, Some(&field_type))?;
                st.emit(format!("stfld {}.{}", base_type.name, target.name));
                st.pop_stack(2);
                Ok(())
            }
            _ => Err(Diag::new(
                assign.pos,
                "assignment target not supported in SIR emission",
            )),
        },
        Stmt::Expr(expr) => {
            // Void-typed expressions leave nothing to discard.
            let pop_result = match infer_expr_type(st, expr) {
                Ok(ty) => ty.name != "void",
                Err(_) => true,
            };
            emit_expr(st, expr, None)?;
            if pop_result {
                st.emit("pop");
                st.pop_stack(1);
            }
            Ok(())
        }
        Stmt::Return(ret) => {
            if let Some(value) = &ret.value {
                let expected = st
                    .func_returns
                    .get(&st.current_func)
                    .filter(|t| t.name != "void")
                    .cloned();
                emit_expr(st, value, expected.as_ref())?;
            }
            st.emit("ret");
            st.stack_cur = 0;
            st.saw_return = true;
            Ok(())
        }
        Stmt::If(if_stmt) => {
            let else_label = st.new_label("if_else_");
            let end_label = st.new_label("if_end_");
            emit_expr(st, &if_stmt.cond, None)?;
            st.emit(format!("jmp.false {}", else_label));
            st.pop_stack(1);
            emit_block(st, &if_stmt.then_body)?;
            st.emit(format!("jmp {}", end_label));
            st.emit_label(&else_label);
            if !if_stmt.else_body.is_empty() {
                emit_block(st, &if_stmt.else_body)?;
            }
            st.emit_label(&end_label);
            Ok(())
        }
        Stmt::IfChain(chain) => {
            let end_label = st.new_label("if_end_");
            for (cond, body) in &chain.branches {
                let next_label = st.new_label("if_next_");
                emit_expr(st, cond, None)?;
                st.emit(format!("jmp.false {}", next_label));
                st.pop_stack(1);
                emit_block(st, body)?;
                st.emit(format!("jmp {}", end_label));
                st.emit_label(&next_label);
            }
            if !chain.else_body.is_empty() {
                emit_block(st, &chain.else_body)?;
            }
            st.emit_label(&end_label);
            Ok(())
        }
        Stmt::While(while_stmt) => {
            let start_label = st.new_label("while_start_");
            let end_label = st.new_label("while_end_");
            st.loop_stack.push((end_label.clone(), start_label.clone()));
            st.emit_label(&start_label);
            emit_expr(st, &while_stmt.cond, None)?;
            st.emit(format!("jmp.false {}", end_label));
            st.pop_stack(1);
            emit_block(st, &while_stmt.body)?;
            st.emit(format!("jmp {}", start_label));
            st.emit_label(&end_label);
            st.loop_stack.pop();
            Ok(())
        }
        Stmt::For(for_stmt) => {
            let start_label = st.new_label("for_start_");
            let step_label = st.new_label("for_step_");
            let end_label = st.new_label("for_end_");
            if let Some(var) = &for_stmt.var_decl {
                emit_stmt(st, &Stmt::VarDecl(var.clone()))?;
            }
            if let Some(init) = &for_stmt.init {
                emit_expr(st, init, None)?;
                st.emit("pop");
                st.pop_stack(1);
            }
            st.loop_stack.push((end_label.clone(), step_label.clone()));
            st.emit_label(&start_label);
            emit_expr(st, &for_stmt.cond, None)?;
            st.emit(format!("jmp.false {}", end_label));
            st.pop_stack(1);
            emit_block(st, &for_stmt.body)?;
            st.emit_label(&step_label);
            emit_expr(st, &for_stmt.step, None)?;
            st.emit("pop");
            st.pop_stack(1);
            st.emit(format!("jmp {}", start_label));
            st.emit_label(&end_label);
            st.loop_stack.pop();
            Ok(())
        }
        Stmt::Break(pos) => {
            let Some((break_label, _)) = st.loop_stack.last().cloned() else {
                return Err(Diag::new(*pos, "break outside loop"));
            };
            st.emit(format!("jmp {}", break_label));
            Ok(())
        }
        Stmt::Skip(pos) => {
            let Some((_, continue_label)) = st.loop_stack.last().cloned() else {
                return Err(Diag::new(*pos, "skip outside loop"));
            };
            st.emit(format!("jmp {}", continue_label));
            Ok(())
        }
    }
}

/// `Core.DL.open(path, Manifest)` initializer detection.
fn dl_open_manifest_module(st: &EmitState, expr: &simplec_par::Expr) -> Option<String> {
    let simplec_par::Expr::Call(call) = expr else {
        return None;
    };
    let simplec_par::Expr::Member(member) = &call.callee else {
        return None;
    };
    let module = module_name_from_expr(&member.base)?;
    let resolved = st.resolve_reserved_module(&module)?;
    if resolved != "Core.DL" || simplec_util::normalize_core_dl_member(&member.name) != "open" {
        return None;
    }
    if call.args.len() != 2 {
        return None;
    }
    let simplec_par::Expr::Identifier(manifest) = &call.args[1] else {
        return None;
    };
    st.extern_params_by_module
        .contains_key(&manifest.name)
        .then(|| manifest.name.clone())
}

/// Emits one function: frame setup, globals-init hook, the body, an
/// implicit return, and the finalized `locals=`/`stack=` header.
pub(crate) fn emit_function(
    st: &mut EmitState,
    item: &FuncItem,
    is_entry: bool,
) -> DiagResult<String> {
    let fn_decl: &FuncDecl = &item.decl;
    let stmt_body: &[Stmt] = item
        .script_body
        .as_deref()
        .unwrap_or(&fn_decl.body);

    if !fn_decl.generics.is_empty() {
        return Err(Diag::new(
            fn_decl.pos,
            "generic functions not supported in SIR emission",
        ));
    }
    if !is_supported_type(&fn_decl.return_type) {
        return Err(Diag::new(
            fn_decl.pos,
            format!(
                "unsupported return type for function '{}'",
                item.display_name
            ),
        ));
    }

    st.current_func = item.emit_name.clone();
    st.local_indices.clear();
    st.local_types.clear();
    st.local_dl_modules.clear();
    st.next_local = 0;
    st.stack_cur = 0;
    st.stack_max = 0;
    st.saw_return = false;
    st.label_counter = 0;
    st.loop_stack.clear();
    st.out.clear();

    if let Some(self_type) = &item.self_type {
        let index = st.next_local;
        st.next_local += 1;
        st.local_indices.insert("self".to_string(), index);
        st.local_types.insert("self".to_string(), self_type.clone());
    }
    for param in &fn_decl.params {
        let index = st.next_local;
        st.next_local += 1;
        st.local_indices.insert(param.name.clone(), index);
        st.local_types.insert(param.name.clone(), param.ty.clone());
    }

    let global_init_name = st.global_init_func_name.clone();
    if let Some(init_name) = &global_init_name {
        if is_entry && item.emit_name != *init_name {
            let init_id = st
                .func_ids
                .get(init_name)
                .copied()
                .ok_or_else(|| Diag::message("missing global init function id"))?;
            st.emit(format!("call {} 0", init_id));
        }
    }

    if global_init_name.as_deref() == Some(item.emit_name.as_str()) {
        let globals: Vec<(String, TypeRef, simplec_par::Expr)> = st
            .global_types
            .iter()
            .filter_map(|(name, ty)| {
                st.global_init_exprs
                    .get(name)
                    .map(|init| (name.clone(), ty.clone(), init.clone()))
            })
            .collect();
        let mut ordered: Vec<_> = globals;
        ordered.sort_by_key(|(name, _, _)| st.global_indices.get(name).copied().unwrap_or(0));
        for (name, ty, init) in ordered {
            emit_expr(st, &init, Some(&ty))?;
            let index = st
                .global_indices
                .get(&name)
                .copied()
                .ok_or_else(|| {
                    Diag::message(format!("unknown global in init function '{}'", name))
                })?;
            st.emit(format!("stglob {}", index));
            st.pop_stack(1);
        }
    }

    for stmt in stmt_body {
        emit_stmt(st, stmt)
            .map_err(|d| d.in_context(&format!("in function '{}'", item.display_name)))?;
    }

    if !st.saw_return {
        if (fn_decl.name == "main" || is_entry) && fn_decl.return_type.name == "i32" {
            st.emit("const.i32 0");
            st.push_stack(1);
        }
        st.emit("ret");
    }

    let body = st.take_body();
    let total_locals = st.next_local;
    let stack = if st.stack_max > 0 { st.stack_max } else { 8 };
    let mut text = format!(
        "func {} locals={} stack={} sig={}\n  enter {}\n",
        item.emit_name, total_locals, stack, item.emit_name, total_locals
    );
    text.push_str(&body);
    text.push_str("end\n");
    Ok(text)
}

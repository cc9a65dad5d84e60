//! simplec-sir - Lowering of a validated program to one textual SIR
//! module.
//!
//! The module text is assembled in a fixed order: `types:` (artifact
//! layouts and enums), `sigs:` (functions, imports, indirect-call
//! signatures), `consts:`, `globals:`, `imports:`, one `func .. end`
//! block per function, and a final `entry` line. Emission fails fast on
//! anything the downstream verifier would reject; the program has
//! already passed semantic validation when lowering starts.

mod expr;
mod layout;
mod state;
mod stmt;
mod types;


use simplec_par::{parse_program_str, Decl, FuncDecl, Program, TypeRef};
use simplec_util::{
    canonicalize_reserved_import, default_import_alias, is_acceptable_reserved_spelling,
    parse_integer_literal, reserved_member_signature, AbiType, Diag, DiagResult,
};

use state::{EmitState, FuncItem, ImportItem};

/// Validates and lowers a program to SIR text.
///
/// # Examples
///
/// ```
/// use simplec_sir::emit_sir_source;
///
/// let sir = emit_sir_source("main : i32 () { return 40 + 2; }").unwrap();
/// assert!(sir.contains("func main"));
/// assert!(sir.contains("entry main"));
/// ```
pub fn emit_sir(program: &Program) -> DiagResult<String> {
    simplec_sem::validate_program(program)?;
    emit_program_impl(program)
}

/// Parses, validates, and lowers in one step.
pub fn emit_sir_source(source: &str) -> DiagResult<String> {
    let program = parse_program_str(source)?;
    emit_sir(&program)
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

/// Extern wire-module normalization (`core_os` spellings map to the
/// dotted wire names).
fn resolve_import_module(module: &str) -> &str {
    match module {
        "core_os" => "core.os",
        "core_fs" => "core.fs",
        "core_log" => "core.log",
        "core_dl" => "core.dl",
        other => other,
    }
}

/// Adds one import with a fresh `import_<n>` / `sig_import_<n>` pair,
/// deduplicated by wire module + symbol.
fn add_import(
    st: &mut EmitState,
    lookup_module: &str,
    wire_module: &str,
    symbol: &str,
    params: Vec<TypeRef>,
    ret: TypeRef,
) -> String {
    let key = format!("{}\u{0}{}", wire_module, symbol);
    if let Some(&index) = st.import_index_by_key.get(&key) {
        return st.imports[index].name.clone();
    }
    let item = ImportItem {
        name: format!("import_{}", st.imports.len()),
        module: wire_module.to_string(),
        symbol: symbol.to_string(),
        sig_name: format!("sig_import_{}", st.imports.len()),
        flags: 0,
        params: params.clone(),
        ret: ret.clone(),
    };
    let name = item.name.clone();
    st.import_index_by_key.insert(key, st.imports.len());
    st.imports.push(item);

    st.extern_ids_by_module
        .entry(lookup_module.to_string())
        .or_default()
        .insert(symbol.to_string(), name.clone());
    st.extern_params_by_module
        .entry(lookup_module.to_string())
        .or_default()
        .insert(symbol.to_string(), params);
    st.extern_returns_by_module
        .entry(lookup_module.to_string())
        .or_default()
        .insert(symbol.to_string(), ret);
    name
}

/// Registers imports for the table-backed members of one enabled
/// reserved module, keyed under its canonical name.
fn add_reserved_module_imports(st: &mut EmitState, canonical: &str) {
    let (wire, members): (&str, &[&str]) = match canonical {
        "File" => ("core.fs", &["open", "close", "read", "write"]),
        "Core.Fs" => ("core.fs", &["open", "close", "read", "write"]),
        "Core.DL" => ("core.dl", &["open", "sym", "close", "last_error"]),
        "Core.Os" => (
            "core.os",
            &[
                "args_count",
                "args_get",
                "env_get",
                "cwd_get",
                "time_mono_ns",
                "time_wall_ns",
                "sleep_ms",
            ],
        ),
        "Core.Log" => ("core.log", &["log"]),
        "IO" => (
            "core.io",
            &["buffer_new", "buffer_len", "buffer_fill", "buffer_copy"],
        ),
        _ => return,
    };
    for member in members {
        let Some(sig) = reserved_member_signature(canonical, member) else {
            continue;
        };
        let params = sig.params.iter().map(|p| abi_type_ref(*p)).collect();
        let ret = abi_type_ref(sig.ret);
        add_import(st, canonical, wire, member, params, ret);
    }
}

fn emit_program_impl(program: &Program) -> DiagResult<String> {
    let mut st = EmitState::default();

    let mut functions: Vec<FuncItem> = Vec::new();
    let mut artifact_order: Vec<&str> = Vec::new();
    let mut enum_order: Vec<&str> = Vec::new();
    let mut externs = Vec::new();
    let mut globals = Vec::new();

    let has_top_level_script = !program.top_level_stmts.is_empty();

    for decl in &program.decls {
        match decl {
            Decl::Import(import) => {
                let canonical = canonicalize_reserved_import(&import.path)
                    .filter(|_| is_acceptable_reserved_spelling(&import.path));
                let Some(canonical) = canonical else {
                    return Err(Diag::new(
                        import.pos,
                        format!("unsupported import path: {}", import.path),
                    ));
                };
                st.reserved_imports.insert(canonical.to_string());
                match &import.alias {
                    Some(alias) => {
                        st.reserved_import_aliases
                            .insert(alias.clone(), canonical.to_string());
                    }
                    None => {
                        let implicit = default_import_alias(&import.path);
                        if !implicit.is_empty() {
                            st.reserved_import_aliases
                                .insert(implicit, canonical.to_string());
                        }
                    }
                }
            }
            Decl::Extern(ext) => externs.push(ext),
            Decl::Function(func) => functions.push(FuncItem {
                decl: func.clone(),
                emit_name: func.name.clone(),
                display_name: func.name.clone(),
                self_type: None,
                script_body: None,
            }),
            Decl::Artifact(artifact) => {
                artifact_order.push(&artifact.name);
                st.artifacts.insert(artifact.name.clone(), artifact);
                for method in &artifact.methods {
                    let emit_name = format!("{}__{}", artifact.name, method.name);
                    let display = format!("{}.{}", artifact.name, method.name);
                    st.artifact_method_names
                        .insert(display.clone(), emit_name.clone());
                    functions.push(FuncItem {
                        decl: method.clone(),
                        emit_name,
                        display_name: display,
                        self_type: Some(TypeRef::named(&artifact.name)),
                        script_body: None,
                    });
                }
            }
            Decl::Enum(enm) => {
                enum_order.push(&enm.name);
                let mut values = rustc_hash::FxHashMap::default();
                for member in &enm.members {
                    let value = match &member.value {
                        Some(text) => parse_integer_literal(text).ok_or_else(|| {
                            Diag::new(
                                member.pos,
                                format!("invalid enum value for {}.{}", enm.name, member.name),
                            )
                        })?,
                        None => 0,
                    };
                    values.insert(member.name.clone(), value);
                }
                st.enum_values.insert(enm.name.clone(), values);
            }
            Decl::Module(module) => {
                if !module.variables.is_empty() {
                    return Err(Diag::new(
                        module.pos,
                        "module variables are not supported in SIR emission",
                    ));
                }
                for func in &module.functions {
                    let key = format!("{}.{}", module.name, func.name);
                    let emit_name = format!("{}__{}", module.name, func.name);
                    st.module_func_names.insert(key.clone(), emit_name.clone());
                    functions.push(FuncItem {
                        decl: func.clone(),
                        emit_name,
                        display_name: key,
                        self_type: None,
                        script_body: None,
                    });
                }
            }
            Decl::Variable(var) => globals.push(var),
        }
    }

    let mut global_init_needed = false;
    for global in &globals {
        if global.init.is_some() {
            global_init_needed = true;
            break;
        }
    }
    if !globals.is_empty() && global_init_needed {
        let init_fn = FuncDecl {
            name: "__global_init".to_string(),
            generics: Vec::new(),
            params: Vec::new(),
            return_type: TypeRef::void(),
            return_mutability: simplec_par::Mutability::Mutable,
            body: Vec::new(),
            pos: simplec_util::Pos::NONE,
        };
        st.global_init_func_name = Some(init_fn.name.clone());
        functions.push(FuncItem {
            decl: init_fn,
            emit_name: "__global_init".to_string(),
            display_name: "__global_init".to_string(),
            self_type: None,
            script_body: None,
        });
    }
    if has_top_level_script {
        let script_fn = FuncDecl {
            name: "__script_entry".to_string(),
            generics: Vec::new(),
            params: Vec::new(),
            return_type: TypeRef::named("i32"),
            return_mutability: simplec_par::Mutability::Mutable,
            body: Vec::new(),
            pos: simplec_util::Pos::NONE,
        };
        functions.push(FuncItem {
            decl: script_fn,
            emit_name: "__script_entry".to_string(),
            display_name: "__script_entry".to_string(),
            self_type: None,
            script_body: Some(program.top_level_stmts.clone()),
        });
    }
    if functions.is_empty() {
        return Err(Diag::message(
            "program has no functions or top-level statements",
        ));
    }

    for (index, global) in globals.iter().enumerate() {
        let ty = global.ty.resolve_fn_shorthand(global.init.as_ref());
        st.global_indices.insert(global.name.clone(), index as u32);
        st.global_types.insert(global.name.clone(), ty);
        if let Some(init) = &global.init {
            st.global_init_exprs.insert(global.name.clone(), init.clone());
        }
    }

    for (i, item) in functions.iter().enumerate() {
        st.func_ids.insert(item.emit_name.clone(), i as u32);
        st.func_returns
            .insert(item.emit_name.clone(), item.decl.return_type.clone());
        let mut params = Vec::with_capacity(item.decl.params.len() + 1);
        if let Some(self_type) = &item.self_type {
            params.push(self_type.clone());
        }
        params.extend(item.decl.params.iter().map(|p| p.ty.clone()));
        st.func_params.insert(item.emit_name.clone(), params);
    }
    st.base_func_count = functions.len() as u32;

    // Extern declarations become imports; module-scoped externs also
    // synthesize the `core.dl call$<n>` variants used by dynamic
    // symbol calls.
    let mut dynamic_dl_call_index = 0u32;
    for ext in &externs {
        let wire_module = ext
            .module
            .as_deref()
            .map(resolve_import_module)
            .unwrap_or("host")
            .to_string();
        let key = format!("{}\u{0}{}", wire_module, ext.name);
        if st.import_index_by_key.contains_key(&key) {
            let shown = match &ext.module {
                Some(module) => format!("{}.{}", module, ext.name),
                None => ext.name.clone(),
            };
            return Err(Diag::new(
                ext.pos,
                format!("duplicate extern import: {}", shown),
            ));
        }
        let params: Vec<TypeRef> = ext.params.iter().map(|p| p.ty.clone()).collect();
        let ret = ext.return_type.clone();
        match &ext.module {
            Some(module) => {
                add_import(&mut st, module, &wire_module, &ext.name, params.clone(), ret.clone());
            }
            None => {
                let id =
                    add_import(&mut st, "host", &wire_module, &ext.name, params.clone(), ret.clone());
                st.extern_ids.insert(ext.name.clone(), id);
                st.extern_params.insert(ext.name.clone(), params.clone());
                st.extern_returns.insert(ext.name.clone(), ret.clone());
            }
        }

        if let Some(module) = &ext.module {
            if resolve_import_module(module) != "core.dl" {
                let abi_ok = params
                    .iter()
                    .all(|p| p.is_scalar() || p.pointer_depth > 0)
                    && (ret.is_scalar() || ret.pointer_depth > 0 || ret.name == "void");
                if abi_ok {
                    let symbol = format!("call${}", dynamic_dl_call_index);
                    dynamic_dl_call_index += 1;
                    let mut dyn_params = Vec::with_capacity(params.len() + 1);
                    dyn_params.push(TypeRef::named("i64"));
                    dyn_params.extend(params.iter().cloned());
                    let item = ImportItem {
                        name: format!("import_{}", st.imports.len()),
                        module: "core.dl".to_string(),
                        symbol: symbol.clone(),
                        sig_name: format!("sig_import_{}", st.imports.len()),
                        flags: 0,
                        params: dyn_params,
                        ret: ret.clone(),
                    };
                    st.dl_call_import_ids_by_module
                        .entry(module.clone())
                        .or_default()
                        .insert(ext.name.clone(), item.name.clone());
                    st.import_index_by_key.insert(
                        format!("core.dl\u{0}{}", symbol),
                        st.imports.len(),
                    );
                    st.imports.push(item);
                }
            }
        }
    }

    for global in &globals {
        if let Some(init) = &global.init {
            // The manifest binding is re-derived here; the checker
            // recorded it during validation.
            if let simplec_par::Expr::Call(call) = init {
                if let simplec_par::Expr::Member(member) = &call.callee {
                    if call.args.len() == 2 {
                        if let simplec_par::Expr::Identifier(manifest) = &call.args[1] {
                            let is_dl_open = expr_is_core_dl_open(&st, member);
                            if is_dl_open
                                && st
                                    .extern_params_by_module
                                    .contains_key(&manifest.name)
                            {
                                st.global_dl_modules
                                    .insert(global.name.clone(), manifest.name.clone());
                            }
                        }
                    }
                }
            }
        }
    }

    let reserved: Vec<String> = st.reserved_imports.iter().cloned().collect();
    for canonical in reserved {
        add_reserved_module_imports(&mut st, &canonical);
    }

    for name in &artifact_order {
        let artifact = st.artifacts[*name];
        let layout = layout::layout_artifact(artifact, &st);
        st.artifact_layouts.insert((*name).to_string(), layout);
    }

    let entry_name = if has_top_level_script {
        "__script_entry".to_string()
    } else {
        functions
            .iter()
            .find(|f| f.decl.name == "main")
            .map(|f| f.emit_name.clone())
            .unwrap_or_else(|| functions[0].emit_name.clone())
    };

    let mut function_text = Vec::with_capacity(functions.len());
    for item in &functions {
        function_text.push(stmt::emit_function(
            &mut st,
            item,
            item.emit_name == entry_name,
        )?);
    }
    // Lambdas can synthesize further lambdas while being emitted.
    let mut lambda_index = 0;
    while lambda_index < st.lambda_funcs.len() {
        let decl = st.lambda_funcs[lambda_index].clone();
        let item = FuncItem {
            emit_name: decl.name.clone(),
            display_name: decl.name.clone(),
            decl,
            self_type: None,
            script_body: None,
        };
        function_text.push(stmt::emit_function(&mut st, &item, false)?);
        lambda_index += 1;
    }

    // ------------------------------------------------------------------
    // Assemble the module text.
    // ------------------------------------------------------------------
    let mut out = String::new();

    if !artifact_order.is_empty() || !enum_order.is_empty() {
        out.push_str("types:\n");
        for name in &artifact_order {
            let layout = &st.artifact_layouts[*name];
            out.push_str(&format!(
                "  type {} size={} kind=artifact\n",
                name, layout.size
            ));
            for field in &layout.fields {
                out.push_str(&format!(
                    "  field {} {} offset={}\n",
                    field.name, field.sir_type, field.offset
                ));
            }
        }
        for name in &enum_order {
            out.push_str(&format!("  type {} size=4 kind=i32\n", name));
        }
    }

    out.push_str("sigs:\n");
    let mut sig_items: Vec<(&FuncDecl, String, Option<TypeRef>)> = functions
        .iter()
        .map(|f| (&f.decl, f.emit_name.clone(), f.self_type.clone()))
        .collect();
    for lambda in &st.lambda_funcs {
        sig_items.push((lambda, lambda.name.clone(), None));
    }
    for (decl, name, self_type) in &sig_items {
        let ret = types::sig_type_name(&decl.return_type, &st)?;
        let mut params = Vec::new();
        if let Some(self_type) = self_type {
            params.push(types::sig_type_name(self_type, &st)?);
        }
        for param in &decl.params {
            params.push(types::sig_type_name(&param.ty, &st)?);
        }
        out.push_str(&format!(
            "  sig {}: ({}) -> {}\n",
            name,
            params.join(", "),
            ret
        ));
    }
    for import in &st.imports {
        let ret = types::sig_type_name(&import.ret, &st)?;
        let mut params = Vec::new();
        for param in &import.params {
            params.push(types::sig_type_name(param, &st)?);
        }
        out.push_str(&format!(
            "  sig {}: ({}) -> {}\n",
            import.sig_name,
            params.join(", "),
            ret
        ));
    }
    for line in &st.proc_sig_lines {
        out.push_str(line);
        out.push('\n');
    }

    for global in &globals {
        let ty = st.global_types[&global.name].clone();
        st.add_global_init_const(&global.name, &ty)
            .map_err(|_| {
                Diag::new(
                    global.pos,
                    format!(
                        "global '{}' type has no default const init support",
                        global.name
                    ),
                )
            })?;
    }

    if !st.const_lines.is_empty() {
        out.push_str("consts:\n");
        for line in &st.const_lines {
            out.push_str(line);
            out.push('\n');
        }
    }

    if !globals.is_empty() {
        out.push_str("globals:\n");
        for global in &globals {
            let type_name = types::sig_type_name(&st.global_types[&global.name], &st)?;
            out.push_str(&format!(
                "  global {} {} init=__ginit_{}\n",
                global.name, type_name, global.name
            ));
        }
    }

    if !st.imports.is_empty() {
        out.push_str("imports:\n");
        for import in &st.imports {
            out.push_str(&format!(
                "  import {} {} {} sig={}",
                import.name, import.module, import.symbol, import.sig_name
            ));
            if import.flags != 0 {
                out.push_str(&format!(" flags={}", import.flags));
            }
            out.push('\n');
        }
    }

    for text in &function_text {
        out.push_str(text);
    }

    out.push_str(&format!("entry {}\n", entry_name));
    Ok(out)
}

fn expr_is_core_dl_open(st: &EmitState, member: &simplec_par::MemberExpr) -> bool {
    let Some(module) = crate::expr::module_name_from_expr(&member.base) else {
        return false;
    };
    let Some(resolved) = st.resolve_reserved_module(&module) else {
        return false;
    };
    resolved == "Core.DL" && simplec_util::normalize_core_dl_member(&member.name) == "open"
}

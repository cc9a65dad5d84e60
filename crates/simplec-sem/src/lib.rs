//! simplec-sem - Semantic validation.
//!
//! Two passes over the merged program: first collect top-level names
//! (enums, artifacts, modules, functions, globals, externs grouped by
//! module, reserved-import capabilities), then check every function
//! body, method, module function, and top-level script statement.
//!
//! All semantic errors are fatal for the compilation unit; the first
//! one wins and is wrapped with its enclosing function's display name
//! as it propagates.

pub mod scope;
pub mod types;

mod expr;
mod stmt;

use rustc_hash::{FxHashMap, FxHashSet};
use simplec_par::{
    parse_program_str, ArtifactDecl, Decl, EnumDecl, ExternDecl, FuncDecl, ModuleDecl, Program,
    Stmt, TypeRef, VarDecl,
};
use simplec_util::{
    canonicalize_reserved_import, is_acceptable_reserved_spelling, Diag, DiagResult,
};

use scope::{LocalInfo, Scopes};
use types::{check_type_ref, TypeUse};

/// Validates a merged program.
///
/// # Examples
///
/// ```
/// use simplec_sem::validate_source;
///
/// assert!(validate_source("main : i32 () { return 0; }").is_ok());
/// assert!(validate_source("main : i32 () { return missing; }").is_err());
/// ```
pub fn validate_program(program: &Program) -> DiagResult<()> {
    let ctx = Context::build(program)?;

    if !program.top_level_stmts.is_empty() {
        let mut checker = FnChecker::new(&ctx, TypeRef::named("i32"), false, None);
        for stmt in &program.top_level_stmts {
            if let Stmt::Return(ret) = stmt {
                return Err(Diag::new(ret.pos, "top-level return is not allowed"));
            }
            checker
                .check_stmt(stmt, 0)
                .map_err(|d| d.in_context("in top-level script"))?;
        }
    }

    for decl in &program.decls {
        match decl {
            Decl::Import(_) | Decl::Enum(_) => {}
            Decl::Extern(ext) => check_extern_decl(ext, &ctx)?,
            Decl::Function(func) => {
                let type_params = collect_type_params(&func.generics, &[])?;
                check_function_body(func, &ctx, type_params, None)
                    .map_err(|d| d.in_context(&format!("in function '{}'", func.name)))?;
            }
            Decl::Artifact(artifact) => check_artifact_decl(artifact, &ctx)?,
            Decl::Module(module) => check_module_decl(module, &ctx)?,
            Decl::Variable(var) => {
                let ty = var.ty.resolve_fn_shorthand(var.init.as_ref());
                check_type_ref(&ty, &ctx, &FxHashSet::default(), TypeUse::Value)?;
                if let Some(init) = &var.init {
                    let mut checker = FnChecker::new(&ctx, TypeRef::named("i32"), false, None);
                    checker.check_expr(init)?;
                    checker.check_binding_init(&ty, init)?;
                }
            }
        }
    }

    Ok(())
}

/// Parses and validates in one step (tests, tooling).
pub fn validate_source(source: &str) -> DiagResult<()> {
    let program = parse_program_str(source)?;
    validate_program(&program)
}

fn check_extern_decl(ext: &ExternDecl, ctx: &Context) -> DiagResult<()> {
    let no_params = FxHashSet::default();
    check_type_ref(&ext.return_type, ctx, &no_params, TypeUse::Return)?;
    let mut seen = FxHashSet::default();
    for param in &ext.params {
        if !seen.insert(param.name.as_str()) {
            return Err(Diag::new(
                param.pos,
                format!("duplicate extern parameter name: {}", param.name),
            ));
        }
        check_type_ref(&param.ty, ctx, &no_params, TypeUse::Value)?;
    }
    Ok(())
}

fn check_artifact_decl(artifact: &ArtifactDecl, ctx: &Context) -> DiagResult<()> {
    let type_params = collect_type_params(&artifact.generics, &[])?;
    let mut names = FxHashSet::default();
    for field in &artifact.fields {
        if !names.insert(field.name.as_str()) {
            return Err(Diag::new(
                field.pos,
                format!("duplicate artifact member: {}", field.name),
            ));
        }
        check_type_ref(&field.ty, ctx, &type_params, TypeUse::Value)?;
    }
    for method in &artifact.methods {
        if !names.insert(method.name.as_str()) {
            return Err(Diag::new(
                method.pos,
                format!("duplicate artifact member: {}", method.name),
            ));
        }
    }
    for method in &artifact.methods {
        let merged = collect_type_params(&artifact.generics, &method.generics)?;
        check_function_body(method, ctx, merged, Some(artifact)).map_err(|d| {
            d.in_context(&format!("in function '{}.{}'", artifact.name, method.name))
        })?;
    }
    Ok(())
}

fn check_module_decl(module: &ModuleDecl, ctx: &Context) -> DiagResult<()> {
    let mut names = FxHashSet::default();
    for var in &module.variables {
        if !names.insert(var.name.as_str()) {
            return Err(Diag::new(
                var.pos,
                format!("duplicate module member: {}", var.name),
            ));
        }
        check_type_ref(&var.ty, ctx, &FxHashSet::default(), TypeUse::Value)?;
    }
    for func in &module.functions {
        if !names.insert(func.name.as_str()) {
            return Err(Diag::new(
                func.pos,
                format!("duplicate module member: {}", func.name),
            ));
        }
    }
    for func in &module.functions {
        let type_params = collect_type_params(&func.generics, &[])?;
        check_function_body(func, ctx, type_params, None).map_err(|d| {
            d.in_context(&format!("in function '{}.{}'", module.name, func.name))
        })?;
    }
    Ok(())
}

fn check_function_body<'p>(
    func: &'p FuncDecl,
    ctx: &Context<'p>,
    type_params: FxHashSet<String>,
    current_artifact: Option<&'p ArtifactDecl>,
) -> DiagResult<()> {
    check_type_ref(&func.return_type, ctx, &type_params, TypeUse::Return)?;

    let is_main = func.name == "main" && func.return_type.name == "i32";
    let return_is_void = func.return_type.is_void();

    let mut checker = FnChecker::new(ctx, func.return_type.clone(), return_is_void, current_artifact);
    checker.type_params = type_params;

    let mut param_names = FxHashSet::default();
    for param in &func.params {
        if !param_names.insert(param.name.as_str()) {
            return Err(Diag::new(
                param.pos,
                format!("duplicate parameter name: {}", param.name),
            ));
        }
        check_type_ref(&param.ty, ctx, &checker.type_params, TypeUse::Param)?;
        checker.scopes.add(
            &param.name,
            LocalInfo::new(param.ty.clone(), param.mutability),
            param.pos,
        )?;
    }

    for stmt in &func.body {
        checker.check_stmt(stmt, 0)?;
    }

    if !return_is_void && !is_main && !stmt::stmts_return(&func.body) {
        return Err(Diag::new(
            func.pos,
            "non-void function does not return on all paths",
        ));
    }
    Ok(())
}

fn collect_type_params(a: &[String], b: &[String]) -> DiagResult<FxHashSet<String>> {
    let mut out = FxHashSet::default();
    for name in a.iter().chain(b) {
        if !out.insert(name.clone()) {
            return Err(Diag::message(format!("duplicate generic parameter: {}", name)));
        }
    }
    Ok(out)
}

/// Name-keyed side tables over one merged program. Built once, shared
/// by reference with every body check (and later with the emitter's
/// validation run); the AST itself stays back-pointer free.
pub struct Context<'p> {
    pub enums: FxHashMap<String, &'p EnumDecl>,
    /// All enum member names, for the "unqualified enum value" error.
    pub enum_members: FxHashSet<String>,
    pub enum_members_by_type: FxHashMap<String, FxHashSet<String>>,
    pub artifacts: FxHashMap<String, &'p ArtifactDecl>,
    pub modules: FxHashMap<String, &'p ModuleDecl>,
    pub functions: FxHashMap<String, &'p FuncDecl>,
    pub globals: FxHashMap<String, &'p VarDecl>,
    pub externs: FxHashMap<String, &'p ExternDecl>,
    pub externs_by_module: FxHashMap<String, FxHashMap<String, &'p ExternDecl>>,
    /// Canonical names of enabled reserved modules.
    pub reserved_imports: FxHashSet<String>,
    /// Alias identifier -> canonical reserved module name.
    pub reserved_aliases: FxHashMap<String, String>,
    pub top_level: FxHashSet<String>,
}

impl<'p> Context<'p> {
    pub fn build(program: &'p Program) -> DiagResult<Self> {
        if program.decls.is_empty() && program.top_level_stmts.is_empty() {
            return Err(Diag::message(
                "program has no declarations or top-level statements",
            ));
        }

        let mut ctx = Context {
            enums: FxHashMap::default(),
            enum_members: FxHashSet::default(),
            enum_members_by_type: FxHashMap::default(),
            artifacts: FxHashMap::default(),
            modules: FxHashMap::default(),
            functions: FxHashMap::default(),
            globals: FxHashMap::default(),
            externs: FxHashMap::default(),
            externs_by_module: FxHashMap::default(),
            reserved_imports: FxHashSet::default(),
            reserved_aliases: FxHashMap::default(),
            top_level: FxHashSet::default(),
        };

        for decl in &program.decls {
            let name: Option<(&str, simplec_util::Pos)> = match decl {
                Decl::Import(import) => {
                    let canonical = canonicalize_reserved_import(&import.path)
                        .filter(|_| is_acceptable_reserved_spelling(&import.path));
                    let Some(canonical) = canonical else {
                        return Err(Diag::new(
                            import.pos,
                            format!("unsupported import path: {}", import.path),
                        ));
                    };
                    ctx.reserved_imports.insert(canonical.to_string());
                    match &import.alias {
                        Some(alias) => {
                            ctx.reserved_aliases
                                .insert(alias.clone(), canonical.to_string());
                        }
                        None => {
                            // An unaliased import also answers to the
                            // lowercase tail of its path (`core.dl`
                            // binds `dl`).
                            let implicit = simplec_util::default_import_alias(&import.path);
                            if !implicit.is_empty() {
                                ctx.reserved_aliases
                                    .insert(implicit, canonical.to_string());
                            }
                        }
                    }
                    None
                }
                Decl::Extern(ext) => {
                    if let Some(module) = &ext.module {
                        ctx.externs_by_module
                            .entry(module.clone())
                            .or_default()
                            .insert(ext.name.clone(), ext);
                        None
                    } else {
                        ctx.externs.insert(ext.name.clone(), ext);
                        Some((ext.name.as_str(), ext.pos))
                    }
                }
                Decl::Enum(enm) => {
                    let mut members = FxHashSet::default();
                    for member in &enm.members {
                        if member.value.is_none() {
                            return Err(Diag::new(
                                member.pos,
                                format!("enum member requires explicit value: {}", member.name),
                            ));
                        }
                        if !members.insert(member.name.clone()) {
                            return Err(Diag::new(
                                member.pos,
                                format!("duplicate enum member: {}", member.name),
                            ));
                        }
                        ctx.enum_members.insert(member.name.clone());
                    }
                    ctx.enum_members_by_type.insert(enm.name.clone(), members);
                    ctx.enums.insert(enm.name.clone(), enm);
                    Some((enm.name.as_str(), enm.pos))
                }
                Decl::Artifact(artifact) => {
                    ctx.artifacts.insert(artifact.name.clone(), artifact);
                    Some((artifact.name.as_str(), artifact.pos))
                }
                Decl::Module(module) => {
                    ctx.modules.insert(module.name.clone(), module);
                    Some((module.name.as_str(), module.pos))
                }
                Decl::Function(func) => {
                    ctx.functions.insert(func.name.clone(), func);
                    Some((func.name.as_str(), func.pos))
                }
                Decl::Variable(var) => {
                    ctx.globals.insert(var.name.clone(), var);
                    Some((var.name.as_str(), var.pos))
                }
            };
            if let Some((name, pos)) = name {
                if !ctx.top_level.insert(name.to_string()) {
                    return Err(Diag::new(
                        pos,
                        format!("duplicate top-level declaration: {}", name),
                    ));
                }
            }
        }

        Ok(ctx)
    }

    /// Resolves an identifier to an enabled canonical reserved module
    /// name, through canonicalization or an explicit import alias.
    pub fn resolve_reserved_module(&self, name: &str) -> Option<String> {
        if let Some(canonical) = canonicalize_reserved_import(name) {
            if self.reserved_imports.contains(canonical) {
                return Some(canonical.to_string());
            }
        }
        self.reserved_aliases.get(name).cloned()
    }

    pub fn is_reserved_module_enabled(&self, name: &str) -> bool {
        self.resolve_reserved_module(name).is_some()
    }

    pub fn find_artifact_field(
        artifact: Option<&'p ArtifactDecl>,
        name: &str,
    ) -> Option<&'p VarDecl> {
        artifact?.fields.iter().find(|f| f.name == name)
    }

    pub fn find_artifact_method(
        artifact: Option<&'p ArtifactDecl>,
        name: &str,
    ) -> Option<&'p FuncDecl> {
        artifact?.methods.iter().find(|m| m.name == name)
    }

    pub fn find_module_var(module: &'p ModuleDecl, name: &str) -> Option<&'p VarDecl> {
        module.variables.iter().find(|v| v.name == name)
    }

    pub fn find_module_func(module: &'p ModuleDecl, name: &str) -> Option<&'p FuncDecl> {
        module.functions.iter().find(|f| f.name == name)
    }
}

/// Per-function checking state: the scope stack, generic parameters in
/// force, the expected return type, and the enclosing artifact for
/// `self` resolution.
pub(crate) struct FnChecker<'a, 'p> {
    pub ctx: &'a Context<'p>,
    pub type_params: FxHashSet<String>,
    pub expected_return: TypeRef,
    pub return_is_void: bool,
    pub current_artifact: Option<&'p ArtifactDecl>,
    pub scopes: Scopes,
}

impl<'a, 'p> FnChecker<'a, 'p> {
    fn new(
        ctx: &'a Context<'p>,
        expected_return: TypeRef,
        return_is_void: bool,
        current_artifact: Option<&'p ArtifactDecl>,
    ) -> Self {
        Self {
            ctx,
            type_params: FxHashSet::default(),
            expected_return,
            return_is_void,
            current_artifact,
            scopes: Scopes::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_minimal_program() {
        assert!(validate_source("main : i32 () { return 40 + 2; }").is_ok());
    }

    #[test]
    fn test_rejects_empty_program() {
        let err = validate_source("").unwrap_err();
        assert!(err
            .message
            .contains("program has no declarations or top-level statements"));
    }

    #[test]
    fn test_duplicate_top_level_declaration() {
        let err = validate_source("A :: enum { Red = 1 }\nA :: artifact { x : i32 }").unwrap_err();
        assert!(err.message.contains("duplicate top-level declaration: A"));
    }

    #[test]
    fn test_top_level_return_rejected() {
        let err = validate_source("return 1;").unwrap_err();
        assert!(err.message.contains("top-level return is not allowed"));
    }

    #[test]
    fn test_unsupported_import_path() {
        let err = validate_source("import \"raylib\"\nmain : i32 () { return 0; }").unwrap_err();
        assert!(err.message.contains("unsupported import path: raylib"));
    }

    #[test]
    fn test_mixed_case_reserved_import_rejected() {
        let err =
            validate_source("import sYsTeM.iO as IO\nmain : void () { IO.println(1); }").unwrap_err();
        assert!(err.message.contains("unsupported import path"));
    }

    #[test]
    fn test_implicit_lowercase_alias() {
        assert!(validate_source("import system.io\nmain : void () { io.println(1); }").is_ok());
    }

    #[test]
    fn test_enum_member_requires_value() {
        assert!(validate_source("Color :: enum { Red }").is_err());
    }

    #[test]
    fn test_enum_duplicate_member() {
        assert!(validate_source("Color :: enum { Red = 1, Red = 2 }").is_err());
    }

    #[test]
    fn test_duplicate_extern_parameter() {
        let err =
            validate_source("extern C.f : void (a : i32, a : i32)\nmain : i32 () { return 0; }")
                .unwrap_err();
        assert!(err.message.contains("duplicate extern parameter name: a"));
    }

    #[test]
    fn test_duplicate_generic_parameter() {
        let err = validate_source("id<T, T> : i32 (v : i32) { return v; }").unwrap_err();
        assert!(err.message.contains("duplicate generic parameter: T"));
    }

    #[test]
    fn test_duplicate_artifact_member() {
        assert!(validate_source("Thing :: artifact { x : i32 x : i32 }").is_err());
    }

    #[test]
    fn test_duplicate_module_member() {
        assert!(validate_source("Math :: module { x : i32 = 1; x : i32 = 2; }").is_err());
    }

    #[test]
    fn test_module_var_without_init_ok() {
        assert!(validate_source("Math :: module { x : i32; }\nmain : i32 () { return 0; }").is_ok());
    }

    #[test]
    fn test_global_without_init_ok() {
        assert!(validate_source("g : i32;\nmain : i32 () { return g; }").is_ok());
    }

    #[test]
    fn test_error_includes_function_context_and_location() {
        let err = validate_source("main : i32 () { return missing }").unwrap_err();
        assert!(err.message.contains("undeclared identifier"), "{}", err.message);
        assert!(err.to_string().contains(':'), "{}", err);
        assert!(err.message.contains("in function 'main'"), "{}", err.message);
    }
}

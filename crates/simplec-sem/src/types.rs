//! Type classification, annotation checking, generic substitution and
//! unification.

use rustc_hash::{FxHashMap, FxHashSet};
use simplec_par::{type_equals, Expr, TypeDim, TypeRef};
use simplec_util::{Diag, DiagResult};

use crate::Context;

pub const PRIMITIVE_TYPES: &[&str] = &[
    "i8", "i16", "i32", "i64", "i128", "u8", "u16", "u32", "u64", "u128", "f32", "f64", "bool",
    "char", "string",
];

pub fn is_primitive_type_name(name: &str) -> bool {
    PRIMITIVE_TYPES.contains(&name)
}

pub fn is_integer_type_name(name: &str) -> bool {
    matches!(
        name,
        "i8" | "i16" | "i32" | "i64" | "i128" | "u8" | "u16" | "u32" | "u64" | "u128"
    )
}

pub fn is_float_type_name(name: &str) -> bool {
    matches!(name, "f32" | "f64")
}

pub fn is_numeric_type_name(name: &str) -> bool {
    is_integer_type_name(name) || is_float_type_name(name)
}

pub fn is_bool_type_name(name: &str) -> bool {
    name == "bool"
}

pub fn is_string_type_name(name: &str) -> bool {
    name == "string"
}

/// Names usable as `@cast` targets. `string` is excluded; `str(x)` is
/// the conversion to string.
pub fn is_primitive_cast_name(name: &str) -> bool {
    name != "string" && is_primitive_type_name(name)
}

/// `@i32` -> `i32`, for identifier-spelled cast callees.
pub fn at_cast_target(name: &str) -> Option<&str> {
    let target = name.strip_prefix('@')?;
    is_primitive_cast_name(target).then_some(target)
}

/// Compatibility with literal widening: an integer literal fits any
/// integer scalar target, a float literal fits `f32`/`f64`.
pub fn types_compatible_for_expr(expected: &TypeRef, actual: &TypeRef, expr: &Expr) -> bool {
    if type_equals(expected, actual) {
        return true;
    }
    // A `callback` parameter accepts any procedure value.
    if expected.is_proc && expected.proc_is_callback && actual.is_proc {
        return true;
    }
    if expr.is_integer_literal()
        && expected.pointer_depth == 0
        && actual.pointer_depth == 0
        && expected.dims.is_empty()
        && actual.dims.is_empty()
        && is_integer_type_name(&expected.name)
    {
        return true;
    }
    if expr.is_float_literal()
        && expected.is_scalar()
        && actual.is_scalar()
        && is_float_type_name(&expected.name)
    {
        return true;
    }
    false
}

/// Literal-side variant used by binary operand reconciliation.
pub fn literal_compatible_with_scalar(expr: &Expr, ty: &TypeRef) -> bool {
    if !ty.is_scalar() {
        return false;
    }
    (expr.is_integer_literal() && is_integer_type_name(&ty.name))
        || (expr.is_float_literal() && is_float_type_name(&ty.name))
}

/// How a type annotation is being used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeUse {
    Value,
    Return,
    Param,
}

/// Verifies a type annotation against the known type names, the
/// enclosing generic parameters, and the structural rules: `void` only
/// as a return type, no type arguments on primitives/generic
/// parameters/enums, artifact generic arity matches.
pub fn check_type_ref(
    ty: &TypeRef,
    ctx: &Context,
    type_params: &FxHashSet<String>,
    use_: TypeUse,
) -> DiagResult<()> {
    if ty.pointer_depth > 0 {
        let mut pointee = ty.clone();
        pointee.pointer_depth -= 1;
        if pointee.pointer_depth == 0 && pointee.name == "void" {
            if !pointee.type_args.is_empty() {
                return Err(Diag::new(ty.pos, "void cannot have type arguments"));
            }
            return Ok(());
        }
        return check_type_ref(&pointee, ctx, type_params, TypeUse::Value);
    }

    if ty.is_proc {
        if ty.proc_is_callback {
            if !ty.proc_params.is_empty() || ty.proc_return.is_some() {
                return Err(Diag::new(
                    ty.pos,
                    "callback type cannot declare parameter or return types",
                ));
            }
            if use_ != TypeUse::Param {
                return Err(Diag::new(
                    ty.pos,
                    "callback is only valid as a parameter type",
                ));
            }
            return Ok(());
        }
        for param in &ty.proc_params {
            check_type_ref(param, ctx, type_params, TypeUse::Value)?;
        }
        let Some(ret) = &ty.proc_return else {
            return Err(Diag::new(ty.pos, "procedure type missing return type"));
        };
        return check_type_ref(ret, ctx, type_params, TypeUse::Return);
    }

    if ty.name == "void" {
        if use_ != TypeUse::Return {
            return Err(Diag::new(ty.pos, "void is only valid as a return type"));
        }
        if !ty.type_args.is_empty() {
            return Err(Diag::new(ty.pos, "void cannot have type arguments"));
        }
        return Ok(());
    }

    let is_primitive = is_primitive_type_name(&ty.name);
    let is_type_param = type_params.contains(&ty.name);
    let is_user_type = ctx.top_level.contains(&ty.name);

    if ctx.is_reserved_module_enabled(&ty.name) {
        return Err(Diag::new(
            ty.pos,
            format!("module is not a type: {}", ty.name),
        ));
    }
    if !is_primitive && !is_type_param && !is_user_type {
        return Err(Diag::new(ty.pos, format!("unknown type: {}", ty.name)));
    }

    if is_user_type && !is_type_param {
        if ctx.modules.contains_key(&ty.name) {
            return Err(Diag::new(
                ty.pos,
                format!("module is not a type: {}", ty.name),
            ));
        }
        if ctx.functions.contains_key(&ty.name) {
            return Err(Diag::new(
                ty.pos,
                format!("function is not a type: {}", ty.name),
            ));
        }
        if ctx.enums.contains_key(&ty.name) && !ty.type_args.is_empty() {
            return Err(Diag::new(
                ty.pos,
                format!("enum type cannot have type arguments: {}", ty.name),
            ));
        }
        if let Some(artifact) = ctx.artifacts.get(ty.name.as_str()) {
            if ty.type_args.len() != artifact.generics.len() {
                return Err(Diag::new(
                    ty.pos,
                    format!("generic type argument count mismatch for {}", ty.name),
                ));
            }
        }
    }

    if !ty.type_args.is_empty() {
        if is_primitive {
            return Err(Diag::new(
                ty.pos,
                format!("primitive type cannot have type arguments: {}", ty.name),
            ));
        }
        if is_type_param {
            return Err(Diag::new(
                ty.pos,
                format!("type parameter cannot have type arguments: {}", ty.name),
            ));
        }
        for arg in &ty.type_args {
            check_type_ref(arg, ctx, type_params, TypeUse::Value)?;
        }
    }

    Ok(())
}

/// Rewrites generic parameter names to their bound types, preserving
/// the site's pointer depth and appending its dims.
pub fn substitute_type_params(ty: &TypeRef, mapping: &FxHashMap<String, TypeRef>) -> TypeRef {
    let mut out = ty.clone();
    apply_substitution(&mut out, mapping);
    out
}

fn apply_substitution(ty: &mut TypeRef, mapping: &FxHashMap<String, TypeRef>) {
    for arg in &mut ty.type_args {
        apply_substitution(arg, mapping);
    }
    for param in &mut ty.proc_params {
        apply_substitution(param, mapping);
    }
    if let Some(ret) = &mut ty.proc_return {
        apply_substitution(ret, mapping);
    }
    if let Some(replacement) = mapping.get(&ty.name) {
        let mut replaced = replacement.clone();
        replaced.pointer_depth += ty.pointer_depth;
        replaced.dims.extend(ty.dims.iter().copied());
        replaced.pos = ty.pos;
        *ty = replaced;
    }
}

/// Maps a generic artifact's parameters to the instantiation's type
/// arguments (`Box<i32>` with `Box<T>` yields `T -> i32`).
pub fn build_artifact_type_param_map(
    instance: &TypeRef,
    generics: &[String],
) -> DiagResult<FxHashMap<String, TypeRef>> {
    let mut mapping = FxHashMap::default();
    if generics.is_empty() {
        return Ok(mapping);
    }
    if instance.type_args.len() != generics.len() {
        return Err(Diag::new(
            instance.pos,
            format!("generic type argument count mismatch for {}", instance.name),
        ));
    }
    for (name, arg) in generics.iter().zip(&instance.type_args) {
        mapping.insert(name.clone(), arg.clone());
    }
    Ok(mapping)
}

/// Structural unification of one parameter type against one argument
/// type, extending `mapping` with bindings for the generic parameters.
pub fn unify_type_params(
    param: &TypeRef,
    arg: &TypeRef,
    type_params: &FxHashSet<String>,
    mapping: &mut FxHashMap<String, TypeRef>,
) -> bool {
    if type_params.contains(&param.name) {
        if !param.dims.is_empty() {
            if !dims_equal(&param.dims, &arg.dims) {
                return false;
            }
            let mut base = arg.clone();
            base.dims.clear();
            return match mapping.get(&param.name) {
                Some(bound) => type_equals(bound, &base),
                None => {
                    mapping.insert(param.name.clone(), base);
                    true
                }
            };
        }
        return match mapping.get(&param.name) {
            Some(bound) => type_equals(bound, arg),
            None => {
                mapping.insert(param.name.clone(), arg.clone());
                true
            }
        };
    }
    if param.pointer_depth != arg.pointer_depth
        || param.is_proc != arg.is_proc
        || !dims_equal(&param.dims, &arg.dims)
        || param.name != arg.name
        || param.type_args.len() != arg.type_args.len()
    {
        return false;
    }
    for (p, a) in param.type_args.iter().zip(&arg.type_args) {
        if !unify_type_params(p, a, type_params, mapping) {
            return false;
        }
    }
    if param.is_proc {
        if param.proc_params.len() != arg.proc_params.len() {
            return false;
        }
        for (p, a) in param.proc_params.iter().zip(&arg.proc_params) {
            if !unify_type_params(p, a, type_params, mapping) {
                return false;
            }
        }
        match (&param.proc_return, &arg.proc_return) {
            (Some(p), Some(a)) => {
                if !unify_type_params(p, a, type_params, mapping) {
                    return false;
                }
            }
            (None, None) => {}
            _ => return false,
        }
    }
    true
}

fn dims_equal(a: &[TypeDim], b: &[TypeDim]) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use simplec_par::parse_type_str;

    #[test]
    fn test_substitution_preserves_shape() {
        let param = parse_type_str("T[]").unwrap();
        let mut mapping = FxHashMap::default();
        mapping.insert("T".to_string(), TypeRef::named("i32"));
        let out = substitute_type_params(&param, &mapping);
        assert_eq!(out.name, "i32");
        assert_eq!(out.dims.len(), 1);
    }

    #[test]
    fn test_unify_binds_and_checks_consistency() {
        let mut type_params = FxHashSet::default();
        type_params.insert("T".to_string());
        let param = TypeRef::named("T");
        let mut mapping = FxHashMap::default();

        assert!(unify_type_params(
            &param,
            &TypeRef::named("i32"),
            &type_params,
            &mut mapping
        ));
        assert!(unify_type_params(
            &param,
            &TypeRef::named("i32"),
            &type_params,
            &mut mapping
        ));
        assert!(!unify_type_params(
            &param,
            &TypeRef::named("f64"),
            &type_params,
            &mut mapping
        ));
    }

    #[test]
    fn test_unify_through_dims() {
        let mut type_params = FxHashSet::default();
        type_params.insert("T".to_string());
        let param = parse_type_str("T[]").unwrap();
        let arg = parse_type_str("i32[]").unwrap();
        let mut mapping = FxHashMap::default();
        assert!(unify_type_params(&param, &arg, &type_params, &mut mapping));
        assert_eq!(mapping["T"].name, "i32");
    }

    #[test]
    fn test_literal_widening_compat() {
        let expected = TypeRef::named("i64");
        let actual = TypeRef::named("i32");
        let lit = Expr::Literal(simplec_par::LiteralExpr {
            kind: simplec_par::LiteralKind::Integer,
            text: "0xFFFFFFFF".into(),
            pos: simplec_util::Pos::new(1, 1),
        });
        assert!(types_compatible_for_expr(&expected, &actual, &lit));

        let not_lit = Expr::Identifier(simplec_par::IdentExpr {
            name: "x".into(),
            pos: simplec_util::Pos::new(1, 1),
        });
        assert!(!types_compatible_for_expr(&expected, &actual, &not_lit));
    }

    #[test]
    fn test_float_literal_widening() {
        let expected = TypeRef::named("f32");
        let actual = TypeRef::named("f64");
        let lit = Expr::Literal(simplec_par::LiteralExpr {
            kind: simplec_par::LiteralKind::Float,
            text: "1.5".into(),
            pos: simplec_util::Pos::new(1, 1),
        });
        assert!(types_compatible_for_expr(&expected, &actual, &lit));
    }

    #[test]
    fn test_at_cast_target_names() {
        assert_eq!(at_cast_target("@i32"), Some("i32"));
        assert_eq!(at_cast_target("@string"), None);
        assert_eq!(at_cast_target("i32"), None);
    }
}

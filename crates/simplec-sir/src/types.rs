//! SIR type names, operand lanes, and literal escaping.

use simplec_par::TypeRef;
use simplec_util::{Diag, DiagResult};

use crate::state::EmitState;

pub(crate) fn is_integral_type(name: &str) -> bool {
    matches!(
        name,
        "i8" | "i16" | "i32" | "i64" | "i128" | "u8" | "u16" | "u32" | "u64" | "u128"
    )
}

pub(crate) fn is_float_type(name: &str) -> bool {
    matches!(name, "f32" | "f64")
}

pub(crate) fn is_numeric_type(name: &str) -> bool {
    is_integral_type(name) || is_float_type(name)
}

/// The arithmetic lane a scalar type computes in.
pub(crate) fn normalize_numeric_op_type(name: &str) -> Option<&'static str> {
    match name {
        "i8" | "i16" | "i32" | "char" => Some("i32"),
        "u8" | "u16" | "u32" => Some("u32"),
        "i64" => Some("i64"),
        "u64" => Some("u64"),
        "f32" => Some("f32"),
        "f64" => Some("f64"),
        _ => None,
    }
}

/// Bitwise lanes collapse unsigned 32-bit to `i32` and both 64-bit
/// families to `i64`.
pub(crate) fn normalize_bitwise_op_type(name: &str) -> Option<&'static str> {
    match name {
        "i8" | "i16" | "i32" | "char" | "u8" | "u16" | "u32" => Some("i32"),
        "i64" | "u64" => Some("i64"),
        _ => None,
    }
}

pub(crate) fn inc_op_for_type(name: &str) -> Option<&'static str> {
    match name {
        "i8" => Some("inc.i8"),
        "i16" => Some("inc.i16"),
        "i32" | "char" | "bool" => Some("inc.i32"),
        "i64" => Some("inc.i64"),
        "u8" => Some("inc.u8"),
        "u16" => Some("inc.u16"),
        "u32" => Some("inc.u32"),
        "u64" => Some("inc.u64"),
        "f32" => Some("inc.f32"),
        "f64" => Some("inc.f64"),
        _ => None,
    }
}

pub(crate) fn dec_op_for_type(name: &str) -> Option<&'static str> {
    match name {
        "i8" => Some("dec.i8"),
        "i16" => Some("dec.i16"),
        "i32" | "char" | "bool" => Some("dec.i32"),
        "i64" => Some("dec.i64"),
        "u8" => Some("dec.u8"),
        "u16" => Some("dec.u16"),
        "u32" => Some("dec.u32"),
        "u64" => Some("dec.u64"),
        "f32" => Some("dec.f32"),
        "f64" => Some("dec.f64"),
        _ => None,
    }
}

/// The `.<suffix>` of array/list element ops for a given element type.
pub(crate) fn vm_op_suffix_for_type(ty: &TypeRef) -> Option<&'static str> {
    if ty.is_proc || !ty.dims.is_empty() || ty.name == "string" {
        return Some("ref");
    }
    match ty.name.as_str() {
        "bool" | "char" | "i8" | "i16" | "i32" | "u8" | "u16" | "u32" => Some("i32"),
        "i64" | "u64" => Some("i64"),
        "f32" => Some("f32"),
        "f64" => Some("f64"),
        _ => None,
    }
}

/// Element type operand of `newarray`/`newlist`.
pub(crate) fn vm_type_name_for_element(ty: &TypeRef) -> Option<&'static str> {
    match vm_op_suffix_for_type(ty)? {
        "i32" => Some("i32"),
        "i64" => Some("i64"),
        "f32" => Some("f32"),
        "f64" => Some("f64"),
        _ => Some("ref"),
    }
}

/// Whether the emitter can represent values of this type at all.
pub(crate) fn is_supported_type(ty: &TypeRef) -> bool {
    if !ty.type_args.is_empty() {
        return false;
    }
    if ty.pointer_depth > 0 || ty.is_proc {
        return true;
    }
    if !ty.dims.is_empty() {
        return ty.name != "void";
    }
    true
}

/// Signature-position SIR type name. Pointers lower to `i64`,
/// procedures and containers to `ref`, enums to `i32`, artifacts keep
/// their reference-type name.
pub(crate) fn sig_type_name(ty: &TypeRef, st: &EmitState) -> DiagResult<String> {
    if ty.pointer_depth > 0 {
        return Ok("i64".to_string());
    }
    if ty.is_proc || !ty.dims.is_empty() {
        return Ok("ref".to_string());
    }
    if ty.name == "void" || ty.name == "string" {
        return Ok(ty.name.clone());
    }
    if is_numeric_type(&ty.name) || ty.name == "bool" || ty.name == "char" {
        return Ok(ty.name.clone());
    }
    if st.artifacts.contains_key(&ty.name) {
        return Ok(ty.name.clone());
    }
    if st.enum_values.contains_key(&ty.name) {
        return Ok("i32".to_string());
    }
    Err(Diag::message(format!(
        "unsupported type in signature: {}",
        ty.name
    )))
}

/// The VM value lane a cast source or target occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CastVmKind {
    I32,
    I64,
    F32,
    F64,
}

pub(crate) fn cast_vm_kind(name: &str) -> Option<CastVmKind> {
    match name {
        "i8" | "i16" | "i32" | "u8" | "u16" | "u32" | "bool" | "char" => Some(CastVmKind::I32),
        "i64" | "u64" => Some(CastVmKind::I64),
        "f32" => Some(CastVmKind::F32),
        "f64" => Some(CastVmKind::F64),
        _ => None,
    }
}

pub(crate) fn conv_instruction(src: CastVmKind, dst: CastVmKind) -> Option<&'static str> {
    use CastVmKind::*;
    let conv = match (src, dst) {
        (I32, I64) => "conv.i32.i64",
        (I64, I32) => "conv.i64.i32",
        (I32, F32) => "conv.i32.f32",
        (I32, F64) => "conv.i32.f64",
        (F32, I32) => "conv.f32.i32",
        (F64, I32) => "conv.f64.i32",
        (F32, F64) => "conv.f32.f64",
        (F64, F32) => "conv.f64.f32",
        _ => return None,
    };
    Some(conv)
}

/// Escapes a decoded string value back into SIR source form; control
/// bytes become `\xHH`.
pub(crate) fn escape_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\x{:02X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use simplec_par::TypeRef;

    #[test]
    fn test_numeric_lanes() {
        assert_eq!(normalize_numeric_op_type("i8"), Some("i32"));
        assert_eq!(normalize_numeric_op_type("char"), Some("i32"));
        assert_eq!(normalize_numeric_op_type("u16"), Some("u32"));
        assert_eq!(normalize_numeric_op_type("u64"), Some("u64"));
        assert_eq!(normalize_numeric_op_type("bool"), None);
    }

    #[test]
    fn test_bitwise_lanes_collapse() {
        assert_eq!(normalize_bitwise_op_type("u32"), Some("i32"));
        assert_eq!(normalize_bitwise_op_type("u64"), Some("i64"));
        assert_eq!(normalize_bitwise_op_type("f32"), None);
    }

    #[test]
    fn test_vm_suffixes() {
        assert_eq!(vm_op_suffix_for_type(&TypeRef::named("bool")), Some("i32"));
        assert_eq!(vm_op_suffix_for_type(&TypeRef::named("u64")), Some("i64"));
        assert_eq!(vm_op_suffix_for_type(&TypeRef::named("string")), Some("ref"));
        assert_eq!(vm_op_suffix_for_type(&TypeRef::list_of("i32")), Some("ref"));
        assert_eq!(vm_op_suffix_for_type(&TypeRef::named("Mystery")), None);
    }

    #[test]
    fn test_escape_round_trip_shapes() {
        assert_eq!(escape_string_literal("a\nb"), "a\\nb");
        assert_eq!(escape_string_literal("q\"\\"), "q\\\"\\\\");
        assert_eq!(escape_string_literal("\u{1}"), "\\x01");
    }

    #[test]
    fn test_conv_matrix() {
        assert_eq!(
            conv_instruction(CastVmKind::I32, CastVmKind::F64),
            Some("conv.i32.f64")
        );
        assert_eq!(conv_instruction(CastVmKind::I32, CastVmKind::I32), None);
    }
}

//! Reserved-module tables and VM numeric contracts.
//!
//! The reserved standard-library modules (`IO`, `Math`, `Time`, `File`,
//! `Core.DL`, `Core.Os`, `Core.Fs`, `Core.Log`) are described here as
//! immutable data so the validator and the emitter dispatch over the
//! same `(module, member)` table instead of duplicating name chains.
//!
//! Also here: the intrinsic-ID and print-any-tag constants. These values
//! are a wire contract with the VM; changing them breaks every compiled
//! module.

/// ABI-level type descriptor for reserved-module signatures.
///
/// Reserved members only ever traffic in scalars, `i32[]` buffers, and a
/// single generic parameter (`Math.abs<T>`), so a closed descriptor set
/// is enough; the validator and emitter expand these into full types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbiType {
    I32,
    I64,
    F32,
    F64,
    Bool,
    String,
    Void,
    /// `i32[]` buffer handle.
    I32List,
    /// The single generic parameter `T` of `Math.abs`/`min`/`max`.
    TypeParam,
}

/// Signature of one reserved-module member.
#[derive(Clone, Copy, Debug)]
pub struct ReservedMember {
    pub module: &'static str,
    pub name: &'static str,
    pub params: &'static [AbiType],
    pub ret: AbiType,
    /// Whether the member is generic over a single `T`.
    pub generic: bool,
}

/// Table of reserved-module callable members.
///
/// `IO.print`/`IO.println` are deliberately absent: their arity and
/// typing rules (single scalar, or format literal plus scalars) do not
/// fit a fixed signature and are handled specially by both consumers.
const RESERVED_MEMBERS: &[ReservedMember] = &[
    member("Math", "abs", &[AbiType::TypeParam], AbiType::TypeParam, true),
    member("Math", "min", &[AbiType::TypeParam, AbiType::TypeParam], AbiType::TypeParam, true),
    member("Math", "max", &[AbiType::TypeParam, AbiType::TypeParam], AbiType::TypeParam, true),
    member("Time", "mono_ns", &[], AbiType::I64, false),
    member("Time", "wall_ns", &[], AbiType::I64, false),
    member("IO", "buffer_new", &[AbiType::I32], AbiType::I32List, false),
    member("IO", "buffer_len", &[AbiType::I32List], AbiType::I32, false),
    member(
        "IO",
        "buffer_fill",
        &[AbiType::I32List, AbiType::I32, AbiType::I32],
        AbiType::I32,
        false,
    ),
    member(
        "IO",
        "buffer_copy",
        &[AbiType::I32List, AbiType::I32List, AbiType::I32],
        AbiType::I32,
        false,
    ),
    member("File", "open", &[AbiType::String, AbiType::I32], AbiType::I32, false),
    member("File", "close", &[AbiType::I32], AbiType::Void, false),
    member(
        "File",
        "read",
        &[AbiType::I32, AbiType::I32List, AbiType::I32],
        AbiType::I32,
        false,
    ),
    member(
        "File",
        "write",
        &[AbiType::I32, AbiType::I32List, AbiType::I32],
        AbiType::I32,
        false,
    ),
    member("Core.Fs", "open", &[AbiType::String, AbiType::I32], AbiType::I32, false),
    member("Core.Fs", "close", &[AbiType::I32], AbiType::Void, false),
    member(
        "Core.Fs",
        "read",
        &[AbiType::I32, AbiType::I32List, AbiType::I32],
        AbiType::I32,
        false,
    ),
    member(
        "Core.Fs",
        "write",
        &[AbiType::I32, AbiType::I32List, AbiType::I32],
        AbiType::I32,
        false,
    ),
    member("Core.DL", "open", &[AbiType::String], AbiType::I64, false),
    member("Core.DL", "sym", &[AbiType::I64, AbiType::String], AbiType::I64, false),
    member("Core.DL", "close", &[AbiType::I64], AbiType::I32, false),
    member("Core.DL", "last_error", &[], AbiType::String, false),
    member(
        "Core.DL",
        "call_i32",
        &[AbiType::I64, AbiType::I32, AbiType::I32],
        AbiType::I32,
        false,
    ),
    member(
        "Core.DL",
        "call_i64",
        &[AbiType::I64, AbiType::I64, AbiType::I64],
        AbiType::I64,
        false,
    ),
    member(
        "Core.DL",
        "call_f32",
        &[AbiType::I64, AbiType::F32, AbiType::F32],
        AbiType::F32,
        false,
    ),
    member(
        "Core.DL",
        "call_f64",
        &[AbiType::I64, AbiType::F64, AbiType::F64],
        AbiType::F64,
        false,
    ),
    member("Core.DL", "call_str0", &[AbiType::I64], AbiType::String, false),
    member("Core.Os", "args_count", &[], AbiType::I32, false),
    member("Core.Os", "args_get", &[AbiType::I32], AbiType::String, false),
    member("Core.Os", "env_get", &[AbiType::String], AbiType::String, false),
    member("Core.Os", "cwd_get", &[], AbiType::String, false),
    member("Core.Os", "time_mono_ns", &[], AbiType::I64, false),
    member("Core.Os", "time_wall_ns", &[], AbiType::I64, false),
    member("Core.Os", "sleep_ms", &[AbiType::I32], AbiType::Void, false),
    member("Core.Log", "log", &[AbiType::String, AbiType::I32], AbiType::Void, false),
];

/// Non-callable reserved members (module constants).
const RESERVED_VARS: &[(&str, &str, AbiType)] = &[
    ("Math", "PI", AbiType::F64),
    ("Core.DL", "supported", AbiType::Bool),
    ("Core.Os", "is_linux", AbiType::Bool),
    ("Core.Os", "is_macos", AbiType::Bool),
    ("Core.Os", "is_windows", AbiType::Bool),
    ("Core.Os", "has_dl", AbiType::Bool),
];

const fn member(
    module: &'static str,
    name: &'static str,
    params: &'static [AbiType],
    ret: AbiType,
    generic: bool,
) -> ReservedMember {
    ReservedMember {
        module,
        name,
        params,
        ret,
        generic,
    }
}

/// Canonicalizes a reserved import path, case-insensitively on ASCII.
///
/// Returns the canonical module name for any accepted alias
/// (`system.io`, `io`, `IO`, ...) or `None` for non-reserved paths.
/// Spelling acceptance (all-lower vs canonical) is a separate check,
/// [`is_acceptable_reserved_spelling`].
///
/// # Examples
///
/// ```
/// use simplec_util::canonicalize_reserved_import;
///
/// assert_eq!(canonicalize_reserved_import("system.io"), Some("IO"));
/// assert_eq!(canonicalize_reserved_import("Math"), Some("Math"));
/// assert_eq!(canonicalize_reserved_import("core.dl"), Some("Core.DL"));
/// assert_eq!(canonicalize_reserved_import("raylib"), None);
/// ```
pub fn canonicalize_reserved_import(path: &str) -> Option<&'static str> {
    match path.to_ascii_lowercase().as_str() {
        "math" | "system.math" | "core.math" => Some("Math"),
        "io" | "system.io" | "system.stream" | "core.io" => Some("IO"),
        "time" | "system.time" | "core.time" => Some("Time"),
        "file" | "system.file" => Some("File"),
        "core.dl" | "system.dl" => Some("Core.DL"),
        "core.os" | "system.os" => Some("Core.Os"),
        "core.fs" | "system.fs" => Some("Core.Fs"),
        "core.log" | "system.log" => Some("Core.Log"),
        _ => None,
    }
}

/// Whether a reserved import spelling is accepted.
///
/// A spelling must be either entirely lowercase or exactly the canonical
/// name; mixed-case variants like `sYsTeM.iO` are rejected even though
/// they canonicalize.
pub fn is_acceptable_reserved_spelling(path: &str) -> bool {
    match canonicalize_reserved_import(path) {
        Some(canonical) => path == canonical || path.chars().all(|c| !c.is_ascii_uppercase()),
        None => false,
    }
}

/// Whether the path names a reserved module (under any accepted alias).
pub fn is_reserved_import_path(path: &str) -> bool {
    canonicalize_reserved_import(path).is_some()
}

/// The implicit alias an unaliased reserved import introduces: the
/// lowercase tail of the path (`system.io` -> `io`, `Math` -> `math`).
pub fn default_import_alias(path: &str) -> String {
    let tail = path.rsplit('.').next().unwrap_or(path);
    tail.to_ascii_lowercase()
}

/// Accepts the legacy CamelCase spellings of `Core.DL` members.
pub fn normalize_core_dl_member(name: &str) -> &str {
    match name {
        "Open" => "open",
        "Sym" => "sym",
        "Close" => "close",
        "LastError" => "last_error",
        "CallI32" => "call_i32",
        "CallI64" => "call_i64",
        "CallF32" => "call_f32",
        "CallF64" => "call_f64",
        "CallStr0" => "call_str0",
        other => other,
    }
}

/// Looks up a callable reserved member by canonical module and name.
pub fn reserved_member_signature(module: &str, name: &str) -> Option<&'static ReservedMember> {
    RESERVED_MEMBERS
        .iter()
        .find(|m| m.module == module && m.name == name)
}

/// Looks up a reserved module constant by canonical module and name.
pub fn reserved_member_var(module: &str, name: &str) -> Option<AbiType> {
    RESERVED_VARS
        .iter()
        .find(|(m, n, _)| *m == module && *n == name)
        .map(|(_, _, ty)| *ty)
}

/// All member names of a reserved module, for typo suggestions.
pub fn reserved_members(module: &str) -> Vec<&'static str> {
    let mut names: Vec<&'static str> = RESERVED_MEMBERS
        .iter()
        .filter(|m| m.module == module)
        .map(|m| m.name)
        .collect();
    names.extend(
        RESERVED_VARS
            .iter()
            .filter(|(m, _, _)| *m == module)
            .map(|(_, n, _)| *n),
    );
    if module == "IO" {
        names.push("print");
        names.push("println");
    }
    names
}

/// VM intrinsic IDs referenced by emitted SIR.
pub mod intrinsic {
    pub const PRINT_ANY: u32 = 1;
    pub const ABS_I32: u32 = 2;
    pub const ABS_I64: u32 = 3;
    pub const MIN_I32: u32 = 4;
    pub const MAX_I32: u32 = 5;
    pub const MIN_I64: u32 = 6;
    pub const MAX_I64: u32 = 7;
    pub const MIN_F32: u32 = 8;
    pub const MAX_F32: u32 = 9;
    pub const MIN_F64: u32 = 10;
    pub const MAX_F64: u32 = 11;
    pub const MONO_NS: u32 = 12;
    pub const WALL_NS: u32 = 13;
    pub const DL_CALL_I32: u32 = 14;
    pub const DL_CALL_I64: u32 = 15;
    pub const DL_CALL_F32: u32 = 16;
    pub const DL_CALL_F64: u32 = 17;
    pub const DL_CALL_STR0: u32 = 18;
}

/// Tag pushed before `intrinsic PRINT_ANY` to describe the value kind.
pub fn print_tag(type_name: &str) -> Option<u32> {
    let tag = match type_name {
        "i8" => 1,
        "i16" => 2,
        "i32" => 3,
        "i64" => 4,
        "u8" => 5,
        "u16" => 6,
        "u32" => 7,
        "u64" => 8,
        "f32" => 9,
        "f64" => 10,
        "bool" => 11,
        "char" => 12,
        "string" => 13,
        _ => return None,
    };
    Some(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_is_case_insensitive() {
        assert_eq!(canonicalize_reserved_import("SYSTEM.IO"), Some("IO"));
        assert_eq!(canonicalize_reserved_import("io"), Some("IO"));
        assert_eq!(canonicalize_reserved_import("Core.DL"), Some("Core.DL"));
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        for module in ["Math", "IO", "Time", "File", "Core.DL", "Core.Os", "Core.Fs", "Core.Log"] {
            assert_eq!(canonicalize_reserved_import(module), Some(module));
        }
    }

    #[test]
    fn test_spelling_rejects_mixed_case() {
        assert!(is_acceptable_reserved_spelling("system.io"));
        assert!(is_acceptable_reserved_spelling("IO"));
        assert!(is_acceptable_reserved_spelling("Core.DL"));
        assert!(!is_acceptable_reserved_spelling("sYsTeM.iO"));
        assert!(!is_acceptable_reserved_spelling("raylib"));
    }

    #[test]
    fn test_default_import_alias_takes_lower_tail() {
        assert_eq!(default_import_alias("system.io"), "io");
        assert_eq!(default_import_alias("Math"), "math");
        assert_eq!(default_import_alias("Core.DL"), "dl");
    }

    #[test]
    fn test_member_lookup() {
        let abs = reserved_member_signature("Math", "abs").unwrap();
        assert!(abs.generic);
        assert_eq!(abs.params.len(), 1);

        let log = reserved_member_signature("Core.Log", "log").unwrap();
        assert_eq!(log.params, &[AbiType::String, AbiType::I32]);
        assert_eq!(log.ret, AbiType::Void);

        assert!(reserved_member_signature("Math", "nope").is_none());
    }

    #[test]
    fn test_reserved_vars() {
        assert_eq!(reserved_member_var("Math", "PI"), Some(AbiType::F64));
        assert_eq!(reserved_member_var("Core.Os", "has_dl"), Some(AbiType::Bool));
        assert_eq!(reserved_member_var("Core.Os", "PI"), None);
    }

    #[test]
    fn test_io_members_include_print_family() {
        let members = reserved_members("IO");
        assert!(members.contains(&"println"));
        assert!(members.contains(&"buffer_fill"));
    }

    #[test]
    fn test_core_dl_member_normalization() {
        assert_eq!(normalize_core_dl_member("Open"), "open");
        assert_eq!(normalize_core_dl_member("CallStr0"), "call_str0");
        assert_eq!(normalize_core_dl_member("sym"), "sym");
    }

    #[test]
    fn test_print_tags_cover_scalars() {
        assert_eq!(print_tag("i32"), Some(3));
        assert_eq!(print_tag("string"), Some(13));
        assert_eq!(print_tag("void"), None);
    }
}

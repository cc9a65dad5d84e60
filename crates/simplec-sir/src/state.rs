//! Emitter state: program-wide tables plus the per-function frame.

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;
use simplec_par::{ArtifactDecl, FuncDecl, Stmt, TypeRef};
use simplec_util::{Diag, DiagResult};

use crate::layout::ArtifactLayout;
use crate::types::escape_string_literal;

/// One entry of the module's import table.
#[derive(Clone, Debug)]
pub(crate) struct ImportItem {
    pub name: String,
    pub module: String,
    pub symbol: String,
    pub sig_name: String,
    pub flags: u32,
    pub params: Vec<TypeRef>,
    pub ret: TypeRef,
}

/// One function to emit: a source function, a hoisted method or module
/// function, or a synthetic (`__global_init`, `__script_entry`).
#[derive(Clone, Debug)]
pub(crate) struct FuncItem {
    pub decl: FuncDecl,
    pub emit_name: String,
    pub display_name: String,
    pub self_type: Option<TypeRef>,
    pub script_body: Option<Vec<Stmt>>,
}

#[derive(Default)]
pub(crate) struct EmitState<'p> {
    // ------------------------------------------------------------------
    // Program-wide tables
    // ------------------------------------------------------------------
    pub artifacts: FxHashMap<String, &'p ArtifactDecl>,
    pub artifact_layouts: IndexMap<String, ArtifactLayout>,
    pub enum_values: FxHashMap<String, FxHashMap<String, i64>>,
    pub func_ids: FxHashMap<String, u32>,
    pub func_returns: FxHashMap<String, TypeRef>,
    pub func_params: FxHashMap<String, Vec<TypeRef>>,
    /// `Module.func` -> `Module__func`
    pub module_func_names: FxHashMap<String, String>,
    /// `Artifact.method` -> `Artifact__method`
    pub artifact_method_names: FxHashMap<String, String>,
    /// Canonical names of enabled reserved modules, in import order.
    pub reserved_imports: IndexSet<String>,
    pub reserved_import_aliases: FxHashMap<String, String>,

    pub imports: Vec<ImportItem>,
    pub import_index_by_key: FxHashMap<String, usize>,
    pub extern_ids: FxHashMap<String, String>,
    pub extern_params: FxHashMap<String, Vec<TypeRef>>,
    pub extern_returns: FxHashMap<String, TypeRef>,
    pub extern_ids_by_module: FxHashMap<String, FxHashMap<String, String>>,
    pub extern_params_by_module: FxHashMap<String, FxHashMap<String, Vec<TypeRef>>>,
    pub extern_returns_by_module: FxHashMap<String, FxHashMap<String, TypeRef>>,
    pub dl_call_import_ids_by_module: FxHashMap<String, FxHashMap<String, String>>,

    pub global_indices: FxHashMap<String, u32>,
    pub global_types: FxHashMap<String, TypeRef>,
    pub global_init_exprs: FxHashMap<String, simplec_par::Expr>,
    pub global_dl_modules: FxHashMap<String, String>,
    pub global_init_func_name: Option<String>,

    /// Interned string constants, value -> const name, in first-use
    /// order.
    pub string_consts: IndexMap<String, String>,
    pub const_lines: Vec<String>,
    pub string_index: u32,

    pub proc_sig_names: IndexMap<String, String>,
    pub proc_sig_lines: Vec<String>,

    pub lambda_funcs: Vec<FuncDecl>,
    pub lambda_counter: u32,
    pub base_func_count: u32,

    // ------------------------------------------------------------------
    // Per-function frame
    // ------------------------------------------------------------------
    pub out: String,
    pub current_func: String,
    pub local_indices: FxHashMap<String, u16>,
    pub local_types: FxHashMap<String, TypeRef>,
    pub local_dl_modules: FxHashMap<String, String>,
    pub next_local: u16,
    pub stack_cur: u32,
    pub stack_max: u32,
    pub saw_return: bool,
    pub label_counter: u32,
    /// (break label, continue label) per enclosing loop.
    pub loop_stack: Vec<(String, String)>,
}

impl<'p> EmitState<'p> {
    /// Writes one indented instruction line.
    pub fn emit(&mut self, line: impl AsRef<str>) {
        self.out.push_str("  ");
        self.out.push_str(line.as_ref());
        self.out.push('\n');
    }

    /// Writes a label line.
    pub fn emit_label(&mut self, label: &str) {
        self.out.push_str(label);
        self.out.push_str(":\n");
    }

    pub fn push_stack(&mut self, count: u32) {
        self.stack_cur += count;
        if self.stack_cur > self.stack_max {
            self.stack_max = self.stack_cur;
        }
    }

    pub fn pop_stack(&mut self, count: u32) {
        self.stack_cur = self.stack_cur.saturating_sub(count);
    }

    pub fn emit_dup(&mut self) {
        self.emit("dup");
        self.push_stack(1);
    }

    pub fn emit_dup2(&mut self) {
        self.emit("dup2");
        self.push_stack(2);
    }

    pub fn new_label(&mut self, prefix: &str) -> String {
        let label = format!("{}{}", prefix, self.label_counter);
        self.label_counter += 1;
        label
    }

    /// Interns a string constant, returning its `str<n>` name.
    pub fn add_string_const(&mut self, value: &str) -> DiagResult<String> {
        if let Some(name) = self.string_consts.get(value) {
            return Ok(name.clone());
        }
        let escaped = escape_string_literal(value);
        let name = format!("str{}", self.string_index);
        self.string_index += 1;
        self.string_consts.insert(value.to_string(), name.clone());
        self.const_lines
            .push(format!("  const {} string \"{}\"", name, escaped));
        Ok(name)
    }

    /// Per-global default constant (`__ginit_<name>`). The IR const
    /// table only carries string/f32/f64 payloads; everything else
    /// defaults through `f64 0.0` and gets its real value in
    /// `__global_init`.
    pub fn add_global_init_const(&mut self, global_name: &str, ty: &TypeRef) -> DiagResult<String> {
        let name = format!("__ginit_{}", global_name);
        let line = match ty.name.as_str() {
            "f32" if ty.is_scalar() => format!("  const {} f32 0.0", name),
            "string" if ty.is_scalar() => format!("  const {} string \"\"", name),
            "void" => {
                return Err(Diag::message(format!(
                    "global '{}' type has no default const init support",
                    global_name
                )));
            }
            _ => format!("  const {} f64 0.0", name),
        };
        self.const_lines.push(line);
        Ok(name)
    }

    /// Resolves an identifier to an enabled canonical reserved module.
    pub fn resolve_reserved_module(&self, name: &str) -> Option<String> {
        if let Some(canonical) = simplec_util::canonicalize_reserved_import(name) {
            if self.reserved_imports.contains(canonical) {
                return Some(canonical.to_string());
            }
        }
        self.reserved_import_aliases.get(name).cloned()
    }

    /// Takes the finished function body text, resetting the buffer.
    pub fn take_body(&mut self) -> String {
        std::mem::take(&mut self.out)
    }
}

//! Artifact field layout.
//!
//! Fields are laid out in declaration order. Scalars of 4 bytes or
//! fewer and all heap references occupy 4 bytes; `i64`/`u64`/`f64`
//! occupy 8. Alignment equals size, capped at 8 with a minimum of 1,
//! and the total size is rounded up to the largest field alignment.
//! Downstream consumers depend on the resulting offsets.

use indexmap::IndexMap;
use simplec_par::{ArtifactDecl, TypeRef};

use crate::state::EmitState;

#[derive(Clone, Debug)]
pub(crate) struct FieldLayout {
    pub name: String,
    pub ty: TypeRef,
    pub sir_type: String,
    pub offset: u32,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct ArtifactLayout {
    pub fields: Vec<FieldLayout>,
    pub field_index: IndexMap<String, usize>,
    pub size: u32,
}

pub(crate) fn field_size_for_type(ty: &TypeRef) -> u32 {
    if ty.is_proc || !ty.dims.is_empty() || ty.name == "string" {
        return 4;
    }
    match ty.name.as_str() {
        "i64" | "u64" | "f64" => 8,
        _ => 4,
    }
}

pub(crate) fn field_align_for_type(ty: &TypeRef) -> u32 {
    field_size_for_type(ty).clamp(1, 8)
}

pub(crate) fn align_to(value: u32, align: u32) -> u32 {
    if align <= 1 {
        return value;
    }
    let mask = align - 1;
    (value + mask) & !mask
}

pub(crate) fn field_sir_type_name(ty: &TypeRef, st: &EmitState) -> String {
    if ty.pointer_depth > 0 {
        return "i64".to_string();
    }
    if ty.is_proc || !ty.dims.is_empty() {
        return "ref".to_string();
    }
    if ty.name == "string" {
        return "string".to_string();
    }
    if crate::types::is_numeric_type(&ty.name) || ty.name == "bool" || ty.name == "char" {
        return ty.name.clone();
    }
    if st.enum_values.contains_key(&ty.name) {
        return "i32".to_string();
    }
    "ref".to_string()
}

pub(crate) fn layout_artifact(artifact: &ArtifactDecl, st: &EmitState) -> ArtifactLayout {
    let mut layout = ArtifactLayout::default();
    let mut offset = 0u32;
    let mut max_align = 1u32;
    for field in &artifact.fields {
        let align = field_align_for_type(&field.ty);
        let size = field_size_for_type(&field.ty);
        offset = align_to(offset, align);
        layout.field_index.insert(field.name.clone(), layout.fields.len());
        layout.fields.push(FieldLayout {
            name: field.name.clone(),
            ty: field.ty.clone(),
            sir_type: field_sir_type_name(&field.ty, st),
            offset,
        });
        offset += size;
        max_align = max_align.max(align);
    }
    layout.size = align_to(offset, max_align);
    layout
}

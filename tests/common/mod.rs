use std::fmt::Write as _;

use shared_layout::layout::{ComputedInstanceFieldLayout, ComputedStaticFieldLayout, StaticRegion};
use shared_layout::target::{Target, TargetArch, TargetOs};
use shared_layout::type_system::{DefType, FieldRef};
use shared_layout::{TypeId, TypeSystemContext};

// Integration crates pull different subsets of these helpers; keep each one local to avoid
// per-crate dead-code warnings.
#[allow(dead_code)]
pub fn x64_context() -> TypeSystemContext {
    TypeSystemContext::new(Target::from_components(TargetArch::X86_64, TargetOs::Linux))
}

#[allow(dead_code)]
pub fn arm64_context() -> TypeSystemContext {
    TypeSystemContext::new(Target::from_components(TargetArch::Aarch64, TargetOs::Linux))
}

#[allow(dead_code)]
pub fn define(ctx: &mut TypeSystemContext, name: &str, def: DefType) -> TypeId {
    ctx.add_def_type(name, def)
        .unwrap_or_else(|err| panic!("define `{name}`: {err}"))
}

#[allow(dead_code)]
pub fn placeholder(ctx: &mut TypeSystemContext, name: &str, canonical: TypeId) -> TypeId {
    ctx.add_runtime_determined(name, canonical)
        .unwrap_or_else(|err| panic!("define placeholder `{name}`: {err}"))
}

#[allow(dead_code)]
pub fn field_name(ctx: &TypeSystemContext, field: FieldRef) -> String {
    ctx.def_type(field.owner)
        .and_then(|def| def.fields.get(field.index as usize))
        .map_or_else(|| format!("<field {}>", field.index), |desc| desc.name.clone())
}

/// One line of scalars followed by one line per field offset.
#[allow(dead_code)]
pub fn render_instance(ctx: &TypeSystemContext, layout: &ComputedInstanceFieldLayout) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "size={} align={} field_size={} field_align={} abi_stable={}",
        layout.byte_count_unaligned,
        layout.byte_count_alignment,
        layout.field_size,
        layout.field_alignment,
        layout.layout_abi_stable
    );
    for entry in &layout.offsets {
        let _ = writeln!(out, "  {} @ {}", field_name(ctx, entry.field), entry.offset);
    }
    out
}

#[allow(dead_code)]
pub fn render_statics(ctx: &TypeSystemContext, layout: &ComputedStaticFieldLayout) -> String {
    let mut out = String::new();
    for (label, region) in [
        ("non_gc", StaticRegion::NonGc),
        ("gc", StaticRegion::Gc),
        ("thread_non_gc", StaticRegion::ThreadNonGc),
        ("thread_gc", StaticRegion::ThreadGc),
    ] {
        let block = layout.block(region);
        let _ = writeln!(
            out,
            "{label}: size={} align={}",
            block.size, block.largest_alignment
        );
        for placement in layout.offsets.iter().filter(|p| p.region == region) {
            let _ = writeln!(
                out,
                "  {} @ {}",
                field_name(ctx, placement.field),
                placement.offset
            );
        }
    }
    out
}

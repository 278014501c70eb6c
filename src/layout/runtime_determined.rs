//! Layout for placeholder types of shared generic code.
//!
//! Every answer comes from the canonical type. Field offsets and static layout differ per
//! instantiation, so both are refused rather than reported for the canonical instantiation.

use super::algorithm::FieldLayoutAlgorithm;
use super::records::{
    ComputedInstanceFieldLayout, ComputedStaticFieldLayout, InstanceLayoutKind, StaticLayoutKind,
};
use super::shape::ValueTypeShapeCharacteristics;
use crate::error::{Error, LayoutOperation, Result};
use crate::type_system::{TypeId, TypeSystemContext};

/// Layout algorithm for runtime-determined types. Only usable for instance size queries and
/// shape facts.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeDeterminedFieldLayoutAlgorithm;

impl RuntimeDeterminedFieldLayoutAlgorithm {
    /// # Panics
    ///
    /// Panics when `ty` is not a runtime-determined type.
    fn canonical_type(ctx: &TypeSystemContext, ty: TypeId) -> TypeId {
        match ctx.desc(ty).as_runtime_determined() {
            Some(rd) => rd.canonical(),
            None => panic!(
                "`{}` routed to the runtime-determined layout algorithm",
                ctx.name(ty)
            ),
        }
    }

    fn refuse(ctx: &TypeSystemContext, ty: TypeId, operation: LayoutOperation) -> Error {
        let type_name = ctx.name(ty);
        tracing::warn!(
            target: "layout",
            stage = "runtime_determined.refuse",
            type_name,
            operation = %operation
        );
        Error::unsupported(operation, type_name)
    }
}

impl FieldLayoutAlgorithm for RuntimeDeterminedFieldLayoutAlgorithm {
    fn compute_instance_layout(
        &self,
        ctx: &TypeSystemContext,
        ty: TypeId,
        kind: InstanceLayoutKind,
    ) -> Result<ComputedInstanceFieldLayout> {
        let canonical = Self::canonical_type(ctx, ty);
        if kind != InstanceLayoutKind::TypeOnly {
            return Err(Self::refuse(ctx, ty, LayoutOperation::InstanceFieldOffsets));
        }

        let canonical_layout = ctx.instance_layout(canonical, InstanceLayoutKind::TypeOnly)?;
        let layout = ComputedInstanceFieldLayout {
            byte_count_unaligned: canonical_layout.byte_count_unaligned,
            byte_count_alignment: canonical_layout.byte_count_alignment,
            field_alignment: canonical_layout.field_alignment,
            field_size: canonical_layout.field_size,
            offsets: Vec::new(),
            layout_abi_stable: canonical_layout.layout_abi_stable,
        };
        tracing::trace!(
            target: "layout",
            stage = "runtime_determined.instance",
            type_name = ctx.name(ty),
            canonical = ctx.name(canonical),
            size = layout.byte_count_unaligned,
            align = layout.byte_count_alignment
        );
        Ok(layout)
    }

    fn compute_static_field_layout(
        &self,
        ctx: &TypeSystemContext,
        ty: TypeId,
        _kind: StaticLayoutKind,
    ) -> Result<ComputedStaticFieldLayout> {
        let _ = Self::canonical_type(ctx, ty);
        Err(Self::refuse(ctx, ty, LayoutOperation::StaticFieldLayout))
    }

    fn compute_contains_gc_pointers(&self, ctx: &TypeSystemContext, ty: TypeId) -> Result<bool> {
        ctx.contains_gc_pointers(Self::canonical_type(ctx, ty))
    }

    fn compute_contains_byrefs(&self, ctx: &TypeSystemContext, ty: TypeId) -> Result<bool> {
        ctx.contains_byrefs(Self::canonical_type(ctx, ty))
    }

    fn compute_value_type_shape_characteristics(
        &self,
        ctx: &TypeSystemContext,
        ty: TypeId,
    ) -> Result<ValueTypeShapeCharacteristics> {
        ctx.value_type_shape_characteristics(Self::canonical_type(ctx, ty))
    }

    fn compute_is_unsafe_value_type(&self, ctx: &TypeSystemContext, ty: TypeId) -> Result<bool> {
        ctx.is_unsafe_value_type(Self::canonical_type(ctx, ty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Target, TargetArch, TargetOs};
    use crate::type_system::{DefType, FieldDesc, PrimitiveType};

    fn shared_pair() -> (TypeSystemContext, TypeId, TypeId) {
        let mut ctx =
            TypeSystemContext::new(Target::from_components(TargetArch::X86_64, TargetOs::Linux));
        let long = ctx.primitive(PrimitiveType::I64);
        let canonical = ctx
            .add_def_type(
                "Pair<__Canon>",
                DefType::value_type()
                    .with_field(FieldDesc::instance("first", long))
                    .with_field(FieldDesc::instance("second", long)),
            )
            .unwrap_or_else(|err| panic!("canonical: {err}"));
        let rd = ctx
            .add_runtime_determined("Pair<T>", canonical)
            .unwrap_or_else(|err| panic!("placeholder: {err}"));
        (ctx, canonical, rd)
    }

    #[test]
    fn type_only_copies_canonical_scalars_without_offsets() {
        let (ctx, canonical, rd) = shared_pair();
        let layout = RuntimeDeterminedFieldLayoutAlgorithm
            .compute_instance_layout(&ctx, rd, InstanceLayoutKind::TypeOnly)
            .unwrap_or_else(|err| panic!("type-only layout: {err}"));
        let expected = ctx
            .instance_layout(canonical, InstanceLayoutKind::WithOffsets)
            .unwrap_or_else(|err| panic!("canonical layout: {err}"));
        assert_eq!(expected.offsets.len(), 2);
        assert_eq!(layout, expected.without_offsets());
    }

    #[test]
    fn offsets_and_statics_are_refused() {
        let (ctx, _, rd) = shared_pair();
        let err = RuntimeDeterminedFieldLayoutAlgorithm
            .compute_instance_layout(&ctx, rd, InstanceLayoutKind::WithOffsets)
            .expect_err("offsets must be refused");
        assert!(matches!(
            err,
            Error::UnsupportedOperation {
                operation: LayoutOperation::InstanceFieldOffsets,
                ..
            }
        ));

        for kind in [StaticLayoutKind::RegionSizes, StaticLayoutKind::RegionSizesAndFields] {
            let err = RuntimeDeterminedFieldLayoutAlgorithm
                .compute_static_field_layout(&ctx, rd, kind)
                .expect_err("statics must be refused");
            assert_eq!(
                err.to_string(),
                "unsupported operation: static field layout for `Pair<T>`"
            );
        }
    }

    #[test]
    #[should_panic(expected = "routed to the runtime-determined layout algorithm")]
    fn concrete_types_are_a_routing_bug() {
        let (ctx, canonical, _) = shared_pair();
        let _ = RuntimeDeterminedFieldLayoutAlgorithm.compute_contains_gc_pointers(&ctx, canonical);
    }
}

//! Layout for ordinary types: primitives, pointers, by-refs and nominal types.

use std::cell::RefCell;
use std::collections::HashSet;

use super::algorithm::FieldLayoutAlgorithm;
use super::records::{
    ComputedInstanceFieldLayout, ComputedStaticFieldLayout, FieldAndOffset, InstanceLayoutKind,
    MIN_ALIGN, StaticFieldPlacement, StaticLayoutKind, StaticRegion, align_to,
};
use super::shape::ValueTypeShapeCharacteristics;
use crate::error::{Error, Result};
use crate::type_system::{
    DefType, FieldDesc, FieldRef, LayoutKind, PrimitiveType, TypeId, TypeKind, TypeSystemContext,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LayoutQuery {
    Instance,
    GcPointers,
    ByRefs,
    Shape,
    Unsafe,
}

thread_local! {
    static VISITING: RefCell<HashSet<(TypeId, LayoutQuery)>> = RefCell::new(HashSet::new());
}

/// Marks a type as being laid out on this thread; re-entry means it contains itself.
struct VisitGuard {
    key: (TypeId, LayoutQuery),
}

impl VisitGuard {
    fn enter(ctx: &TypeSystemContext, ty: TypeId, query: LayoutQuery) -> Result<Self> {
        let key = (ty, query);
        let inserted = VISITING.with(|visiting| visiting.borrow_mut().insert(key));
        if !inserted {
            return Err(Error::invalid_layout(ctx.name(ty), "layout depends on itself"));
        }
        Ok(Self { key })
    }
}

impl Drop for VisitGuard {
    fn drop(&mut self) {
        VISITING.with(|visiting| {
            visiting.borrow_mut().remove(&self.key);
        });
    }
}

/// How a field's storage is treated by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldClass {
    Scalar,
    GcReference,
    ByRef,
    Value(TypeId),
}

impl FieldClass {
    fn is_tracked_pointer(self) -> bool {
        matches!(self, FieldClass::GcReference | FieldClass::ByRef)
    }
}

#[derive(Debug, Clone, Copy)]
struct FieldStorage {
    size: usize,
    align: usize,
    class: FieldClass,
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    index: u32,
    offset: usize,
    storage: FieldStorage,
}

impl Placement {
    fn end(&self) -> usize {
        self.offset + self.storage.size
    }

    fn overlaps(&self, other: &Placement) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

fn field_class(ctx: &TypeSystemContext, ty: TypeId) -> FieldClass {
    match &ctx.desc(ty).kind {
        TypeKind::Primitive(_) | TypeKind::Pointer => FieldClass::Scalar,
        TypeKind::ByRef => FieldClass::ByRef,
        TypeKind::Def(_) | TypeKind::RuntimeDetermined(_) => {
            if ctx.is_value_type(ty) {
                FieldClass::Value(ty)
            } else {
                FieldClass::GcReference
            }
        }
    }
}

fn field_storage(ctx: &TypeSystemContext, ty: TypeId) -> Result<FieldStorage> {
    let target = ctx.target();
    let class = field_class(ctx, ty);
    let (size, align) = match (&ctx.desc(ty).kind, class) {
        (TypeKind::Primitive(primitive), _) => primitive.size_align(target),
        (_, FieldClass::Value(value)) => {
            let layout = ctx.instance_layout(value, InstanceLayoutKind::TypeOnly)?;
            (layout.field_size, layout.field_alignment)
        }
        _ => (target.pointer_size(), target.pointer_align()),
    };
    Ok(FieldStorage { size, align, class })
}

fn leaf_aggregate(
    ctx: &TypeSystemContext,
    primitive: PrimitiveType,
) -> Option<(ValueTypeShapeCharacteristics, usize)> {
    let vectors = ctx.target().supports_vector_aggregates();
    match primitive {
        PrimitiveType::F32 => Some((ValueTypeShapeCharacteristics::HOMOGENOUS_FLOAT_AGGREGATE, 4)),
        PrimitiveType::F64 => Some((ValueTypeShapeCharacteristics::HOMOGENOUS_DOUBLE_AGGREGATE, 8)),
        PrimitiveType::Vector64 if vectors => {
            Some((ValueTypeShapeCharacteristics::HOMOGENOUS_VECTOR64_AGGREGATE, 8))
        }
        PrimitiveType::Vector128 if vectors => {
            Some((ValueTypeShapeCharacteristics::HOMOGENOUS_VECTOR128_AGGREGATE, 16))
        }
        _ => None,
    }
}

/// Packing, alignment and classification for ordinary types.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcreteFieldLayoutAlgorithm;

impl ConcreteFieldLayoutAlgorithm {
    /// # Panics
    ///
    /// Panics when `ty` is runtime-determined; those are answered through their canonical type.
    fn expect_concrete(ctx: &TypeSystemContext, ty: TypeId) -> &TypeKind {
        let kind = &ctx.desc(ty).kind;
        assert!(
            !matches!(kind, TypeKind::RuntimeDetermined(_)),
            "runtime-determined type `{}` routed to the concrete layout algorithm",
            ctx.name(ty)
        );
        kind
    }

    fn validate_field(
        ctx: &TypeSystemContext,
        owner: TypeId,
        def: &DefType,
        field: &FieldDesc,
        class: FieldClass,
    ) -> Result<()> {
        let name = ctx.name(owner);
        if field.explicit_offset.is_some() && def.layout != LayoutKind::Explicit {
            return Err(Error::invalid_layout(
                name,
                format!(
                    "field `{}` declares an offset but the type does not use explicit layout",
                    field.name
                ),
            ));
        }
        let stack_only = match class {
            FieldClass::ByRef => true,
            FieldClass::Value(value) => ctx.is_byref_like(value),
            FieldClass::Scalar | FieldClass::GcReference => false,
        };
        if stack_only && !(def.is_value_type() && def.is_byref_like) {
            return Err(Error::invalid_layout(
                name,
                format!(
                    "field `{}` is by-ref-like but the type is not a by-ref-like value type",
                    field.name
                ),
            ));
        }
        Ok(())
    }

    /// First byte available to declared instance fields.
    fn instance_start(ctx: &TypeSystemContext, owner: TypeId, def: &DefType) -> Result<usize> {
        let target = ctx.target();
        match def.base {
            Some(base) if def.is_value_type() => Err(Error::invalid_layout(
                ctx.name(owner),
                format!("value types cannot derive from `{}`", ctx.name(base)),
            )),
            Some(base) if ctx.is_value_type(base) => Err(Error::invalid_layout(
                ctx.name(owner),
                format!("base type `{}` is not a reference type", ctx.name(base)),
            )),
            Some(base) => Ok(ctx
                .instance_layout(base, InstanceLayoutKind::TypeOnly)?
                .byte_count_unaligned),
            None if def.is_value_type() => Ok(0),
            // Object header slot.
            None => Ok(target.pointer_size()),
        }
    }

    fn offset_overflow(ctx: &TypeSystemContext, owner: TypeId, field: &FieldDesc) -> Error {
        Error::invalid_layout(
            ctx.name(owner),
            format!("field `{}` offset overflows", field.name),
        )
    }

    fn place_sequential(
        ctx: &TypeSystemContext,
        owner: TypeId,
        def: &DefType,
        start: usize,
        mut fields: Vec<(u32, FieldStorage)>,
        packing: usize,
    ) -> Result<(Vec<Placement>, usize, usize)> {
        if def.layout == LayoutKind::Auto {
            // References first, then by decreasing alignment to minimise padding.
            fields.sort_by_key(|(_, storage)| {
                (
                    storage.class != FieldClass::GcReference,
                    std::cmp::Reverse(storage.align),
                )
            });
        }
        let mut offset = start;
        let mut largest = MIN_ALIGN;
        let mut placements = Vec::with_capacity(fields.len());
        for (index, storage) in fields {
            let field = &def.fields[index as usize];
            let align = storage.align.min(packing).max(MIN_ALIGN);
            offset = align_to(offset, align)
                .ok_or_else(|| Self::offset_overflow(ctx, owner, field))?;
            placements.push(Placement {
                index,
                offset,
                storage,
            });
            offset = offset
                .checked_add(storage.size)
                .ok_or_else(|| Self::offset_overflow(ctx, owner, field))?;
            largest = largest.max(align);
        }
        Ok((placements, offset, largest))
    }

    fn place_explicit(
        ctx: &TypeSystemContext,
        owner: TypeId,
        def: &DefType,
        start: usize,
        fields: &[(u32, FieldStorage)],
        packing: usize,
    ) -> Result<(Vec<Placement>, usize, usize)> {
        let name = ctx.name(owner);
        let pointer_align = ctx.target().pointer_align();
        let mut end = start;
        let mut largest = MIN_ALIGN;
        let mut placements = Vec::with_capacity(fields.len());
        for (index, storage) in fields {
            let field = &def.fields[*index as usize];
            let declared = field.explicit_offset.ok_or_else(|| {
                Error::invalid_layout(
                    name,
                    format!("field `{}` has no explicit offset", field.name),
                )
            })?;
            let offset = start
                .checked_add(declared)
                .ok_or_else(|| Self::offset_overflow(ctx, owner, field))?;
            let field_end = offset
                .checked_add(storage.size)
                .ok_or_else(|| Self::offset_overflow(ctx, owner, field))?;
            // Tracked pointers nested in value fields must stay pointer aligned as well.
            if offset % pointer_align != 0 && Self::holds_tracked_pointers(ctx, storage.class)? {
                return Err(Error::invalid_layout(
                    name,
                    format!("reference field `{}` at offset {declared} is misaligned", field.name),
                ));
            }
            placements.push(Placement {
                index: *index,
                offset,
                storage: *storage,
            });
            end = end.max(field_end);
            largest = largest.max(storage.align.min(packing).max(MIN_ALIGN));
        }
        Self::check_reference_overlap(ctx, owner, def, &placements)?;
        Ok((placements, end, largest))
    }

    /// References may only overlap references at the same offset.
    fn check_reference_overlap(
        ctx: &TypeSystemContext,
        owner: TypeId,
        def: &DefType,
        placements: &[Placement],
    ) -> Result<()> {
        for (position, first) in placements.iter().enumerate() {
            for second in &placements[position + 1..] {
                if !first.overlaps(second) {
                    continue;
                }
                let first_tracked = Self::holds_tracked_pointers(ctx, first.storage.class)?;
                let second_tracked = Self::holds_tracked_pointers(ctx, second.storage.class)?;
                if !first_tracked && !second_tracked {
                    continue;
                }
                let aliased_references = first.storage.class == FieldClass::GcReference
                    && second.storage.class == FieldClass::GcReference
                    && first.offset == second.offset;
                if !aliased_references {
                    return Err(Error::invalid_layout(
                        ctx.name(owner),
                        format!(
                            "field `{}` overlaps field `{}` and one of them holds a reference",
                            def.fields[first.index as usize].name,
                            def.fields[second.index as usize].name
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    fn holds_tracked_pointers(ctx: &TypeSystemContext, class: FieldClass) -> Result<bool> {
        match class {
            FieldClass::Value(value) => {
                Ok(ctx.contains_gc_pointers(value)? || ctx.contains_byrefs(value)?)
            }
            other => Ok(other.is_tracked_pointer()),
        }
    }

    fn instance_storages(
        ctx: &TypeSystemContext,
        owner: TypeId,
        def: &DefType,
    ) -> Result<Vec<(u32, FieldStorage)>> {
        def.instance_fields()
            .map(|(index, field)| {
                let storage = field_storage(ctx, field.ty)?;
                Self::validate_field(ctx, owner, def, field, storage.class)?;
                Ok((index, storage))
            })
            .collect()
    }

    fn layout_def(
        ctx: &TypeSystemContext,
        ty: TypeId,
        def: &DefType,
    ) -> Result<ComputedInstanceFieldLayout> {
        let _guard = VisitGuard::enter(ctx, ty, LayoutQuery::Instance)?;
        let target = ctx.target();
        let start = Self::instance_start(ctx, ty, def)?;
        let storages = Self::instance_storages(ctx, ty, def)?;
        let packing = def.packing.filter(|packing| *packing > 0).unwrap_or(usize::MAX);

        let (mut placements, end, largest) = match def.layout {
            LayoutKind::Explicit => Self::place_explicit(ctx, ty, def, start, &storages, packing)?,
            LayoutKind::Auto | LayoutKind::Sequential => {
                Self::place_sequential(ctx, ty, def, start, storages, packing)?
            }
        };
        placements.sort_by_key(|placement| placement.index);

        let mut layout_abi_stable = def.layout != LayoutKind::Auto;
        for placement in &placements {
            if let FieldClass::Value(value) = placement.storage.class {
                layout_abi_stable &= ctx.layout_abi_stable(value)?;
            }
        }
        if let Some(base) = def.base {
            layout_abi_stable &= ctx.layout_abi_stable(base)?;
        }

        let offsets = placements
            .iter()
            .map(|placement| FieldAndOffset {
                field: FieldRef::new(ty, placement.index),
                offset: placement.offset,
            })
            .collect();

        let size_overflow = || Error::invalid_layout(ctx.name(ty), "instance size overflows");
        let layout = if def.is_value_type() {
            let mut unaligned = end.max(1);
            if let Some(class_size) = def.class_size {
                unaligned = unaligned.max(class_size);
            }
            ComputedInstanceFieldLayout {
                byte_count_unaligned: unaligned,
                byte_count_alignment: largest,
                field_alignment: largest,
                field_size: align_to(unaligned, largest).ok_or_else(size_overflow)?,
                offsets,
                layout_abi_stable,
            }
        } else {
            let alignment = largest.max(target.pointer_align());
            align_to(end, alignment).ok_or_else(size_overflow)?;
            ComputedInstanceFieldLayout {
                byte_count_unaligned: end,
                byte_count_alignment: alignment,
                field_alignment: target.pointer_align(),
                field_size: target.pointer_size(),
                offsets,
                layout_abi_stable,
            }
        };

        tracing::debug!(
            target: "layout",
            stage = "concrete.instance",
            type_name = ctx.name(ty),
            size = layout.byte_count_unaligned,
            align = layout.byte_count_alignment,
            fields = layout.offsets.len(),
            abi_stable = layout.layout_abi_stable
        );
        Ok(layout)
    }

    fn layout_statics(
        ctx: &TypeSystemContext,
        ty: TypeId,
        def: &DefType,
    ) -> Result<ComputedStaticFieldLayout> {
        let target = ctx.target();
        let mut layout = ComputedStaticFieldLayout::default();
        for (index, field) in def.static_fields() {
            let class = field_class(ctx, field.ty);
            let stack_only = match class {
                FieldClass::ByRef => true,
                FieldClass::Value(value) => ctx.is_byref_like(value),
                FieldClass::Scalar | FieldClass::GcReference => false,
            };
            if stack_only {
                return Err(Error::invalid_layout(
                    ctx.name(ty),
                    format!("static field `{}` cannot be by-ref-like", field.name),
                ));
            }
            let is_gc = match class {
                FieldClass::GcReference => true,
                FieldClass::Value(value) => ctx.contains_gc_pointers(value)?,
                FieldClass::Scalar | FieldClass::ByRef => false,
            };
            // Values holding references live boxed in the collector-tracked region.
            let (size, align) = if is_gc {
                (target.pointer_size(), target.pointer_align())
            } else {
                let storage = field_storage(ctx, field.ty)?;
                (storage.size, storage.align)
            };
            let region = StaticRegion::for_field(is_gc, field.is_thread_static);
            let offset = layout.block_mut(region).place(size, align).ok_or_else(|| {
                Error::invalid_layout(
                    ctx.name(ty),
                    format!("static field `{}` offset overflows", field.name),
                )
            })?;
            layout.offsets.push(StaticFieldPlacement {
                region,
                field: FieldRef::new(ty, index),
                offset,
            });
        }
        tracing::debug!(
            target: "layout",
            stage = "concrete.statics",
            type_name = ctx.name(ty),
            non_gc = layout.non_gc_statics.size,
            gc = layout.gc_statics.size,
            thread_non_gc = layout.thread_non_gc_statics.size,
            thread_gc = layout.thread_gc_statics.size
        );
        Ok(layout)
    }

    fn has_overlapping_fields(ctx: &TypeSystemContext, ty: TypeId, def: &DefType) -> Result<bool> {
        if def.layout != LayoutKind::Explicit {
            return Ok(false);
        }
        let layout = ctx.instance_layout(ty, InstanceLayoutKind::WithOffsets)?;
        let mut placements = Vec::with_capacity(layout.offsets.len());
        for entry in &layout.offsets {
            let field = &def.fields[entry.field.index as usize];
            placements.push(Placement {
                index: entry.field.index,
                offset: entry.offset,
                storage: field_storage(ctx, field.ty)?,
            });
        }
        Ok(placements.iter().enumerate().any(|(position, first)| {
            placements[position + 1..]
                .iter()
                .any(|second| first.overlaps(second))
        }))
    }

    fn aggregate_shape(
        ctx: &TypeSystemContext,
        ty: TypeId,
        def: &DefType,
    ) -> Result<ValueTypeShapeCharacteristics> {
        let none = ValueTypeShapeCharacteristics::NONE;
        if def.layout == LayoutKind::Explicit || !ctx.target().supports_homogeneous_aggregates() {
            return Ok(none);
        }
        let mut element: Option<(ValueTypeShapeCharacteristics, usize)> = None;
        let mut count = 0usize;
        for (_, field) in def.instance_fields() {
            let (kind, element_size, elements) = match &ctx.desc(field.ty).kind {
                TypeKind::Primitive(primitive) => match leaf_aggregate(ctx, *primitive) {
                    Some((kind, size)) => (kind, size, 1),
                    None => return Ok(none),
                },
                TypeKind::Def(_) | TypeKind::RuntimeDetermined(_)
                    if ctx.is_value_type(field.ty) =>
                {
                    let shape = ctx.value_type_shape_characteristics(field.ty)?;
                    let Some(size) = shape.aggregate_element_size() else {
                        return Ok(none);
                    };
                    let field_size = ctx
                        .instance_layout(field.ty, InstanceLayoutKind::TypeOnly)?
                        .field_size;
                    let aggregate = ValueTypeShapeCharacteristics::from_bits(
                        shape.bits() & ValueTypeShapeCharacteristics::AGGREGATE_MASK.bits(),
                    );
                    (aggregate, size, field_size / size)
                }
                _ => return Ok(none),
            };
            match element {
                Some(existing) if existing != (kind, element_size) => return Ok(none),
                _ => element = Some((kind, element_size)),
            }
            count += elements;
        }
        let Some((kind, element_size)) = element else {
            return Ok(none);
        };
        if count == 0 || count > 4 {
            return Ok(none);
        }
        let layout = ctx.instance_layout(ty, InstanceLayoutKind::TypeOnly)?;
        if layout.field_size != count * element_size {
            return Ok(none);
        }
        Ok(kind)
    }
}

impl FieldLayoutAlgorithm for ConcreteFieldLayoutAlgorithm {
    fn compute_instance_layout(
        &self,
        ctx: &TypeSystemContext,
        ty: TypeId,
        kind: InstanceLayoutKind,
    ) -> Result<ComputedInstanceFieldLayout> {
        let target = ctx.target();
        let layout = match Self::expect_concrete(ctx, ty) {
            TypeKind::Primitive(primitive) => {
                let (size, align) = primitive.size_align(target);
                ComputedInstanceFieldLayout::scalar(size, align)
            }
            TypeKind::Pointer | TypeKind::ByRef => {
                ComputedInstanceFieldLayout::scalar(target.pointer_size(), target.pointer_align())
            }
            TypeKind::Def(def) => Self::layout_def(ctx, ty, def)?,
            TypeKind::RuntimeDetermined(_) => unreachable!("rejected by expect_concrete"),
        };
        Ok(match kind {
            InstanceLayoutKind::WithOffsets => layout,
            InstanceLayoutKind::TypeOnly => layout.without_offsets(),
        })
    }

    fn compute_static_field_layout(
        &self,
        ctx: &TypeSystemContext,
        ty: TypeId,
        kind: StaticLayoutKind,
    ) -> Result<ComputedStaticFieldLayout> {
        let layout = match Self::expect_concrete(ctx, ty) {
            TypeKind::Def(def) => Self::layout_statics(ctx, ty, def)?,
            _ => ComputedStaticFieldLayout::default(),
        };
        Ok(match kind {
            StaticLayoutKind::RegionSizesAndFields => layout,
            StaticLayoutKind::RegionSizes => layout.without_offsets(),
        })
    }

    fn compute_contains_gc_pointers(&self, ctx: &TypeSystemContext, ty: TypeId) -> Result<bool> {
        let TypeKind::Def(def) = Self::expect_concrete(ctx, ty) else {
            return Ok(false);
        };
        let _guard = VisitGuard::enter(ctx, ty, LayoutQuery::GcPointers)?;
        if let Some(base) = def.base
            && ctx.contains_gc_pointers(base)?
        {
            return Ok(true);
        }
        for (_, field) in def.instance_fields() {
            let contains = match field_class(ctx, field.ty) {
                FieldClass::GcReference => true,
                FieldClass::Value(value) => ctx.contains_gc_pointers(value)?,
                FieldClass::Scalar | FieldClass::ByRef => false,
            };
            if contains {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn compute_contains_byrefs(&self, ctx: &TypeSystemContext, ty: TypeId) -> Result<bool> {
        let TypeKind::Def(def) = Self::expect_concrete(ctx, ty) else {
            return Ok(false);
        };
        let _guard = VisitGuard::enter(ctx, ty, LayoutQuery::ByRefs)?;
        for (_, field) in def.instance_fields() {
            let contains = match field_class(ctx, field.ty) {
                FieldClass::ByRef => true,
                FieldClass::Value(value) => ctx.contains_byrefs(value)?,
                FieldClass::Scalar | FieldClass::GcReference => false,
            };
            if contains {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn compute_value_type_shape_characteristics(
        &self,
        ctx: &TypeSystemContext,
        ty: TypeId,
    ) -> Result<ValueTypeShapeCharacteristics> {
        match Self::expect_concrete(ctx, ty) {
            TypeKind::Def(def) if def.is_value_type() => {
                let _guard = VisitGuard::enter(ctx, ty, LayoutQuery::Shape)?;
                Self::aggregate_shape(ctx, ty, def)
            }
            _ => Ok(ValueTypeShapeCharacteristics::NONE),
        }
    }

    fn compute_is_unsafe_value_type(&self, ctx: &TypeSystemContext, ty: TypeId) -> Result<bool> {
        let def = match Self::expect_concrete(ctx, ty) {
            TypeKind::Def(def) if def.is_value_type() => def,
            _ => return Ok(false),
        };
        let _guard = VisitGuard::enter(ctx, ty, LayoutQuery::Unsafe)?;
        if def.is_marked_unsafe || Self::has_overlapping_fields(ctx, ty, def)? {
            return Ok(true);
        }
        for (_, field) in def.instance_fields() {
            if let FieldClass::Value(value) = field_class(ctx, field.ty)
                && ctx.is_unsafe_value_type(value)?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

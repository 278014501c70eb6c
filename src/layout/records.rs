//! Immutable results of layout computation.

use crate::type_system::FieldRef;

pub(crate) const MIN_ALIGN: usize = 1;

/// Round `value` up to a multiple of `align`; `None` when the result does not fit in `usize`.
pub(crate) fn align_to(value: usize, align: usize) -> Option<usize> {
    if align <= 1 {
        Some(value)
    } else {
        value.checked_next_multiple_of(align)
    }
}

/// How much of an instance layout the caller needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceLayoutKind {
    /// Size and alignment only.
    TypeOnly,
    /// Size, alignment and the offset of every instance field.
    WithOffsets,
}

/// How much of a static layout the caller needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticLayoutKind {
    RegionSizes,
    RegionSizesAndFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldAndOffset {
    pub field: FieldRef,
    pub offset: usize,
}

/// Instance shape of one type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComputedInstanceFieldLayout {
    pub byte_count_unaligned: usize,
    pub byte_count_alignment: usize,
    /// Alignment when embedded as a field of another type.
    pub field_alignment: usize,
    /// Size when embedded as a field of another type.
    pub field_size: usize,
    /// Declaration order; empty when offsets were not requested or must not be exposed.
    pub offsets: Vec<FieldAndOffset>,
    pub layout_abi_stable: bool,
}

impl ComputedInstanceFieldLayout {
    /// Layout of a scalar with no fields of its own.
    #[must_use]
    pub fn scalar(size: usize, align: usize) -> Self {
        Self {
            byte_count_unaligned: size,
            byte_count_alignment: align,
            field_alignment: align,
            field_size: size,
            offsets: Vec::new(),
            layout_abi_stable: true,
        }
    }

    /// Unaligned byte count rounded up to the byte-count alignment, saturating at `usize::MAX`.
    /// Computed layouts are rejected before they could saturate.
    #[must_use]
    pub fn byte_count(&self) -> usize {
        align_to(self.byte_count_unaligned, self.byte_count_alignment).unwrap_or(usize::MAX)
    }

    #[must_use]
    pub fn offset_of(&self, field: FieldRef) -> Option<usize> {
        self.offsets
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.offset)
    }

    #[must_use]
    pub fn without_offsets(&self) -> Self {
        Self {
            offsets: Vec::new(),
            ..self.clone()
        }
    }
}

/// Size and alignment of one static storage region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StaticsBlock {
    pub size: usize,
    pub largest_alignment: usize,
}

impl StaticsBlock {
    /// Reserve `size` bytes at the next `align` boundary; `None` when the block would overflow.
    pub(crate) fn place(&mut self, size: usize, align: usize) -> Option<usize> {
        let offset = align_to(self.size, align)?;
        self.size = offset.checked_add(size)?;
        self.largest_alignment = self.largest_alignment.max(align);
        Some(offset)
    }
}

/// Storage region a static field lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticRegion {
    NonGc,
    Gc,
    ThreadNonGc,
    ThreadGc,
}

impl StaticRegion {
    #[must_use]
    pub fn for_field(is_gc: bool, is_thread_static: bool) -> Self {
        match (is_gc, is_thread_static) {
            (false, false) => StaticRegion::NonGc,
            (true, false) => StaticRegion::Gc,
            (false, true) => StaticRegion::ThreadNonGc,
            (true, true) => StaticRegion::ThreadGc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StaticFieldPlacement {
    pub region: StaticRegion,
    pub field: FieldRef,
    pub offset: usize,
}

/// Per-type static storage, split by collector tracking and thread locality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ComputedStaticFieldLayout {
    pub non_gc_statics: StaticsBlock,
    pub gc_statics: StaticsBlock,
    pub thread_non_gc_statics: StaticsBlock,
    pub thread_gc_statics: StaticsBlock,
    pub offsets: Vec<StaticFieldPlacement>,
}

impl ComputedStaticFieldLayout {
    #[must_use]
    pub fn block(&self, region: StaticRegion) -> &StaticsBlock {
        match region {
            StaticRegion::NonGc => &self.non_gc_statics,
            StaticRegion::Gc => &self.gc_statics,
            StaticRegion::ThreadNonGc => &self.thread_non_gc_statics,
            StaticRegion::ThreadGc => &self.thread_gc_statics,
        }
    }

    pub(crate) fn block_mut(&mut self, region: StaticRegion) -> &mut StaticsBlock {
        match region {
            StaticRegion::NonGc => &mut self.non_gc_statics,
            StaticRegion::Gc => &mut self.gc_statics,
            StaticRegion::ThreadNonGc => &mut self.thread_non_gc_statics,
            StaticRegion::ThreadGc => &mut self.thread_gc_statics,
        }
    }

    #[must_use]
    pub fn without_offsets(&self) -> Self {
        Self {
            offsets: Vec::new(),
            ..self.clone()
        }
    }
}

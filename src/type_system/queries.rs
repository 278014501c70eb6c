//! Property-style layout queries.
//!
//! Concrete results are memoized on the type. Runtime-determined types have no cache and are
//! recomputed from their canonical type on every call.

use std::borrow::Cow;

use once_cell::sync::OnceCell;

use super::context::TypeSystemContext;
use super::types::{LayoutCache, TypeId};
use crate::error::Result;
use crate::layout::{
    ComputedInstanceFieldLayout, ComputedStaticFieldLayout, FieldLayoutAlgorithm,
    InstanceLayoutKind, StaticLayoutKind, ValueTypeShapeCharacteristics, layout_algorithm_for,
};

/// Compute-then-insert memoization: racing first users may each compute, and every caller
/// observes the first inserted value.
fn memoize<T>(cell: &OnceCell<T>, compute: impl FnOnce() -> Result<T>) -> Result<&T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = compute()?;
    match cell.try_insert(value) {
        Ok(inserted) => Ok(inserted),
        Err((existing, _)) => Ok(existing),
    }
}

impl TypeSystemContext {
    /// Algorithm selected by the type's category tag.
    #[must_use]
    pub fn layout_algorithm(&self, ty: TypeId) -> &'static dyn FieldLayoutAlgorithm {
        layout_algorithm_for(self.category(ty))
    }

    fn layout_cache(&self, ty: TypeId) -> Option<&LayoutCache> {
        self.desc(ty).cache()
    }

    fn instance_facts(&self, ty: TypeId) -> Result<Cow<'_, ComputedInstanceFieldLayout>> {
        let algorithm = self.layout_algorithm(ty);
        match self.layout_cache(ty) {
            Some(cache) => memoize(&cache.instance, || {
                algorithm.compute_instance_layout(self, ty, InstanceLayoutKind::WithOffsets)
            })
            .map(Cow::Borrowed),
            None => algorithm
                .compute_instance_layout(self, ty, InstanceLayoutKind::TypeOnly)
                .map(Cow::Owned),
        }
    }

    /// Instance layout of `ty`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::Error::UnsupportedOperation`] when offsets are requested for a
    /// runtime-determined type, and with [`crate::Error::InvalidLayout`] when the type cannot
    /// be laid out.
    pub fn instance_layout(
        &self,
        ty: TypeId,
        kind: InstanceLayoutKind,
    ) -> Result<ComputedInstanceFieldLayout> {
        let algorithm = self.layout_algorithm(ty);
        let Some(cache) = self.layout_cache(ty) else {
            return algorithm.compute_instance_layout(self, ty, kind);
        };
        let full = memoize(&cache.instance, || {
            algorithm.compute_instance_layout(self, ty, InstanceLayoutKind::WithOffsets)
        })?;
        Ok(match kind {
            InstanceLayoutKind::WithOffsets => full.clone(),
            InstanceLayoutKind::TypeOnly => full.without_offsets(),
        })
    }

    /// # Errors
    ///
    /// Fails when the type cannot be laid out.
    pub fn instance_byte_count_unaligned(&self, ty: TypeId) -> Result<usize> {
        Ok(self.instance_facts(ty)?.byte_count_unaligned)
    }

    /// # Errors
    ///
    /// Fails when the type cannot be laid out.
    pub fn instance_byte_alignment(&self, ty: TypeId) -> Result<usize> {
        Ok(self.instance_facts(ty)?.byte_count_alignment)
    }

    /// Unaligned byte count rounded up to the byte-count alignment.
    ///
    /// # Errors
    ///
    /// Fails when the type cannot be laid out.
    pub fn instance_byte_count(&self, ty: TypeId) -> Result<usize> {
        Ok(self.instance_facts(ty)?.byte_count())
    }

    /// # Errors
    ///
    /// Fails when the type cannot be laid out.
    pub fn instance_field_alignment(&self, ty: TypeId) -> Result<usize> {
        Ok(self.instance_facts(ty)?.field_alignment)
    }

    /// # Errors
    ///
    /// Fails when the type cannot be laid out.
    pub fn instance_field_size(&self, ty: TypeId) -> Result<usize> {
        Ok(self.instance_facts(ty)?.field_size)
    }

    /// # Errors
    ///
    /// Fails when the type cannot be laid out.
    pub fn layout_abi_stable(&self, ty: TypeId) -> Result<bool> {
        Ok(self.instance_facts(ty)?.layout_abi_stable)
    }

    /// Static storage of `ty`.
    ///
    /// # Errors
    ///
    /// Always fails for runtime-determined types; fails for concrete types that cannot be
    /// laid out.
    pub fn static_field_layout(
        &self,
        ty: TypeId,
        kind: StaticLayoutKind,
    ) -> Result<ComputedStaticFieldLayout> {
        let algorithm = self.layout_algorithm(ty);
        let Some(cache) = self.layout_cache(ty) else {
            return algorithm.compute_static_field_layout(self, ty, kind);
        };
        let full = memoize(&cache.statics, || {
            algorithm.compute_static_field_layout(self, ty, StaticLayoutKind::RegionSizesAndFields)
        })?;
        Ok(match kind {
            StaticLayoutKind::RegionSizesAndFields => full.clone(),
            StaticLayoutKind::RegionSizes => full.without_offsets(),
        })
    }

    /// # Errors
    ///
    /// Fails when the type cannot be laid out.
    pub fn contains_gc_pointers(&self, ty: TypeId) -> Result<bool> {
        let algorithm = self.layout_algorithm(ty);
        match self.layout_cache(ty) {
            Some(cache) => memoize(&cache.contains_gc_pointers, || {
                algorithm.compute_contains_gc_pointers(self, ty)
            })
            .copied(),
            None => algorithm.compute_contains_gc_pointers(self, ty),
        }
    }

    /// # Errors
    ///
    /// Fails when the type cannot be laid out.
    pub fn contains_byrefs(&self, ty: TypeId) -> Result<bool> {
        let algorithm = self.layout_algorithm(ty);
        match self.layout_cache(ty) {
            Some(cache) => memoize(&cache.contains_byrefs, || {
                algorithm.compute_contains_byrefs(self, ty)
            })
            .copied(),
            None => algorithm.compute_contains_byrefs(self, ty),
        }
    }

    /// # Errors
    ///
    /// Fails when the type cannot be laid out.
    pub fn value_type_shape_characteristics(
        &self,
        ty: TypeId,
    ) -> Result<ValueTypeShapeCharacteristics> {
        let algorithm = self.layout_algorithm(ty);
        match self.layout_cache(ty) {
            Some(cache) => memoize(&cache.shape, || {
                algorithm.compute_value_type_shape_characteristics(self, ty)
            })
            .copied(),
            None => algorithm.compute_value_type_shape_characteristics(self, ty),
        }
    }

    /// # Errors
    ///
    /// Fails when the type cannot be laid out.
    pub fn is_unsafe_value_type(&self, ty: TypeId) -> Result<bool> {
        let algorithm = self.layout_algorithm(ty);
        match self.layout_cache(ty) {
            Some(cache) => memoize(&cache.is_unsafe_value_type, || {
                algorithm.compute_is_unsafe_value_type(self, ty)
            })
            .copied(),
            None => algorithm.compute_is_unsafe_value_type(self, ty),
        }
    }
}

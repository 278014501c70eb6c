//! The capability every layout strategy implements, and the category dispatch table.

use super::concrete::ConcreteFieldLayoutAlgorithm;
use super::records::{
    ComputedInstanceFieldLayout, ComputedStaticFieldLayout, InstanceLayoutKind, StaticLayoutKind,
};
use super::runtime_determined::RuntimeDeterminedFieldLayoutAlgorithm;
use super::shape::ValueTypeShapeCharacteristics;
use crate::error::Result;
use crate::type_system::{TypeCategory, TypeId, TypeSystemContext};

/// One layout strategy per type category.
///
/// Implementations hold no per-call state and are shared across compilation threads.
/// Callers go through [`layout_algorithm_for`]; handing a type of another category to an
/// implementation is a programmer error and panics.
pub trait FieldLayoutAlgorithm: Sync {
    /// # Errors
    ///
    /// Fails when the type cannot be laid out or the requested detail is unavailable for
    /// the type's category.
    fn compute_instance_layout(
        &self,
        ctx: &TypeSystemContext,
        ty: TypeId,
        kind: InstanceLayoutKind,
    ) -> Result<ComputedInstanceFieldLayout>;

    /// # Errors
    ///
    /// Fails when the type has no single static layout or cannot be laid out.
    fn compute_static_field_layout(
        &self,
        ctx: &TypeSystemContext,
        ty: TypeId,
        kind: StaticLayoutKind,
    ) -> Result<ComputedStaticFieldLayout>;

    /// Whether any reachable field is a collector-tracked reference.
    ///
    /// # Errors
    ///
    /// Fails when the type cannot be laid out.
    fn compute_contains_gc_pointers(&self, ctx: &TypeSystemContext, ty: TypeId) -> Result<bool>;

    /// Whether any reachable field is a by-ref or a stack-only value.
    ///
    /// # Errors
    ///
    /// Fails when the type cannot be laid out.
    fn compute_contains_byrefs(&self, ctx: &TypeSystemContext, ty: TypeId) -> Result<bool>;

    /// # Errors
    ///
    /// Fails when the type cannot be laid out.
    fn compute_value_type_shape_characteristics(
        &self,
        ctx: &TypeSystemContext,
        ty: TypeId,
    ) -> Result<ValueTypeShapeCharacteristics>;

    /// Whether default-initializing or blindly copying the value is unsafe.
    ///
    /// # Errors
    ///
    /// Fails when the type cannot be laid out.
    fn compute_is_unsafe_value_type(&self, ctx: &TypeSystemContext, ty: TypeId) -> Result<bool>;
}

static CONCRETE_LAYOUT: ConcreteFieldLayoutAlgorithm = ConcreteFieldLayoutAlgorithm;
static RUNTIME_DETERMINED_LAYOUT: RuntimeDeterminedFieldLayoutAlgorithm =
    RuntimeDeterminedFieldLayoutAlgorithm;

/// Select the algorithm responsible for a type category.
#[must_use]
pub fn layout_algorithm_for(category: TypeCategory) -> &'static dyn FieldLayoutAlgorithm {
    match category {
        TypeCategory::RuntimeDetermined => &RUNTIME_DETERMINED_LAYOUT,
        TypeCategory::Primitive
        | TypeCategory::Pointer
        | TypeCategory::ByRef
        | TypeCategory::Def => &CONCRETE_LAYOUT,
    }
}

//! Field layout algorithms and their result records.

mod algorithm;
mod concrete;
mod identity;
mod records;
mod runtime_determined;
mod shape;

pub use algorithm::{FieldLayoutAlgorithm, layout_algorithm_for};
pub use concrete::ConcreteFieldLayoutAlgorithm;
pub use records::{
    ComputedInstanceFieldLayout, ComputedStaticFieldLayout, FieldAndOffset, InstanceLayoutKind,
    StaticFieldPlacement, StaticLayoutKind, StaticRegion, StaticsBlock,
};
pub use runtime_determined::RuntimeDeterminedFieldLayoutAlgorithm;
pub use shape::ValueTypeShapeCharacteristics;

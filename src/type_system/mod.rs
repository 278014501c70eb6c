//! Loader-owned type table and the layout queries it answers.

mod context;
mod primitives;
mod queries;
mod types;

pub use context::TypeSystemContext;
pub use primitives::PrimitiveType;
pub use types::{
    DefCategory, DefType, FieldDesc, FieldRef, LayoutKind, RuntimeDeterminedType, TypeCategory,
    TypeDesc, TypeId, TypeKind,
};

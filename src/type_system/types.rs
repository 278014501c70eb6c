//! Entity graph for types that can be laid out.

use std::fmt;

use once_cell::sync::OnceCell;

use super::primitives::PrimitiveType;
use crate::layout::{
    ComputedInstanceFieldLayout, ComputedStaticFieldLayout, ValueTypeShapeCharacteristics,
};

/// Handle into the loader-owned type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies a field by its owning type and declaration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub owner: TypeId,
    pub index: u32,
}

impl FieldRef {
    #[must_use]
    pub fn new(owner: TypeId, index: u32) -> Self {
        Self { owner, index }
    }
}

/// Size category of a nominal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefCategory {
    ValueType,
    ReferenceType,
}

/// Declared field arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    Auto,
    Sequential,
    Explicit,
}

/// Field declaration.
#[derive(Debug, Clone)]
pub struct FieldDesc {
    pub name: String,
    pub ty: TypeId,
    pub is_static: bool,
    pub is_thread_static: bool,
    pub explicit_offset: Option<usize>,
}

impl FieldDesc {
    #[must_use]
    pub fn instance(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
            is_static: false,
            is_thread_static: false,
            explicit_offset: None,
        }
    }

    #[must_use]
    pub fn static_field(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            is_static: true,
            ..Self::instance(name, ty)
        }
    }

    #[must_use]
    pub fn thread_static(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            is_static: true,
            is_thread_static: true,
            ..Self::instance(name, ty)
        }
    }

    #[must_use]
    pub fn at_offset(mut self, offset: usize) -> Self {
        self.explicit_offset = Some(offset);
        self
    }
}

/// A nominal type that declares fields.
#[derive(Debug, Clone)]
pub struct DefType {
    pub category: DefCategory,
    pub layout: LayoutKind,
    pub packing: Option<usize>,
    pub class_size: Option<usize>,
    pub base: Option<TypeId>,
    /// Stack-only value type; the only kind allowed to hold by-ref fields.
    pub is_byref_like: bool,
    /// Declared with a fixed buffer or an explicit unsafe marker.
    pub is_marked_unsafe: bool,
    pub fields: Vec<FieldDesc>,
}

impl DefType {
    #[must_use]
    pub fn value_type() -> Self {
        Self::new(DefCategory::ValueType)
    }

    #[must_use]
    pub fn reference_type() -> Self {
        Self::new(DefCategory::ReferenceType)
    }

    fn new(category: DefCategory) -> Self {
        Self {
            category,
            layout: LayoutKind::Sequential,
            packing: None,
            class_size: None,
            base: None,
            is_byref_like: false,
            is_marked_unsafe: false,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: LayoutKind) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn with_packing(mut self, packing: usize) -> Self {
        self.packing = Some(packing);
        self
    }

    #[must_use]
    pub fn with_class_size(mut self, size: usize) -> Self {
        self.class_size = Some(size);
        self
    }

    #[must_use]
    pub fn with_base(mut self, base: TypeId) -> Self {
        self.base = Some(base);
        self
    }

    #[must_use]
    pub fn byref_like(mut self) -> Self {
        self.is_byref_like = true;
        self
    }

    #[must_use]
    pub fn marked_unsafe(mut self) -> Self {
        self.is_marked_unsafe = true;
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: FieldDesc) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.category == DefCategory::ValueType
    }

    /// Instance fields paired with their declaration index.
    pub fn instance_fields(&self) -> impl Iterator<Item = (u32, &FieldDesc)> {
        self.indexed_fields().filter(|(_, field)| !field.is_static)
    }

    pub fn static_fields(&self) -> impl Iterator<Item = (u32, &FieldDesc)> {
        self.indexed_fields().filter(|(_, field)| field.is_static)
    }

    fn indexed_fields(&self) -> impl Iterator<Item = (u32, &FieldDesc)> {
        self.fields
            .iter()
            .enumerate()
            .map(|(index, field)| (u32::try_from(index).unwrap_or(u32::MAX), field))
    }
}

/// Placeholder for an instantiation that is only known once shared code runs.
///
/// The canonical link is fixed at construction; the type stores no layout of its own.
#[derive(Debug, Clone)]
pub struct RuntimeDeterminedType {
    canonical: TypeId,
}

impl RuntimeDeterminedType {
    pub(crate) fn new(canonical: TypeId) -> Self {
        Self { canonical }
    }

    #[must_use]
    pub fn canonical(&self) -> TypeId {
        self.canonical
    }
}

/// Shape of a table entry.
#[derive(Debug, Clone)]
pub enum TypeKind {
    Primitive(PrimitiveType),
    /// Unmanaged pointer; not tracked by the collector.
    Pointer,
    /// Managed by-reference; stack-only.
    ByRef,
    Def(DefType),
    RuntimeDetermined(RuntimeDeterminedType),
}

/// Tag selecting the layout algorithm for a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    Primitive,
    Pointer,
    ByRef,
    Def,
    RuntimeDetermined,
}

impl TypeKind {
    #[must_use]
    pub fn category(&self) -> TypeCategory {
        match self {
            TypeKind::Primitive(_) => TypeCategory::Primitive,
            TypeKind::Pointer => TypeCategory::Pointer,
            TypeKind::ByRef => TypeCategory::ByRef,
            TypeKind::Def(_) => TypeCategory::Def,
            TypeKind::RuntimeDetermined(_) => TypeCategory::RuntimeDetermined,
        }
    }
}

/// Memoized layout facts of a concretely laid out type.
#[derive(Debug, Default)]
pub(crate) struct LayoutCache {
    pub(crate) instance: OnceCell<ComputedInstanceFieldLayout>,
    pub(crate) statics: OnceCell<ComputedStaticFieldLayout>,
    pub(crate) contains_gc_pointers: OnceCell<bool>,
    pub(crate) contains_byrefs: OnceCell<bool>,
    pub(crate) shape: OnceCell<ValueTypeShapeCharacteristics>,
    pub(crate) is_unsafe_value_type: OnceCell<bool>,
}

/// A named entry in the type table.
#[derive(Debug)]
pub struct TypeDesc {
    pub name: String,
    pub kind: TypeKind,
    cache: Option<LayoutCache>,
}

impl TypeDesc {
    pub(crate) fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        let cache = match kind {
            TypeKind::RuntimeDetermined(_) => None,
            _ => Some(LayoutCache::default()),
        };
        Self {
            name: name.into(),
            kind,
            cache,
        }
    }

    #[must_use]
    pub fn category(&self) -> TypeCategory {
        self.kind.category()
    }

    #[must_use]
    pub fn as_def(&self) -> Option<&DefType> {
        match &self.kind {
            TypeKind::Def(def) => Some(def),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_runtime_determined(&self) -> Option<&RuntimeDeterminedType> {
        match &self.kind {
            TypeKind::RuntimeDetermined(rd) => Some(rd),
            _ => None,
        }
    }

    /// `None` for runtime-determined types, which never cache layout.
    pub(crate) fn cache(&self) -> Option<&LayoutCache> {
        self.cache.as_ref()
    }

    pub(crate) fn reset_cache(&mut self) {
        if self.cache.is_some() {
            self.cache = Some(LayoutCache::default());
        }
    }

    pub(crate) fn def_mut(&mut self) -> Option<&mut DefType> {
        match &mut self.kind {
            TypeKind::Def(def) => Some(def),
            _ => None,
        }
    }
}

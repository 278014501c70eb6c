use std::collections::HashMap;

use super::primitives::PrimitiveType;
use super::types::{
    DefType, FieldDesc, RuntimeDeterminedType, TypeCategory, TypeDesc, TypeId, TypeKind,
};
use crate::error::{Error, Result};
use crate::target::Target;

const POINTER_NAME: &str = "void*";
const BYREF_NAME: &str = "byref";

/// Loader-owned table of every type that can be laid out.
///
/// Types are added through `&mut self` while loading; layout queries take `&self` and may run
/// from many threads at once.
#[derive(Debug)]
pub struct TypeSystemContext {
    target: Target,
    types: Vec<TypeDesc>,
    by_name: HashMap<String, TypeId>,
}

impl Default for TypeSystemContext {
    fn default() -> Self {
        Self::new(Target::host())
    }
}

impl TypeSystemContext {
    /// Create a table pre-populated with the primitive, pointer and by-ref types.
    #[must_use]
    pub fn new(target: Target) -> Self {
        let mut context = Self {
            target,
            types: Vec::new(),
            by_name: HashMap::new(),
        };
        for primitive in PrimitiveType::ALL {
            context.insert(primitive.name(), TypeKind::Primitive(primitive));
        }
        context.insert(POINTER_NAME, TypeKind::Pointer);
        context.insert(BYREF_NAME, TypeKind::ByRef);
        context
    }

    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }

    fn insert(&mut self, name: &str, kind: TypeKind) -> TypeId {
        let id = TypeId::from_index(self.types.len());
        self.types.push(TypeDesc::new(name, kind));
        self.by_name.insert(name.to_string(), id);
        id
    }

    fn ensure_unique(&self, name: &str) -> Result<()> {
        if self.by_name.contains_key(name) {
            return Err(Error::invalid_layout(name, "type is already defined"));
        }
        Ok(())
    }

    fn ensure_fields_resolve(&self, name: &str, fields: &[FieldDesc]) -> Result<()> {
        for field in fields {
            if self.get(field.ty).is_none() {
                return Err(Error::invalid_layout(
                    name,
                    format!("field `{}` references unknown type {}", field.name, field.ty),
                ));
            }
        }
        Ok(())
    }

    /// Register a nominal type.
    ///
    /// # Errors
    ///
    /// Fails when the name is taken or a field or base refers to a type that does not exist.
    pub fn add_def_type(&mut self, name: &str, def: DefType) -> Result<TypeId> {
        self.ensure_unique(name)?;
        self.ensure_fields_resolve(name, &def.fields)?;
        if let Some(base) = def.base
            && self.get(base).is_none()
        {
            return Err(Error::invalid_layout(
                name,
                format!("base type {base} is not defined"),
            ));
        }
        let id = self.insert(name, TypeKind::Def(def));
        tracing::trace!(target: "layout", stage = "loader.def", type_name = name, id = id.index());
        Ok(id)
    }

    /// Replace the field list of an existing nominal type.
    ///
    /// Allows self-referential and mutually recursive declarations. Every memoized layout in
    /// the table is discarded, since containing types may depend on the old fields.
    ///
    /// # Errors
    ///
    /// Fails when `ty` is not a nominal type or a field refers to an unknown type.
    pub fn define_fields(&mut self, ty: TypeId, fields: Vec<FieldDesc>) -> Result<()> {
        let name = self.name(ty).to_string();
        self.ensure_fields_resolve(&name, &fields)?;
        let def = self.types[ty.index()]
            .def_mut()
            .ok_or_else(|| Error::invalid_layout(&name, "only nominal types declare fields"))?;
        def.fields = fields;
        for desc in &mut self.types {
            desc.reset_cache();
        }
        Ok(())
    }

    /// Register a runtime-determined placeholder over `canonical`.
    ///
    /// # Errors
    ///
    /// Fails when the name is taken or `canonical` is not a nominal type.
    pub fn add_runtime_determined(&mut self, name: &str, canonical: TypeId) -> Result<TypeId> {
        self.ensure_unique(name)?;
        match self.get(canonical).map(TypeDesc::category) {
            Some(TypeCategory::Def) => {}
            Some(_) => {
                return Err(Error::invalid_layout(
                    name,
                    format!(
                        "canonical type `{}` must be a nominal type",
                        self.name(canonical)
                    ),
                ));
            }
            None => {
                return Err(Error::invalid_layout(
                    name,
                    format!("canonical type {canonical} is not defined"),
                ));
            }
        }
        let id = self.insert(
            name,
            TypeKind::RuntimeDetermined(RuntimeDeterminedType::new(canonical)),
        );
        tracing::trace!(
            target: "layout",
            stage = "loader.runtime_determined",
            type_name = name,
            canonical = self.name(canonical)
        );
        Ok(id)
    }

    #[must_use]
    pub fn get(&self, ty: TypeId) -> Option<&TypeDesc> {
        self.types.get(ty.index())
    }

    /// Look up a type entry.
    ///
    /// # Panics
    ///
    /// Panics when `ty` was not issued by this table.
    #[must_use]
    pub fn desc(&self, ty: TypeId) -> &TypeDesc {
        match self.types.get(ty.index()) {
            Some(desc) => desc,
            None => panic!("type handle {ty} does not belong to this type table"),
        }
    }

    #[must_use]
    pub fn name(&self, ty: TypeId) -> &str {
        &self.desc(ty).name
    }

    #[must_use]
    pub fn category(&self, ty: TypeId) -> TypeCategory {
        self.desc(ty).category()
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn primitive(&self, primitive: PrimitiveType) -> TypeId {
        // Primitives are registered first, in `PrimitiveType::ALL` order.
        let index = PrimitiveType::ALL
            .iter()
            .position(|candidate| *candidate == primitive)
            .unwrap_or_default();
        TypeId::from_index(index)
    }

    #[must_use]
    pub fn pointer_type(&self) -> TypeId {
        TypeId::from_index(PrimitiveType::ALL.len())
    }

    #[must_use]
    pub fn byref_type(&self) -> TypeId {
        TypeId::from_index(PrimitiveType::ALL.len() + 1)
    }

    #[must_use]
    pub fn def_type(&self, ty: TypeId) -> Option<&DefType> {
        self.get(ty).and_then(TypeDesc::as_def)
    }

    /// Canonical representative of a runtime-determined type.
    #[must_use]
    pub fn canonical_type_of(&self, ty: TypeId) -> Option<TypeId> {
        self.get(ty)
            .and_then(TypeDesc::as_runtime_determined)
            .map(RuntimeDeterminedType::canonical)
    }

    /// Whether values of `ty` are stored inline; runtime-determined types answer for their
    /// canonical type.
    #[must_use]
    pub fn is_value_type(&self, ty: TypeId) -> bool {
        match &self.desc(ty).kind {
            TypeKind::Def(def) => def.is_value_type(),
            TypeKind::RuntimeDetermined(rd) => self.is_value_type(rd.canonical()),
            TypeKind::Primitive(_) | TypeKind::Pointer | TypeKind::ByRef => true,
        }
    }

    /// Whether `ty` is a stack-only value type.
    #[must_use]
    pub fn is_byref_like(&self, ty: TypeId) -> bool {
        match &self.desc(ty).kind {
            TypeKind::Def(def) => def.is_value_type() && def.is_byref_like,
            TypeKind::RuntimeDetermined(rd) => self.is_byref_like(rd.canonical()),
            TypeKind::ByRef => true,
            TypeKind::Primitive(_) | TypeKind::Pointer => false,
        }
    }

    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

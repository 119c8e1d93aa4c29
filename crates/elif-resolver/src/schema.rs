//! Type descriptors - The schema surface consumed by the resolver
//!
//! The resolver never owns a schema. It only needs to know, for an entity
//! type, which fields it exposes and which of them point at other entity
//! types. Any schema library can provide that through [`TypeDescriptor`];
//! [`ObjectType`] is a plain in-memory implementation.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

/// Stable identifier of an entity type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(Arc<str>);

impl TypeKey {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeKey {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl Borrow<str> for TypeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Shape of a single field of an entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    target: Option<TypeKey>,
    list: bool,
}

impl FieldDescriptor {
    /// A scalar field (no target entity type)
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
            list: false,
        }
    }

    /// A field yielding a single entity of `target`
    pub fn object(name: impl Into<String>, target: impl Into<TypeKey>) -> Self {
        Self {
            name: name.into(),
            target: Some(target.into()),
            list: false,
        }
    }

    /// A field yielding a list of entities of `target`
    pub fn list_of(name: impl Into<String>, target: impl Into<TypeKey>) -> Self {
        Self {
            name: name.into(),
            target: Some(target.into()),
            list: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entity type behind any list/required wrapping, `None` for scalars
    pub fn target_type(&self) -> Option<&TypeKey> {
        self.target.as_ref()
    }

    pub fn is_list_type(&self) -> bool {
        self.list
    }
}

/// Capability the resolver needs from a schema for one entity type
pub trait TypeDescriptor: Send + Sync {
    /// Identifier of the described type
    fn type_key(&self) -> TypeKey;

    /// All fields of the type, in declaration order
    fn fields(&self) -> Vec<FieldDescriptor>;

    /// Look up a single field by name
    fn field(&self, name: &str) -> Option<FieldDescriptor> {
        self.fields().into_iter().find(|field| field.name() == name)
    }
}

/// In-memory type descriptor
#[derive(Debug, Clone)]
pub struct ObjectType {
    key: TypeKey,
    fields: IndexMap<String, FieldDescriptor>,
}

impl ObjectType {
    pub fn new(name: impl Into<TypeKey>) -> Self {
        Self {
            key: name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Add a scalar field
    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.field_descriptor(FieldDescriptor::scalar(name))
    }

    /// Add a single-entity relation field
    pub fn object(self, name: impl Into<String>, target: impl Into<TypeKey>) -> Self {
        self.field_descriptor(FieldDescriptor::object(name, target))
    }

    /// Add a list relation field
    pub fn list_of(self, name: impl Into<String>, target: impl Into<TypeKey>) -> Self {
        self.field_descriptor(FieldDescriptor::list_of(name, target))
    }

    /// Add an arbitrary field descriptor, replacing one with the same name
    pub fn field_descriptor(mut self, field: FieldDescriptor) -> Self {
        self.fields.insert(field.name().to_string(), field);
        self
    }

    /// Finish building and share the descriptor
    pub fn into_descriptor(self) -> Arc<dyn TypeDescriptor> {
        Arc::new(self)
    }
}

impl TypeDescriptor for ObjectType {
    fn type_key(&self) -> TypeKey {
        self.key.clone()
    }

    fn fields(&self) -> Vec<FieldDescriptor> {
        self.fields.values().cloned().collect()
    }

    fn field(&self, name: &str) -> Option<FieldDescriptor> {
        self.fields.get(name).cloned()
    }
}

//! Entities - Shared, mutable records resolved in place
//!
//! An [`Entity`] is a handle: cloning it shares the underlying record. The
//! resolver relies on that to attach one loaded entity to every parent that
//! references it and to keep resolving nested relations on the same record
//! the caller holds.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::{ResolveError, ResolveResult};
use crate::fields::FieldTree;

pub mod id;

pub use id::{ids_of, loosely_matches, EntityId};

/// Value held by one field of an entity
#[derive(Clone)]
pub enum FieldValue {
    /// Plain JSON data (scalars, arrays of scalars)
    Value(Value),
    /// A single related entity
    One(Entity),
    /// A list of related entities
    Many(Vec<Entity>),
}

impl FieldValue {
    /// Convert JSON into a field value. Objects become related entities and
    /// non-empty arrays made only of objects become entity lists.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => FieldValue::One(Entity::from_map(map)),
            Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
                FieldValue::Many(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            Value::Object(map) => Some(Entity::from_map(map)),
                            _ => None,
                        })
                        .collect(),
                )
            }
            other => FieldValue::Value(other),
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Value(value) => write!(f, "{}", value),
            FieldValue::One(_) => f.write_str("<entity>"),
            FieldValue::Many(entities) => write!(f, "<{} entities>", entities.len()),
        }
    }
}

#[derive(Default)]
struct Record {
    fields: IndexMap<String, FieldValue>,
}

/// Shared handle to an entity record
#[derive(Clone, Default)]
pub struct Entity {
    inner: Arc<RwLock<Record>>,
}

impl Entity {
    /// An entity with no fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an entity from a JSON object
    pub fn from_map(map: Map<String, Value>) -> Self {
        let fields = map
            .into_iter()
            .map(|(name, value)| (name, FieldValue::from_json(value)))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(Record { fields })),
        }
    }

    /// Build an entity from a JSON value, which must be an object
    pub fn from_json(value: Value) -> ResolveResult<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(ResolveError::InvalidEntity {
                found: json_kind(&other).to_string(),
            }),
        }
    }

    /// Whether both handles point at the same record
    pub fn ptr_eq(&self, other: &Entity) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    /// Plain JSON value of a field; `None` for missing and relation fields
    pub fn value(&self, name: &str) -> Option<Value> {
        match self.inner.read().fields.get(name) {
            Some(FieldValue::Value(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Normalized identifier read from `id_field`
    pub fn id(&self, id_field: &str) -> Option<EntityId> {
        self.value(id_field).as_ref().and_then(EntityId::from_value)
    }

    pub fn field(&self, name: &str) -> Option<FieldValue> {
        self.inner.read().fields.get(name).cloned()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.inner.read().fields.contains_key(name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.inner.read().fields.keys().cloned().collect()
    }

    /// Entities reachable through a relation field, flattening lists
    pub fn related(&self, name: &str) -> Vec<Entity> {
        match self.inner.read().fields.get(name) {
            Some(FieldValue::One(entity)) => vec![entity.clone()],
            Some(FieldValue::Many(entities)) => entities.clone(),
            _ => Vec::new(),
        }
    }

    pub fn related_one(&self, name: &str) -> Option<Entity> {
        match self.inner.read().fields.get(name) {
            Some(FieldValue::One(entity)) => Some(entity.clone()),
            _ => None,
        }
    }

    pub fn related_many(&self, name: &str) -> Option<Vec<Entity>> {
        match self.inner.read().fields.get(name) {
            Some(FieldValue::Many(entities)) => Some(entities.clone()),
            _ => None,
        }
    }

    pub fn set_value(&self, name: impl Into<String>, value: Value) {
        self.set_field(name, FieldValue::Value(value));
    }

    pub fn set_related_one(&self, name: impl Into<String>, entity: Entity) {
        self.set_field(name, FieldValue::One(entity));
    }

    pub fn set_related_many(&self, name: impl Into<String>, entities: Vec<Entity>) {
        self.set_field(name, FieldValue::Many(entities));
    }

    pub fn set_field(&self, name: impl Into<String>, value: FieldValue) {
        self.inner.write().fields.insert(name.into(), value);
    }

    /// Shallow-merge JSON fields, overwriting existing ones
    pub fn merge_values(&self, values: Map<String, Value>) {
        let converted: Vec<(String, FieldValue)> = values
            .into_iter()
            .map(|(name, value)| (name, FieldValue::from_json(value)))
            .collect();
        self.inner.write().fields.extend(converted);
    }

    /// Shallow-merge every field of `other` into this record
    pub fn merge_from(&self, other: &Entity) {
        if self.ptr_eq(other) {
            return;
        }
        let incoming: Vec<(String, FieldValue)> = other
            .inner
            .read()
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        self.inner.write().fields.extend(incoming);
    }

    /// Materialize the entity as JSON. Plain fields are always included;
    /// relation fields only when requested by `tree`, which also bounds the
    /// walk on cyclic entity graphs.
    pub fn snapshot(&self, tree: &FieldTree) -> Value {
        let fields: Vec<(String, FieldValue)> = self
            .inner
            .read()
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let mut object = Map::new();
        for (name, value) in fields {
            match value {
                FieldValue::Value(value) => {
                    object.insert(name, value);
                }
                FieldValue::One(entity) => {
                    if let Some(subtree) = tree.get(&name) {
                        object.insert(name, entity.snapshot(subtree));
                    }
                }
                FieldValue::Many(entities) => {
                    if let Some(subtree) = tree.get(&name) {
                        let items = entities.iter().map(|entity| entity.snapshot(subtree)).collect();
                        object.insert(name, Value::Array(items));
                    }
                }
            }
        }
        Value::Object(object)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.inner.read();
        let mut map = f.debug_map();
        for (name, value) in &record.fields {
            map.entry(name, value);
        }
        map.finish()
    }
}

impl TryFrom<Value> for Entity {
    type Error = ResolveError;

    fn try_from(value: Value) -> ResolveResult<Self> {
        Entity::from_json(value)
    }
}

/// Drop repeated handles to the same record, keeping first-seen order
pub(crate) fn unique_handles(entities: impl IntoIterator<Item = Entity>) -> Vec<Entity> {
    let mut seen = HashSet::new();
    entities
        .into_iter()
        .filter(|entity| seen.insert(entity.addr()))
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Root instances handed to and returned from a load
#[derive(Debug, Clone)]
pub enum Source {
    One(Entity),
    Many(Vec<Entity>),
}

impl Source {
    /// The instances as a flat list
    pub fn entities(&self) -> Vec<Entity> {
        match self {
            Source::One(entity) => vec![entity.clone()],
            Source::Many(entities) => entities.clone(),
        }
    }

    /// An empty list is the only source with nothing to resolve
    pub fn is_empty(&self) -> bool {
        matches!(self, Source::Many(entities) if entities.is_empty())
    }

    pub fn into_one(self) -> Option<Entity> {
        match self {
            Source::One(entity) => Some(entity),
            Source::Many(_) => None,
        }
    }

    pub fn into_many(self) -> Vec<Entity> {
        match self {
            Source::One(entity) => vec![entity],
            Source::Many(entities) => entities,
        }
    }
}

impl From<Entity> for Source {
    fn from(entity: Entity) -> Self {
        Source::One(entity)
    }
}

impl From<Vec<Entity>> for Source {
    fn from(entities: Vec<Entity>) -> Self {
        Source::Many(entities)
    }
}

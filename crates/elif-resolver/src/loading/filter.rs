//! Loader filter arguments derived from parent instances

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;

use crate::entity::{Entity, EntityId};
use crate::relationships::FilterSpec;

/// Arguments handed to a loader: filter key -> deduplicated values.
///
/// Keys keep the order of the relation's filter specification. A key with no
/// values is still present so loaders see every argument they declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterArgs {
    args: IndexMap<String, ArgValues>,
}

/// Values of one filter key with the identifiers already present
#[derive(Debug, Clone, Default, PartialEq)]
struct ArgValues {
    values: Vec<Value>,
    seen: HashSet<EntityId>,
}

impl ArgValues {
    fn push(&mut self, value: Value) -> bool {
        if value.is_null() {
            return false;
        }
        let fresh = match EntityId::from_value(&value) {
            Some(id) => self.seen.insert(id),
            None => !self.values.contains(&value),
        };
        if fresh {
            self.values.push(value);
        }
        fresh
    }
}

impl FilterArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect arguments for `filter` from the values held by `sources`.
    ///
    /// Array values are flattened, nulls dropped and duplicates removed under
    /// identifier normalization. For the identifier key, ids listed in
    /// `known` are left out since those entities are already loaded.
    pub fn collect(sources: &[Entity], filter: &FilterSpec, id_field: &str, known: &HashSet<EntityId>) -> Self {
        let mut args = FilterArgs::new();
        for (filter_key, source_field) in filter.iter() {
            let skip_known = filter_key == id_field;
            let slot = args.args.entry(filter_key.to_string()).or_default();

            for source in sources {
                let Some(value) = source.value(source_field) else {
                    continue;
                };
                let values = match value {
                    Value::Array(items) => items,
                    other => vec![other],
                };
                for value in values {
                    if skip_known && EntityId::from_value(&value).map_or(false, |id| known.contains(&id)) {
                        continue;
                    }
                    slot.push(value);
                }
            }
        }
        args
    }

    /// Add a value under `key`. Nulls and loosely equal duplicates are
    /// ignored; returns whether the value was added.
    pub fn push(&mut self, key: impl Into<String>, value: Value) -> bool {
        self.args.entry(key.into()).or_default().push(value)
    }

    pub fn ensure_key(&mut self, key: impl Into<String>) {
        self.args.entry(key.into()).or_default();
    }

    /// Values under `key`; empty when the key is absent
    pub fn values(&self, key: &str) -> &[Value] {
        self.args.get(key).map(|slot| slot.values.as_slice()).unwrap_or(&[])
    }

    /// Identifiers of the values under `key`
    pub fn ids(&self, key: &str) -> Vec<EntityId> {
        self.values(key).iter().filter_map(EntityId::from_value).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.args.iter().map(|(key, slot)| (key.as_str(), slot.values.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.args.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// True when every key has an empty value list
    pub fn is_empty(&self) -> bool {
        self.args.values().all(|slot| slot.values.is_empty())
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.args
                .iter()
                .map(|(key, slot)| (key.clone(), Value::Array(slot.values.clone())))
                .collect(),
        )
    }
}

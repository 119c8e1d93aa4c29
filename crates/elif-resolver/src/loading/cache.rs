//! Resolution cache - Per-load view of every participating type

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::memo::CallMemo;
use crate::entity::{Entity, EntityId};
use crate::fields::FieldTree;
use crate::relationships::InitializerOutput;
use crate::schema::TypeKey;

/// Cached state of one entity type. Grows monotonically during a load.
pub struct CacheEntry<'a> {
    fields: FieldTree,
    entities: IndexMap<EntityId, Entity>,
    loads: Arc<CallMemo<'a, Vec<Entity>>>,
    initializations: Arc<CallMemo<'a, InitializerOutput>>,
}

impl<'a> CacheEntry<'a> {
    fn new() -> Self {
        Self {
            fields: FieldTree::new(),
            entities: IndexMap::new(),
            loads: Arc::new(CallMemo::new()),
            initializations: Arc::new(CallMemo::new()),
        }
    }

    /// Merged field selection across every path reaching the type
    pub fn fields(&self) -> &FieldTree {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Transient store owned by a single top-level load: merged fields, known
/// and loaded entities, and memoized calls for every type touched.
pub struct ResolutionCache<'a> {
    id_field: String,
    entries: Mutex<HashMap<TypeKey, CacheEntry<'a>>>,
}

impl<'a> ResolutionCache<'a> {
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Merge a field selection into the type's entry
    pub fn merge_fields(&self, type_key: &TypeKey, fields: &FieldTree) {
        let mut entries = self.entries.lock();
        entries
            .entry(type_key.clone())
            .or_insert_with(CacheEntry::new)
            .fields
            .merge(fields);
    }

    /// Register already-known instances. The first handle seen for an
    /// identifier is kept; instances without an identifier are not indexed.
    pub fn insert_known(&self, type_key: &TypeKey, entities: &[Entity]) -> usize {
        let mut entries = self.entries.lock();
        let entry = entries.entry(type_key.clone()).or_insert_with(CacheEntry::new);
        let mut added = 0;
        for entity in entities {
            if let Some(id) = entity.id(&self.id_field) {
                if !entry.entities.contains_key(&id) {
                    entry.entities.insert(id, entity.clone());
                    added += 1;
                }
            }
        }
        added
    }

    /// Absorb loader results. An entity whose identifier is already cached is
    /// merged into the cached handle so existing references see the new
    /// fields. Returns how many identifiers were new.
    pub fn absorb(&self, type_key: &TypeKey, loaded: &[Entity]) -> usize {
        let mut merges = Vec::new();
        let mut added = 0;
        {
            let mut entries = self.entries.lock();
            let entry = entries.entry(type_key.clone()).or_insert_with(CacheEntry::new);
            for entity in loaded {
                let Some(id) = entity.id(&self.id_field) else {
                    tracing::warn!(type_key = %type_key, "Loaded entity has no identifier, ignoring it");
                    continue;
                };
                match entry.entities.get(&id) {
                    Some(existing) => merges.push((existing.clone(), entity.clone())),
                    None => {
                        entry.entities.insert(id, entity.clone());
                        added += 1;
                    }
                }
            }
        }
        for (existing, incoming) in merges {
            existing.merge_from(&incoming);
        }
        added
    }

    /// Every cached entity of the type, in insertion order
    pub fn entities(&self, type_key: &TypeKey) -> Vec<Entity> {
        self.entries
            .lock()
            .get(type_key)
            .map(|entry| entry.entities.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, type_key: &TypeKey, id: &EntityId) -> Option<Entity> {
        self.entries
            .lock()
            .get(type_key)
            .and_then(|entry| entry.entities.get(id).cloned())
    }

    pub fn known_ids(&self, type_key: &TypeKey) -> HashSet<EntityId> {
        self.entries
            .lock()
            .get(type_key)
            .map(|entry| entry.entities.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Merged field selection of the type; empty when the type is not cached
    pub fn fields(&self, type_key: &TypeKey) -> FieldTree {
        self.entries
            .lock()
            .get(type_key)
            .map(|entry| entry.fields.clone())
            .unwrap_or_default()
    }

    pub fn loads(&self, type_key: &TypeKey) -> Arc<CallMemo<'a, Vec<Entity>>> {
        let mut entries = self.entries.lock();
        entries
            .entry(type_key.clone())
            .or_insert_with(CacheEntry::new)
            .loads
            .clone()
    }

    pub fn initializations(&self, type_key: &TypeKey) -> Arc<CallMemo<'a, InitializerOutput>> {
        let mut entries = self.entries.lock();
        entries
            .entry(type_key.clone())
            .or_insert_with(CacheEntry::new)
            .initializations
            .clone()
    }

    pub fn contains(&self, type_key: &TypeKey) -> bool {
        self.entries.lock().contains_key(type_key)
    }

    /// Cached types, sorted
    pub fn types(&self) -> Vec<TypeKey> {
        let mut types: Vec<TypeKey> = self.entries.lock().keys().cloned().collect();
        types.sort();
        types
    }

    pub fn entity_count(&self, type_key: &TypeKey) -> usize {
        self.entries.lock().get(type_key).map_or(0, CacheEntry::len)
    }
}

//! Dependency Registry - One node per entity type, shared by every load

use std::sync::Arc;

use dashmap::DashMap;

use super::node::DependencyNode;
use crate::error::{ResolveError, ResolveResult};
use crate::schema::{FieldDescriptor, TypeDescriptor, TypeKey};

/// Thread-safe table of dependency nodes keyed by entity type.
///
/// Built once during setup and then shared (usually behind an `Arc`) by every
/// resolver. Registration is idempotent: asking twice for the same type
/// yields the same node instance.
pub struct DependencyRegistry<C> {
    nodes: DashMap<TypeKey, Arc<DependencyNode<C>>>,
}

impl<C> Default for DependencyRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> DependencyRegistry<C> {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self { nodes: DashMap::new() }
    }

    /// Return the node of the described type, creating it on first access
    pub fn get_or_create(&self, descriptor: Arc<dyn TypeDescriptor>) -> Arc<DependencyNode<C>> {
        let key = descriptor.type_key();
        if let Some(existing) = self.nodes.get(&key) {
            return existing.value().clone();
        }
        self.nodes
            .entry(key)
            .or_insert_with(|| Arc::new(DependencyNode::new(descriptor)))
            .value()
            .clone()
    }

    pub fn get(&self, key: &TypeKey) -> Option<Arc<DependencyNode<C>>> {
        self.nodes.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Registered type keys, sorted
    pub fn type_keys(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self.nodes.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Resolve a field of `node` to its descriptor and the registered node
    /// of its target type. Scalar fields and unregistered targets yield `None`.
    pub fn relation_target(
        &self,
        node: &DependencyNode<C>,
        field: &str,
    ) -> Option<(FieldDescriptor, Arc<DependencyNode<C>>)> {
        let descriptor = node.descriptor().field(field)?;
        let child = self.get(descriptor.target_type()?)?;
        Some((descriptor, child))
    }

    /// Validate every registered relation: required child types must be
    /// registered and every descriptor provider must produce a valid
    /// descriptor whose destination field exists on the parent type.
    pub fn validate(&self) -> ResolveResult<()> {
        for key in self.type_keys() {
            let node = self.get(&key).ok_or_else(|| ResolveError::UnknownType(key.clone()))?;
            for child in node.required_types() {
                if !self.contains(&child) {
                    return Err(ResolveError::configuration(format!(
                        "'{}' requires '{}', which is not registered",
                        key, child
                    )));
                }
                for relation in node.relations_to(&child).map_err(|e| {
                    ResolveError::configuration(format!(
                        "Validation failed for relation '{}' -> '{}': {}",
                        key, child, e
                    ))
                })? {
                    if node.descriptor().field(relation.destination()).is_none() {
                        return Err(ResolveError::configuration(format!(
                            "'{}' has no field '{}' to hold its '{}' relation",
                            key,
                            relation.destination(),
                            child
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Get statistics about the registry
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for entry in self.nodes.iter() {
            let node = entry.value();
            stats.total_types += 1;
            if node.has_loader() {
                stats.types_with_loader += 1;
            }
            if node.has_initializer() {
                stats.types_with_initializer += 1;
            }
            stats.total_relations += node
                .required_types()
                .iter()
                .map(|child| node.providers_for(child).len())
                .sum::<usize>();
        }
        stats
    }
}

/// Statistics about the dependency registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_types: usize,
    pub types_with_loader: usize,
    pub types_with_initializer: usize,
    pub total_relations: usize,
}

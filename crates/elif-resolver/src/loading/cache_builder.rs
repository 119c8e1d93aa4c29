//! Cache builder - Pre-scan of the request before any fetch

use crate::entity::{unique_handles, Entity};
use crate::fields::FieldTree;
use crate::relationships::{DependencyNode, DependencyRegistry};

use super::cache::ResolutionCache;

/// Walks the field tree together with the data already at hand and records,
/// for every reachable type, the merged field selection and known entities.
///
/// Recursion follows the field tree, not the type graph, so cyclic type
/// relations terminate with the request.
pub struct CacheBuilder<'r, 'a, C> {
    registry: &'r DependencyRegistry<C>,
    cache: &'r ResolutionCache<'a>,
}

impl<'r, 'a, C> CacheBuilder<'r, 'a, C> {
    pub fn new(registry: &'r DependencyRegistry<C>, cache: &'r ResolutionCache<'a>) -> Self {
        Self { registry, cache }
    }

    pub fn build(&self, node: &DependencyNode<C>, fields: &FieldTree, entities: &[Entity]) {
        let mut fields = fields.clone();
        fields.ensure_field(self.cache.id_field());

        let key = node.type_key();
        self.cache.merge_fields(key, &fields);
        if !entities.is_empty() {
            self.cache.insert_known(key, entities);
        }

        for (name, subtree) in fields.iter() {
            let Some((_, child)) = self.registry.relation_target(node, name) else {
                continue;
            };
            let children = unique_handles(entities.iter().flat_map(|entity| entity.related(name)));
            tracing::trace!(
                type_key = %key,
                field = name,
                child = %child.type_key(),
                known = children.len(),
                "Pre-scanning relation"
            );
            self.build(&child, subtree, &children);
        }
    }
}

//! Incremental loader - Level-by-level execution of a resolution request

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture, FutureExt};
use tracing::{debug, trace};

use super::cache::ResolutionCache;
use super::cache_builder::CacheBuilder;
use super::filter::FilterArgs;
use super::mapper::map_relation;
use super::signature::CallSignature;
use crate::config::ResolverConfig;
use crate::entity::{unique_handles, Entity, EntityId};
use crate::error::{ResolveError, ResolveResult};
use crate::fields::FieldTree;
use crate::relationships::{
    DependencyNode, DependencyRegistry, InitializerOutput, InitializerSlot, Loader, RelationDescriptor,
};
use crate::resolver::ResolveStats;

#[derive(Default)]
struct Counters {
    loader_calls: AtomicUsize,
    initializer_calls: AtomicUsize,
    memo_hits: AtomicUsize,
    skipped_fetches: AtomicUsize,
    entities_loaded: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize, by: usize) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// A requested relation field of one level
struct Edge<'f, C> {
    field: &'f str,
    subtree: &'f FieldTree,
    child: Arc<DependencyNode<C>>,
    relations: Vec<RelationDescriptor>,
}

/// Executes one top-level load against a fresh [`ResolutionCache`]
pub struct IncrementalLoader<'a, C> {
    registry: &'a DependencyRegistry<C>,
    config: &'a ResolverConfig,
    ctx: &'a C,
    cache: ResolutionCache<'a>,
    counters: Counters,
}

impl<'a, C> IncrementalLoader<'a, C>
where
    C: Send + Sync + 'static,
{
    pub fn new(registry: &'a DependencyRegistry<C>, config: &'a ResolverConfig, ctx: &'a C) -> Self {
        Self {
            registry,
            config,
            ctx,
            cache: ResolutionCache::new(config.get_id_field().clone()),
            counters: Counters::default(),
        }
    }

    pub fn cache(&self) -> &ResolutionCache<'a> {
        &self.cache
    }

    pub fn stats(&self) -> ResolveStats {
        ResolveStats {
            loader_calls: self.counters.loader_calls.load(Ordering::Relaxed),
            initializer_calls: self.counters.initializer_calls.load(Ordering::Relaxed),
            memo_hits: self.counters.memo_hits.load(Ordering::Relaxed),
            skipped_fetches: self.counters.skipped_fetches.load(Ordering::Relaxed),
            entities_loaded: self.counters.entities_loaded.load(Ordering::Relaxed),
        }
    }

    /// Pre-scan the request into the cache without fetching anything
    pub fn prepare(&self, node: &DependencyNode<C>, fields: &FieldTree, entities: &[Entity]) {
        CacheBuilder::new(self.registry, &self.cache).build(node, fields, entities);
    }

    /// Resolve `fields` on `entities` of `node`'s type, then descend into
    /// every requested relation.
    pub fn execute<'s>(
        &'s self,
        node: Arc<DependencyNode<C>>,
        fields: &'s FieldTree,
        entities: Vec<Entity>,
    ) -> BoxFuture<'s, ResolveResult<()>> {
        async move {
            if entities.is_empty() {
                return Ok(());
            }

            let edges = self.edges(&node, fields)?;
            let mut level: Vec<BoxFuture<'_, ResolveResult<()>>> = Vec::new();

            if let Some(slot) = node.initializer() {
                let blocking = slot.blocks(
                    edges
                        .iter()
                        .flat_map(|edge| edge.relations.iter())
                        .flat_map(|relation| relation.filter_spec().source_fields()),
                );
                if blocking {
                    debug!(type_key = %node.type_key(), "Running blocking initializer");
                    self.initialize(&node, &slot, &entities).await?;
                } else {
                    debug!(type_key = %node.type_key(), "Running initializer alongside relation loads");
                    let node = node.clone();
                    let entities = entities.clone();
                    level.push(async move { self.initialize(&node, &slot, &entities).await }.boxed());
                }
            }

            for edge in &edges {
                for relation in &edge.relations {
                    level.push(self.fetch(&edge.child, &entities, relation).boxed());
                }
            }
            try_join_all(level).await?;

            let descents = edges.iter().filter_map(|edge| {
                let children = unique_handles(entities.iter().flat_map(|entity| entity.related(edge.field)));
                if children.is_empty() {
                    return None;
                }
                Some(self.execute(edge.child.clone(), edge.subtree, children))
            });
            try_join_all(descents).await?;
            Ok(())
        }
        .boxed()
    }

    /// Requested fields of this level that target a registered type, with
    /// the relations registered toward them
    fn edges<'f>(&self, node: &DependencyNode<C>, fields: &'f FieldTree) -> ResolveResult<Vec<Edge<'f, C>>> {
        let mut edges = Vec::new();
        for (field, subtree) in fields.iter() {
            let Some((_, child)) = self.registry.relation_target(node, field) else {
                continue;
            };
            let relations = node.relations_for_field(child.type_key(), field)?;
            if relations.is_empty() {
                trace!(type_key = %node.type_key(), field, "Field has no registered relation, descending only");
            }
            edges.push(Edge {
                field,
                subtree,
                child,
                relations,
            });
        }
        Ok(edges)
    }

    /// Fetch whatever `relation` still misses for `sources`, then map
    async fn fetch(
        &self,
        child: &DependencyNode<C>,
        sources: &[Entity],
        relation: &RelationDescriptor,
    ) -> ResolveResult<()> {
        let known = self.cache.known_ids(child.type_key());
        let args = FilterArgs::collect(sources, relation.filter_spec(), self.config.get_id_field(), &known);
        self.fetch_with_args(child, sources, relation, args).await
    }

    pub(crate) async fn fetch_with_args(
        &self,
        child: &DependencyNode<C>,
        sources: &[Entity],
        relation: &RelationDescriptor,
        args: FilterArgs,
    ) -> ResolveResult<()> {
        let key = child.type_key();
        if sources.is_empty() && !args.is_empty() {
            return Err(ResolveError::ContractViolation {
                type_key: key.clone(),
                relation: relation.destination().to_string(),
            });
        }

        if args.is_empty() {
            Counters::bump(&self.counters.skipped_fetches, 1);
            trace!(type_key = %key, field = relation.destination(), "Nothing missing, mapping cached entities");
        } else if let Some(loader) = child.loader() {
            self.dispatch(child, loader, args).await?;
        } else {
            Counters::bump(&self.counters.skipped_fetches, 1);
            debug!(type_key = %key, field = relation.destination(), "No loader registered, mapping known entities only");
        }

        let candidates = self.cache.entities(key);
        let mapped = map_relation(&candidates, sources, relation);
        trace!(type_key = %key, field = relation.destination(), mapped, "Mapped relation");
        Ok(())
    }

    async fn dispatch(
        &self,
        child: &DependencyNode<C>,
        loader: Arc<dyn Loader<C>>,
        args: FilterArgs,
    ) -> ResolveResult<()> {
        let key = child.type_key();
        let fields = self.cache.fields(key);

        let loaded = if *self.config.get_memoize_calls() {
            let signature = CallSignature::loader(key, &args, &fields);
            let memo = self.cache.loads(key);
            let outcome = memo
                .run(signature.clone(), *self.config.get_share_pending_calls(), || {
                    debug!(type_key = %key, signature = %signature, args = %args.to_json(), "Dispatching loader");
                    Counters::bump(&self.counters.loader_calls, 1);
                    Self::call_loader(self.ctx, loader, args, fields)
                })
                .await;
            if outcome.hit {
                Counters::bump(&self.counters.memo_hits, 1);
                trace!(type_key = %key, signature = %signature, "Reusing memoized loader call");
            }
            outcome.result?
        } else {
            debug!(type_key = %key, args = %args.to_json(), "Dispatching loader");
            Counters::bump(&self.counters.loader_calls, 1);
            Self::call_loader(self.ctx, loader, args, fields).await?
        };

        let added = self.cache.absorb(key, &loaded);
        Counters::bump(&self.counters.entities_loaded, added);
        Ok(())
    }

    fn call_loader(
        ctx: &'a C,
        loader: Arc<dyn Loader<C>>,
        args: FilterArgs,
        fields: FieldTree,
    ) -> BoxFuture<'a, ResolveResult<Vec<Entity>>> {
        async move { loader.load(ctx, &args, &fields).await }.boxed()
    }

    /// Run the initializer over `entities` and merge its output by identifier
    async fn initialize(
        &self,
        node: &DependencyNode<C>,
        slot: &InitializerSlot<C>,
        entities: &[Entity],
    ) -> ResolveResult<()> {
        let key = node.type_key();
        let id_field = self.config.get_id_field().as_str();
        let fields = self.cache.fields(key);

        let output = if *self.config.get_memoize_calls() {
            let ids: Vec<EntityId> = entities.iter().filter_map(|entity| entity.id(id_field)).collect();
            let signature = CallSignature::initializer(key, &ids, &fields);
            let memo = self.cache.initializations(key);
            let outcome = memo
                .run(signature, *self.config.get_share_pending_calls(), || {
                    Counters::bump(&self.counters.initializer_calls, 1);
                    Self::call_initializer(self.ctx, slot, entities.to_vec(), fields)
                })
                .await;
            if outcome.hit {
                Counters::bump(&self.counters.memo_hits, 1);
            }
            outcome.result?
        } else {
            Counters::bump(&self.counters.initializer_calls, 1);
            Self::call_initializer(self.ctx, slot, entities.to_vec(), fields).await?
        };

        for entity in entities {
            match entity.id(id_field) {
                Some(id) => {
                    if let Some(extra) = output.get(&id) {
                        entity.merge_values(extra.clone());
                    }
                }
                None => debug!(type_key = %key, "Entity has no identifier, initializer output not applied"),
            }
        }
        Ok(())
    }

    fn call_initializer(
        ctx: &'a C,
        slot: &InitializerSlot<C>,
        entities: Vec<Entity>,
        fields: FieldTree,
    ) -> BoxFuture<'a, ResolveResult<InitializerOutput>> {
        let initializer = slot.initializer.clone();
        async move { initializer.initialize(ctx, &entities, &fields).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::loader_fn;
    use crate::schema::{ObjectType, TypeKey};
    use serde_json::json;

    fn registry() -> DependencyRegistry<()> {
        let registry = DependencyRegistry::new();
        let company = registry.get_or_create(
            ObjectType::new("Company")
                .scalar("id")
                .scalar("ownerId")
                .object("owner", "User")
                .into_descriptor(),
        );
        let user = registry.get_or_create(ObjectType::new("User").scalar("id").scalar("name").into_descriptor());
        user.define_loader(loader_fn(|_: (), args: FilterArgs, _fields| async move {
            args.values("id")
                .iter()
                .map(|id| Entity::from_json(json!({ "id": id, "name": format!("user-{}", id) })))
                .collect::<ResolveResult<Vec<_>>>()
        }));
        company.require(&user, [RelationDescriptor::one("owner").filter("id", "ownerId")]);
        registry
    }

    #[tokio::test]
    async fn test_non_empty_filter_without_source_is_a_contract_violation() {
        let registry = registry();
        let config = ResolverConfig::default();
        let loader = IncrementalLoader::new(&registry, &config, &());
        let user = registry.get(&TypeKey::new("User")).unwrap();
        let relation = RelationDescriptor::one("owner").filter("id", "ownerId");

        let mut args = FilterArgs::new();
        args.push("id", json!(7));
        let err = loader.fetch_with_args(&user, &[], &relation, args).await.unwrap_err();
        assert!(matches!(err, ResolveError::ContractViolation { ref relation, .. } if relation == "owner"));
    }

    #[tokio::test]
    async fn test_empty_filter_maps_cached_entities_only() {
        let registry = registry();
        let config = ResolverConfig::default();
        let loader = IncrementalLoader::new(&registry, &config, &());
        let user = registry.get(&TypeKey::new("User")).unwrap();
        let known = Entity::from_json(json!({ "id": 7, "name": "cached" })).unwrap();
        loader.cache().insert_known(user.type_key(), &[known.clone()]);

        let company = Entity::from_json(json!({ "id": 1, "ownerId": 7 })).unwrap();
        let relation = RelationDescriptor::one("owner").filter("id", "ownerId");
        loader.fetch(&user, &[company.clone()], &relation).await.unwrap();

        assert!(company.related_one("owner").unwrap().ptr_eq(&known));
        let stats = loader.stats();
        assert_eq!(stats.loader_calls, 0);
        assert_eq!(stats.skipped_fetches, 1);
    }

    #[tokio::test]
    async fn test_execute_loads_and_maps_one_level() {
        let registry = registry();
        let config = ResolverConfig::default();
        let loader = IncrementalLoader::new(&registry, &config, &());
        let company = registry.get(&TypeKey::new("Company")).unwrap();
        let root = Entity::from_json(json!({ "id": 1, "ownerId": 7 })).unwrap();
        let tree = FieldTree::new()
            .with_field("id")
            .with("owner", FieldTree::new().with_field("name"));

        loader.prepare(&company, &tree, &[root.clone()]);
        loader.execute(company, &tree, vec![root.clone()]).await.unwrap();

        let owner = root.related_one("owner").unwrap();
        assert_eq!(owner.value("name"), Some(json!("user-7")));
        assert_eq!(loader.stats().loader_calls, 1);
        assert_eq!(loader.stats().entities_loaded, 1);
    }
}

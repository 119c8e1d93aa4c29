//! Dependency nodes - Per-type loader, initializer and required relations

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::descriptor::{DescriptorProvider, RelationDescriptor};
use crate::entity::{Entity, EntityId};
use crate::error::ResolveResult;
use crate::fields::FieldTree;
use crate::loading::FilterArgs;
use crate::schema::{TypeDescriptor, TypeKey};

/// Extra fields produced by an initializer, keyed by entity identifier
pub type InitializerOutput = HashMap<EntityId, Map<String, Value>>;

/// Bulk fetch function for one entity type
#[async_trait]
pub trait Loader<C>: Send + Sync {
    /// Load every entity matching `args`, selecting at least `fields`
    async fn load(&self, ctx: &C, args: &FilterArgs, fields: &FieldTree) -> ResolveResult<Vec<Entity>>;
}

/// Augments already-known instances of a type with extra fields
#[async_trait]
pub trait Initializer<C>: Send + Sync {
    async fn initialize(
        &self,
        ctx: &C,
        entities: &[Entity],
        fields: &FieldTree,
    ) -> ResolveResult<InitializerOutput>;
}

/// Closure-backed [`Loader`], see [`loader_fn`]
pub struct LoaderFn<F>(F);

/// Build a loader from a closure receiving owned copies of its inputs
pub fn loader_fn<C, F, Fut>(f: F) -> LoaderFn<F>
where
    F: Fn(C, FilterArgs, FieldTree) -> Fut + Send + Sync,
    Fut: Future<Output = ResolveResult<Vec<Entity>>> + Send + 'static,
{
    LoaderFn(f)
}

#[async_trait]
impl<C, F, Fut> Loader<C> for LoaderFn<F>
where
    C: Clone + Send + Sync + 'static,
    F: Fn(C, FilterArgs, FieldTree) -> Fut + Send + Sync,
    Fut: Future<Output = ResolveResult<Vec<Entity>>> + Send + 'static,
{
    async fn load(&self, ctx: &C, args: &FilterArgs, fields: &FieldTree) -> ResolveResult<Vec<Entity>> {
        (self.0)(ctx.clone(), args.clone(), fields.clone()).await
    }
}

/// Closure-backed [`Initializer`], see [`initializer_fn`]
pub struct InitializerFn<F>(F);

/// Build an initializer from a closure receiving owned copies of its inputs
pub fn initializer_fn<C, F, Fut>(f: F) -> InitializerFn<F>
where
    F: Fn(C, Vec<Entity>, FieldTree) -> Fut + Send + Sync,
    Fut: Future<Output = ResolveResult<InitializerOutput>> + Send + 'static,
{
    InitializerFn(f)
}

#[async_trait]
impl<C, F, Fut> Initializer<C> for InitializerFn<F>
where
    C: Clone + Send + Sync + 'static,
    F: Fn(C, Vec<Entity>, FieldTree) -> Fut + Send + Sync,
    Fut: Future<Output = ResolveResult<InitializerOutput>> + Send + 'static,
{
    async fn initialize(
        &self,
        ctx: &C,
        entities: &[Entity],
        fields: &FieldTree,
    ) -> ResolveResult<InitializerOutput> {
        (self.0)(ctx.clone(), entities.to_vec(), fields.clone()).await
    }
}

/// Registered initializer together with its trigger fields
pub struct InitializerSlot<C> {
    pub initializer: Arc<dyn Initializer<C>>,
    pub trigger_fields: BTreeSet<String>,
}

impl<C> Clone for InitializerSlot<C> {
    fn clone(&self) -> Self {
        Self {
            initializer: self.initializer.clone(),
            trigger_fields: self.trigger_fields.clone(),
        }
    }
}

impl<C> InitializerSlot<C> {
    /// Whether the initializer has to finish before relations filtered on
    /// `source_fields` may be fetched
    pub fn blocks<'f>(&self, mut source_fields: impl Iterator<Item = &'f str>) -> bool {
        self.trigger_fields.is_empty() || source_fields.any(|field| self.trigger_fields.contains(field))
    }
}

struct NodeConfig<C> {
    loader: Option<Arc<dyn Loader<C>>>,
    initializer: Option<InitializerSlot<C>>,
    requires: IndexMap<TypeKey, Vec<DescriptorProvider>>,
}

/// Configuration of one entity type. Exactly one node exists per type in a
/// [`DependencyRegistry`](super::DependencyRegistry).
pub struct DependencyNode<C> {
    key: TypeKey,
    descriptor: Arc<dyn TypeDescriptor>,
    config: RwLock<NodeConfig<C>>,
}

impl<C> DependencyNode<C> {
    pub(crate) fn new(descriptor: Arc<dyn TypeDescriptor>) -> Self {
        Self {
            key: descriptor.type_key(),
            descriptor,
            config: RwLock::new(NodeConfig {
                loader: None,
                initializer: None,
                requires: IndexMap::new(),
            }),
        }
    }

    pub fn type_key(&self) -> &TypeKey {
        &self.key
    }

    pub fn descriptor(&self) -> &Arc<dyn TypeDescriptor> {
        &self.descriptor
    }

    /// Set or replace the loader of this type
    pub fn define_loader<L>(&self, loader: L) -> &Self
    where
        L: Loader<C> + 'static,
    {
        self.config.write().loader = Some(Arc::new(loader));
        self
    }

    /// Set or replace the initializer and its trigger fields. Without trigger
    /// fields the initializer blocks every relation load of this type.
    pub fn define_initializer<I, T>(&self, initializer: I, trigger_fields: T) -> &Self
    where
        I: Initializer<C> + 'static,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        self.config.write().initializer = Some(InitializerSlot {
            initializer: Arc::new(initializer),
            trigger_fields: trigger_fields.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Register relations from this type toward `child`
    pub fn require<P>(&self, child: &DependencyNode<C>, providers: P) -> &Self
    where
        P: IntoIterator,
        P::Item: Into<DescriptorProvider>,
    {
        let mut config = self.config.write();
        config
            .requires
            .entry(child.type_key().clone())
            .or_default()
            .extend(providers.into_iter().map(Into::into));
        self
    }

    pub fn loader(&self) -> Option<Arc<dyn Loader<C>>> {
        self.config.read().loader.clone()
    }

    pub fn initializer(&self) -> Option<InitializerSlot<C>> {
        self.config.read().initializer.clone()
    }

    pub fn has_loader(&self) -> bool {
        self.config.read().loader.is_some()
    }

    pub fn has_initializer(&self) -> bool {
        self.config.read().initializer.is_some()
    }

    /// Child types this node has relations toward
    pub fn required_types(&self) -> Vec<TypeKey> {
        self.config.read().requires.keys().cloned().collect()
    }

    pub(crate) fn providers_for(&self, child: &TypeKey) -> Vec<DescriptorProvider> {
        self.config
            .read()
            .requires
            .get(child)
            .cloned()
            .unwrap_or_default()
    }

    /// Evaluate every relation registered toward `child`
    pub fn relations_to(&self, child: &TypeKey) -> ResolveResult<Vec<RelationDescriptor>> {
        self.providers_for(child)
            .iter()
            .map(DescriptorProvider::resolve)
            .collect()
    }

    /// Relations toward `child` whose destination is `field`
    pub fn relations_for_field(&self, child: &TypeKey, field: &str) -> ResolveResult<Vec<RelationDescriptor>> {
        Ok(self
            .relations_to(child)?
            .into_iter()
            .filter(|relation| relation.destination() == field)
            .collect())
    }
}

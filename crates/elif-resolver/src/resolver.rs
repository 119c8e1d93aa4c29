//! Resolver - Top-level entry point of a resolution request

use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::config::ResolverConfig;
use crate::entity::{Entity, Source};
use crate::error::{ResolveError, ResolveResult};
use crate::fields::FieldTree;
use crate::loading::IncrementalLoader;
use crate::relationships::DependencyRegistry;
use crate::schema::TypeKey;

/// Counters collected during one load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Loader invocations actually issued
    pub loader_calls: usize,
    /// Initializer invocations actually issued
    pub initializer_calls: usize,
    /// Calls answered from the memo
    pub memo_hits: usize,
    /// Relation fetches skipped because nothing was missing or no loader exists
    pub skipped_fetches: usize,
    /// Entities added to the cache by loaders
    pub entities_loaded: usize,
}

impl ResolveStats {
    /// Share of calls answered from the memo
    pub fn memo_hit_ratio(&self) -> f64 {
        let total = self.loader_calls + self.initializer_calls + self.memo_hits;
        if total == 0 {
            0.0
        } else {
            self.memo_hits as f64 / total as f64
        }
    }
}

impl Display for ResolveStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} loader calls, {} initializer calls, {} memo hits ({:.1}% hit rate), {} skipped fetches, {} entities loaded",
            self.loader_calls,
            self.initializer_calls,
            self.memo_hits,
            self.memo_hit_ratio() * 100.0,
            self.skipped_fetches,
            self.entities_loaded
        )
    }
}

/// Summary of a completed load
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub root: TypeKey,
    pub stats: ResolveStats,
    /// Types that took part in the load, sorted
    pub types: Vec<TypeKey>,
    pub elapsed: Duration,
}

impl LoadReport {
    fn untouched(root: &TypeKey, started: Instant) -> Self {
        Self {
            root: root.clone(),
            stats: ResolveStats::default(),
            types: Vec::new(),
            elapsed: started.elapsed(),
        }
    }
}

impl Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Load of {} across {} types in {:?}: {}",
            self.root,
            self.types.len(),
            self.elapsed,
            self.stats
        )
    }
}

/// Resolves requested relation fields on already-known entities
pub struct Resolver<C> {
    registry: Arc<DependencyRegistry<C>>,
    config: ResolverConfig,
}

impl<C> Clone for Resolver<C> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C> Resolver<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(registry: Arc<DependencyRegistry<C>>) -> Self {
        Self::with_config(registry, ResolverConfig::default())
    }

    pub fn with_config(registry: Arc<DependencyRegistry<C>>, config: ResolverConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<DependencyRegistry<C>> {
        &self.registry
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `fields` on `source`, entities of type `root`.
    ///
    /// The source entities are mutated in place and handed back in the same
    /// shape. Without a field tree, or with an empty list, nothing happens.
    pub async fn load(
        &self,
        root: &TypeKey,
        source: impl Into<Source>,
        ctx: &C,
        fields: Option<&FieldTree>,
    ) -> ResolveResult<Source> {
        let (source, _) = self.load_with_report(root, source, ctx, fields).await?;
        Ok(source)
    }

    /// Same as [`load`](Self::load), also returning what the load did
    pub async fn load_with_report(
        &self,
        root: &TypeKey,
        source: impl Into<Source>,
        ctx: &C,
        fields: Option<&FieldTree>,
    ) -> ResolveResult<(Source, LoadReport)> {
        let source = source.into();
        let started = Instant::now();

        let Some(fields) = fields else {
            return Ok((source, LoadReport::untouched(root, started)));
        };
        if source.is_empty() {
            return Ok((source, LoadReport::untouched(root, started)));
        }
        let node = self
            .registry
            .get(root)
            .ok_or_else(|| ResolveError::UnknownType(root.clone()))?;

        let mut tree = fields.clone();
        tree.ensure_field(self.config.get_id_field());
        let entities = source.entities();

        let loader = IncrementalLoader::new(&self.registry, &self.config, ctx);
        loader.prepare(&node, &tree, &entities);
        loader.execute(node, &tree, entities).await?;

        let report = LoadReport {
            root: root.clone(),
            stats: loader.stats(),
            types: loader.cache().types(),
            elapsed: started.elapsed(),
        };
        tracing::debug!(
            root = %report.root,
            loader_calls = report.stats.loader_calls,
            memo_hits = report.stats.memo_hits,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Load completed: {}",
            report
        );
        Ok((source, report))
    }

    /// Resolve a JSON object or array of objects and return it as JSON,
    /// materialized along the requested fields
    pub async fn load_json(&self, root: &TypeKey, source: Value, ctx: &C, fields: &FieldTree) -> ResolveResult<Value> {
        let source = match source {
            Value::Array(items) => Source::Many(items.into_iter().map(Entity::from_json).collect::<ResolveResult<_>>()?),
            other => Source::One(Entity::from_json(other)?),
        };
        let resolved = self.load(root, source, ctx, Some(fields)).await?;
        Ok(match resolved {
            Source::One(entity) => entity.snapshot(fields),
            Source::Many(entities) => Value::Array(entities.iter().map(|entity| entity.snapshot(fields)).collect()),
        })
    }
}

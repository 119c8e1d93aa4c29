//! Relation descriptors - How a parent type derives and maps its children

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{ResolveError, ResolveResult};
use crate::schema::FieldDescriptor;

/// Filter specification of a relation: loader argument name -> parent field.
///
/// Each entry says "call the child loader with `filter_key` set to the values
/// of `source_field` on the parents", and inversely "a child matches a parent
/// when its `filter_key` field loosely equals the parent's `source_field`".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    keys: IndexMap<String, String>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter_key: impl Into<String>, source_field: impl Into<String>) -> Self {
        self.keys.insert(filter_key.into(), source_field.into());
        self
    }

    /// `(filter_key, source_field)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys.iter().map(|(key, field)| (key.as_str(), field.as_str()))
    }

    pub fn source_fields(&self) -> impl Iterator<Item = &str> {
        self.keys.values().map(String::as_str)
    }

    pub fn source_field(&self, filter_key: &str) -> Option<&str> {
        self.keys.get(filter_key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Describes one relation from a parent type toward a child type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDescriptor {
    destination: String,
    list: bool,
    filter: FilterSpec,
}

impl RelationDescriptor {
    pub fn new(destination: impl Into<String>, list: bool) -> Self {
        Self {
            destination: destination.into(),
            list,
            filter: FilterSpec::new(),
        }
    }

    /// Relation assigning a single child onto `destination`
    pub fn one(destination: impl Into<String>) -> Self {
        Self::new(destination, false)
    }

    /// Relation assigning every matching child onto `destination`
    pub fn many(destination: impl Into<String>) -> Self {
        Self::new(destination, true)
    }

    /// Relation whose destination and cardinality come from a schema field
    pub fn for_field(field: &FieldDescriptor) -> Self {
        Self::new(field.name(), field.is_list_type())
    }

    /// Add a filter entry
    pub fn filter(mut self, filter_key: impl Into<String>, source_field: impl Into<String>) -> Self {
        self.filter = self.filter.with(filter_key, source_field);
        self
    }

    /// Replace the whole filter specification
    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = filter;
        self
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn is_list(&self) -> bool {
        self.list
    }

    pub fn filter_spec(&self) -> &FilterSpec {
        &self.filter
    }

    /// Check the descriptor is usable for fetching and mapping
    pub fn validate(&self) -> ResolveResult<()> {
        if self.destination.is_empty() {
            return Err(ResolveError::configuration("relation destination field is empty"));
        }
        if self.filter.is_empty() {
            return Err(ResolveError::configuration(format!(
                "relation '{}' has an empty filter",
                self.destination
            )));
        }
        Ok(())
    }
}

/// Deferred source of a [`RelationDescriptor`].
///
/// Providers run when a load needs the relation, not at registration, so they
/// may reference schema fields that are defined after `require` is called.
#[derive(Clone)]
pub struct DescriptorProvider {
    provide: Arc<dyn Fn() -> ResolveResult<RelationDescriptor> + Send + Sync>,
}

impl DescriptorProvider {
    pub fn new<F>(provide: F) -> Self
    where
        F: Fn() -> ResolveResult<RelationDescriptor> + Send + Sync + 'static,
    {
        Self {
            provide: Arc::new(provide),
        }
    }

    /// Evaluate the provider and validate its descriptor
    pub fn resolve(&self) -> ResolveResult<RelationDescriptor> {
        let descriptor = (self.provide)()?;
        descriptor.validate()?;
        Ok(descriptor)
    }
}

impl From<RelationDescriptor> for DescriptorProvider {
    fn from(descriptor: RelationDescriptor) -> Self {
        DescriptorProvider::new(move || Ok(descriptor.clone()))
    }
}

impl fmt::Debug for DescriptorProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DescriptorProvider")
    }
}

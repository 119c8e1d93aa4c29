//! # elif-resolver: Dependency resolution for nested data requests
//!
//! Resolves the relation fields a caller asked for on entities it already
//! holds, issuing as few bulk loader calls as possible and never loading an
//! entity twice within one request.
//!
//! Entity types are registered once in a [`DependencyRegistry`], each with
//! a bulk [`Loader`], an optional [`Initializer`] and the relations it has
//! toward other types. A [`Resolver`] then answers requests:
//!
//! ```rust,ignore
//! let registry = Arc::new(DependencyRegistry::new());
//! let company = registry.get_or_create(company_type);
//! let user = registry.get_or_create(user_type);
//! user.define_loader(UserLoader::new(client));
//! company.require(&user, [RelationDescriptor::one("owner").filter("id", "ownerId")]);
//!
//! let resolver = Resolver::new(registry);
//! let tree = FieldTree::from_json(&json!({ "owner": { "name": true } }))?;
//! resolver.load(&"Company".into(), companies, &ctx, Some(&tree)).await?;
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod fields;
pub mod loading;
pub mod relationships;
pub mod resolver;
pub mod schema;

// Re-export core types
pub use config::{ResolverConfig, ResolverConfigBuilder};
pub use entity::{ids_of, loosely_matches, Entity, EntityId, FieldValue, Source};
pub use error::{ResolveError, ResolveResult};
pub use fields::FieldTree;
pub use loading::{CallKind, CallSignature, FilterArgs};
pub use relationships::{
    initializer_fn, loader_fn, DependencyNode, DependencyRegistry, DescriptorProvider, FilterSpec, Initializer,
    InitializerOutput, Loader, RegistryStats, RelationDescriptor,
};
pub use resolver::{LoadReport, ResolveStats, Resolver};
pub use schema::{FieldDescriptor, ObjectType, TypeDescriptor, TypeKey};

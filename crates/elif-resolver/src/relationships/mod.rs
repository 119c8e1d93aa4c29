//! Relationships Module - Dependency registry, per-type nodes and relation descriptors

pub mod descriptor;
pub mod node;
pub mod registry;

pub use descriptor::{DescriptorProvider, FilterSpec, RelationDescriptor};
pub use node::{
    initializer_fn, loader_fn, DependencyNode, Initializer, InitializerFn, InitializerOutput, InitializerSlot, Loader,
    LoaderFn,
};
pub use registry::{DependencyRegistry, RegistryStats};
